use std::collections::{HashMap, HashSet};

/// Turn a heading title into an anchor slug.
///
/// Letters and digits are lower-cased, `-` and `_` are kept, whitespace runs
/// collapse to a single hyphen and all other punctuation is dropped.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.chars() {
        if ch.is_whitespace() {
            pending_dash = true;
            continue;
        }
        if !(ch.is_alphanumeric() || ch == '-' || ch == '_') {
            continue;
        }
        if pending_dash && !out.is_empty() {
            out.push('-');
        }
        pending_dash = false;
        out.extend(ch.to_lowercase());
    }

    out.trim_matches('-').to_string()
}

/// Hands out document-unique anchors, suffixing repeats in order of
/// first occurrence: `overview`, `overview-1`, `overview-2`, ...
#[derive(Debug, Default)]
pub struct AnchorAllocator {
    taken: HashSet<String>,
    suffixes: HashMap<String, usize>,
}

impl AnchorAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, slug: &str) -> String {
        if self.taken.insert(slug.to_string()) {
            return slug.to_string();
        }

        let counter = self.suffixes.entry(slug.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}-{}", slug, counter);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}
