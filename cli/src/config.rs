use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use bundler::{Format, Layout, OutputOptions};

pub const DEFAULT_CONFIG: &str = "docbundle.toml";
const DEFAULT_TITLE: &str = "Documentation";

/// Contents of a `docbundle.toml` file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleConfig {
    /// Bundle title (HTML `<title>` and navigation heading).
    #[serde(default)]
    pub title: Option<String>,

    /// Input files or directories, relative to the config file.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    /// Output file (single layout) or directory (per-document layout).
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// "markdown" or "html".
    #[serde(default)]
    pub format: Option<String>,

    /// "single" or "per-document".
    #[serde(default)]
    pub layout: Option<String>,

    /// Treat unresolved table-of-contents entries as failures.
    #[serde(default)]
    pub strict: Option<bool>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Toml { path: PathBuf, message: String },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read '{}': {}", path.display(), source)
            }
            ConfigError::Toml { path, message } => {
                write!(f, "invalid config '{}': {}", path.display(), message)
            }
            ConfigError::Invalid(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl BundleConfig {
    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: BundleConfig = toml::from_str(text).map_err(|e| ConfigError::Toml {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.inputs = config.inputs.iter().map(|p| base.join(p)).collect();
        config.output = config.output.map(|p| base.join(p));
        Ok(config)
    }

    /// Load an explicit config file, or `docbundle.toml` if it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG);
                if !default.is_file() {
                    return Ok(BundleConfig::default());
                }
                default
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        BundleConfig::parse(&text, &path)
    }
}

/// Build settings after merging command-line values over the config file.
#[derive(Debug)]
pub struct BuildSettings {
    pub inputs: Vec<PathBuf>,
    pub output: OutputOptions,
    pub strict: bool,
}

/// Command-line overrides; `None`/empty means "use the config file".
#[derive(Debug, Default)]
pub struct Overrides {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub format: Option<String>,
    pub layout: Option<String>,
    pub title: Option<String>,
    pub strict: bool,
}

pub fn resolve(config: BundleConfig, overrides: Overrides) -> Result<BuildSettings, ConfigError> {
    let inputs = if overrides.inputs.is_empty() {
        config.inputs
    } else {
        overrides.inputs
    };
    if inputs.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "no inputs given (pass files or directories, or set `inputs` in {})",
            DEFAULT_CONFIG
        )));
    }

    let format: Format = match overrides.format.or(config.format) {
        Some(s) => s.parse().map_err(ConfigError::Invalid)?,
        None => Format::default(),
    };
    let layout: Layout = match overrides.layout.or(config.layout) {
        Some(s) => s.parse().map_err(ConfigError::Invalid)?,
        None => Layout::default(),
    };

    let path = overrides
        .output
        .or(config.output)
        .unwrap_or_else(|| match layout {
            Layout::Single => PathBuf::from(format!("bundle.{}", format.extension())),
            Layout::PerDocument => PathBuf::from("dist"),
        });

    Ok(BuildSettings {
        inputs,
        output: OutputOptions {
            title: overrides
                .title
                .or(config.title)
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            format,
            layout,
            path,
        },
        strict: overrides.strict || config.strict.unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides_with_input() -> Overrides {
        Overrides {
            inputs: vec![PathBuf::from("docs")],
            ..Overrides::default()
        }
    }

    #[test]
    fn defaults_apply_without_config() {
        let settings = resolve(BundleConfig::default(), overrides_with_input()).unwrap();
        assert_eq!(settings.output.title, "Documentation");
        assert_eq!(settings.output.format, Format::Markdown);
        assert_eq!(settings.output.layout, Layout::Single);
        assert_eq!(settings.output.path, PathBuf::from("bundle.md"));
        assert!(!settings.strict);
    }

    #[test]
    fn config_paths_are_relative_to_the_file() {
        let config = BundleConfig::parse(
            "title = \"Tour\"\ninputs = [\"docs\"]\noutput = \"dist/tour.html\"\nformat = \"html\"\nstrict = true\n",
            Path::new("project/docbundle.toml"),
        )
        .unwrap();
        assert_eq!(config.inputs, vec![PathBuf::from("project/docs")]);

        let settings = resolve(config, Overrides::default()).unwrap();
        assert_eq!(settings.output.path, PathBuf::from("project/dist/tour.html"));
        assert_eq!(settings.output.format, Format::Html);
        assert_eq!(settings.output.title, "Tour");
        assert!(settings.strict);
    }

    #[test]
    fn command_line_overrides_config() {
        let config = BundleConfig::parse(
            "format = \"html\"\nlayout = \"single\"\n",
            Path::new("docbundle.toml"),
        )
        .unwrap();
        let overrides = Overrides {
            format: Some("markdown".to_string()),
            layout: Some("per-document".to_string()),
            ..overrides_with_input()
        };
        let settings = resolve(config, overrides).unwrap();
        assert_eq!(settings.output.format, Format::Markdown);
        assert_eq!(settings.output.layout, Layout::PerDocument);
        assert_eq!(settings.output.path, PathBuf::from("dist"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = BundleConfig::parse("theme = \"dark\"\n", Path::new("docbundle.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Toml { .. }));
    }

    #[test]
    fn bad_format_is_reported() {
        let overrides = Overrides {
            format: Some("pdf".to_string()),
            ..overrides_with_input()
        };
        let err = resolve(BundleConfig::default(), overrides).unwrap_err();
        assert!(err.to_string().contains("unknown format `pdf`"));
    }

    #[test]
    fn missing_inputs_is_an_error() {
        let err = resolve(BundleConfig::default(), Overrides::default()).unwrap_err();
        assert!(err.to_string().starts_with("no inputs given"));
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "inputs = [\"a.md\"]\n").unwrap();
        let config = BundleConfig::load(Some(&path)).unwrap();
        assert_eq!(config.inputs, vec![dir.path().join("a.md")]);
    }
}
