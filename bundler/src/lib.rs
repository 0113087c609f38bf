pub mod bundle;
pub mod error;
pub mod linker;
pub mod render;

pub use bundle::{
    BundleReport, Layout, OutputOptions, SourceFile, discover_inputs, process, process_paths,
    read_input, write_output,
};
pub use error::{DocumentFailure, LinkError, RenderError, UnresolvedTocEntry};
pub use linker::{LinkReport, Resolution, link};
pub use render::{Format, LinkedDocument, render_bundle, render_document};
