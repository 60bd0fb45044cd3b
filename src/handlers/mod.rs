//! Built-in request handlers.

pub mod dynamic_content;
pub mod static_files;

pub use dynamic_content::SampleDynamicContentHandler;
pub use static_files::StaticFilesHandler;
