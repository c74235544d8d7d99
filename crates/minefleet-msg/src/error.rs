//! Error types for the message catalog crate.

use std::path::PathBuf;

/// Errors that can occur while loading or rendering announcements.
#[derive(thiserror::Error, Debug)]
pub enum MessageError {
    /// No template is registered under the given name.
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    /// Error occurred while rendering a template.
    #[error("template render error: {0}")]
    TemplateRenderError(String),

    /// A template source failed to compile.
    #[error("template syntax error in {name}: {reason}")]
    TemplateSyntaxError {
        /// Name the template was registered under.
        name: String,
        /// Compiler message.
        reason: String,
    },

    /// Failed to read an override template from disk.
    #[error("template load error: {path}")]
    TemplateLoadError {
        /// Path to the template that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Override directory does not exist or is not a directory.
    #[error("template directory not found: {0}")]
    TemplateDirectoryNotFound(PathBuf),
}

/// Result type alias for message catalog operations.
pub type Result<T> = std::result::Result<T, MessageError>;
