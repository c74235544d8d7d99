//! Rendering trait for announcement templates.

use crate::error::Result;
use serde::Serialize;

/// Trait for rendering announcement templates with dynamic context.
///
/// Implementations own the template sources and turn a named template plus
/// a serializable context into the text an agent posts to chat.
pub trait MessageEngine {
    /// Renders a template with the provided context.
    ///
    /// # Arguments
    ///
    /// * `template` - Name of the template to render (without extension)
    /// * `ctx` - Context data to use for rendering
    ///
    /// # Errors
    ///
    /// Returns an error if the template does not exist or rendering fails.
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String>;

    /// Lists the names of every registered template, sorted.
    fn list_templates(&self) -> Vec<String>;
}
