//! Announcement catalog backed by minijinja.

use crate::{
    engine::MessageEngine,
    error::{MessageError, Result},
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

const BUILTIN_TEMPLATES: [(&str, &str); 4] = [
    ("tool_equipped", include_str!("../templates/tool_equipped.j2")),
    ("tool_swapped", include_str!("../templates/tool_swapped.j2")),
    ("tool_exhausted", include_str!("../templates/tool_exhausted.j2")),
    ("progress", include_str!("../templates/progress.j2")),
];

/// Announcements an agent can post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announcement {
    /// A picked-up tool was equipped.
    ToolEquipped,
    /// The worn-out tool was replaced by a reserve tool.
    ToolSwapped,
    /// No reserve tool was available; extraction stopped.
    ToolExhausted,
    /// Periodic mining progress.
    Progress,
}

impl Announcement {
    /// Name of the template that renders this announcement.
    pub fn template_name(&self) -> &'static str {
        match self {
            Announcement::ToolEquipped => "tool_equipped",
            Announcement::ToolSwapped => "tool_swapped",
            Announcement::ToolExhausted => "tool_exhausted",
            Announcement::Progress => "progress",
        }
    }
}

/// Catalog of announcement templates.
///
/// Starts with the built-in templates compiled into the crate. An override
/// directory may replace any of them (or add new ones) with `<name>.j2`
/// files.
///
/// # Examples
///
/// ```
/// use minefleet_msg::{Announcement, MessageCatalog, ToolContext};
///
/// let catalog = MessageCatalog::builtin();
/// let text = catalog
///     .announce(Announcement::ToolEquipped, &ToolContext::new("pickaxe-1", 8, 10))
///     .unwrap();
/// assert_eq!(text, "tool equipped: pickaxe-1");
/// ```
#[derive(Debug)]
pub struct MessageCatalog {
    /// Directory the overrides were loaded from, if any.
    pub overrides_dir: Option<PathBuf>,
    names: BTreeSet<String>,
    env: minijinja::Environment<'static>,
}

impl MessageCatalog {
    /// Creates a catalog holding only the built-in templates.
    pub fn builtin() -> Self {
        let mut env = minijinja::Environment::new();
        let mut names = BTreeSet::new();
        for (name, source) in BUILTIN_TEMPLATES {
            // sources are compiled in
            if let Err(e) = env.add_template(name, source) {
                tracing::error!(template = name, error = %e, "built-in template rejected");
                continue;
            }
            names.insert(name.to_string());
        }
        Self {
            overrides_dir: None,
            names,
            env,
        }
    }

    /// Creates a catalog with built-ins replaced by the `.j2` files found in
    /// `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory does not exist, a file cannot be
    /// read, or a template fails to compile.
    pub fn with_overrides(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(MessageError::TemplateDirectoryNotFound(dir.to_path_buf()));
        }

        let mut catalog = Self::builtin();
        let entries = std::fs::read_dir(dir).map_err(|source| MessageError::TemplateLoadError {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| MessageError::TemplateLoadError {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();

            if path.is_file()
                && let Some(ext) = path.extension()
                && ext == "j2"
                && let Some(name) = path.file_stem().and_then(|s| s.to_str())
            {
                let source = std::fs::read_to_string(&path).map_err(|source| {
                    MessageError::TemplateLoadError {
                        path: path.clone(),
                        source,
                    }
                })?;
                catalog.insert(name.to_string(), source)?;
                tracing::debug!(template = name, path = %path.display(), "loaded template override");
            }
        }

        catalog.overrides_dir = Some(dir.to_path_buf());
        Ok(catalog)
    }

    /// Registers (or replaces) a template from source text.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntaxError` if the source does not compile.
    pub fn insert(&mut self, name: String, source: String) -> Result<()> {
        self.env
            .add_template_owned(name.clone(), source)
            .map_err(|e| MessageError::TemplateSyntaxError {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        self.names.insert(name);
        Ok(())
    }

    /// Renders the template behind an [`Announcement`].
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn announce<T: Serialize>(&self, announcement: Announcement, ctx: &T) -> Result<String> {
        self.render(announcement.template_name(), ctx)
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MessageEngine for MessageCatalog {
    fn render<T: Serialize>(&self, template: &str, ctx: &T) -> Result<String> {
        let tmpl = self
            .env
            .get_template(template)
            .map_err(|e| MessageError::TemplateNotFound(format!("{template}: {e}")))?;
        tmpl.render(ctx)
            .map_err(|e| MessageError::TemplateRenderError(format!("{template}: {e}")))
    }

    fn list_templates(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}
