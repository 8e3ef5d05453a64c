//! Template engine seam.

use std::path::{Path, PathBuf};

use minijinja::Environment;
use serde::Serialize;

use crate::discovery::ServiceMap;
use crate::error::{ConfdError, ConfdResult};

/// Run metadata exposed to templates as `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    /// Local time the tick started.
    pub curdate: String,
    /// Daemon version.
    pub version: &'static str,
}

impl RunMetadata {
    /// Metadata for a tick starting now.
    pub fn now() -> Self {
        Self {
            curdate: chrono::Local::now()
                .format("%Y-%m-%d %H:%M:%S%.6f")
                .to_string(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Bindings handed to every template.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RenderContext<'a> {
    pub domains: &'a ServiceMap,
    pub extra: &'a RunMetadata,
}

/// Renders one named template.
pub trait TemplateEngine: Send + Sync {
    /// Render the template `name` with the given bindings.
    fn render(&self, name: &str, ctx: &RenderContext<'_>) -> ConfdResult<String>;
}

/// Jinja-style templates loaded from a directory.
///
/// A fresh environment is built for each render so that edited fragments are
/// picked up on the next tick.
#[derive(Debug, Clone)]
pub struct MiniJinjaEngine {
    template_dir: PathBuf,
}

impl MiniJinjaEngine {
    pub fn new(template_dir: impl AsRef<Path>) -> Self {
        Self {
            template_dir: template_dir.as_ref().to_path_buf(),
        }
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(&self.template_dir));
        env.set_trim_blocks(true);
        // Jinja2 fragments call Python methods like `domains.items()`.
        env.set_unknown_method_callback(minijinja_contrib::pycompat::unknown_method_callback);
        env
    }
}

impl TemplateEngine for MiniJinjaEngine {
    fn render(&self, name: &str, ctx: &RenderContext<'_>) -> ConfdResult<String> {
        let env = self.environment();
        let template = env
            .get_template(name)
            .map_err(|e| ConfdError::Render(format!("Failed to load template {}: {}", name, e)))?;
        template
            .render(ctx)
            .map_err(|e| ConfdError::Render(format!("Failed to render template {}: {}", name, e)))
    }
}
