//! Fragment composition.
//!
//! # Responsibilities
//! - List the template directory in lexical file name order
//! - Copy `*.conf` fragments verbatim, each followed by a newline
//! - Render `*.tmpl` fragments with `domains` and `extra`
//! - Ignore every other entry
//!
//! Listing, reading and template loading are blocking; the reconciler runs
//! `Renderer::render` on the blocking pool.

use std::path::{Path, PathBuf};

use crate::discovery::ServiceMap;
use crate::error::{ConfdError, ConfdResult};
use crate::render::engine::{RenderContext, RunMetadata, TemplateEngine};

/// Fragment kind, decided by file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Static,
    Template,
}

impl FragmentKind {
    pub fn classify(file_name: &str) -> Option<Self> {
        if file_name.ends_with(".conf") {
            Some(FragmentKind::Static)
        } else if file_name.ends_with(".tmpl") {
            Some(FragmentKind::Template)
        } else {
            None
        }
    }
}

/// A fragment file selected for composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub path: PathBuf,
    pub kind: FragmentKind,
}

/// Composes the candidate config from the fragment directory.
pub struct Renderer<E> {
    template_dir: PathBuf,
    engine: E,
}

impl<E: TemplateEngine> Renderer<E> {
    pub fn new(template_dir: impl AsRef<Path>, engine: E) -> Self {
        Self {
            template_dir: template_dir.as_ref().to_path_buf(),
            engine,
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// List fragments in composition order.
    pub fn fragments(&self) -> ConfdResult<Vec<Fragment>> {
        let entries = std::fs::read_dir(&self.template_dir).map_err(|e| {
            ConfdError::Render(format!(
                "Failed to read template dir {:?}: {}",
                self.template_dir, e
            ))
        })?;

        let mut fragments = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                ConfdError::Render(format!(
                    "Failed to read template dir {:?}: {}",
                    self.template_dir, e
                ))
            })?;
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = ?entry.path(), "Ignoring fragment with non UTF-8 name");
                continue;
            };
            let Some(kind) = FragmentKind::classify(&name) else {
                continue;
            };
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            fragments.push(Fragment {
                path: entry.path(),
                name,
                kind,
            });
        }

        fragments.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(fragments)
    }

    /// Render the full candidate config.
    pub fn render(&self, services: &ServiceMap, extra: &RunMetadata) -> ConfdResult<Vec<u8>> {
        tracing::info!(template_dir = ?self.template_dir, "Rendering fragments");

        let ctx = RenderContext {
            domains: services,
            extra,
        };
        let mut output = Vec::new();

        for fragment in self.fragments()? {
            match fragment.kind {
                FragmentKind::Static => {
                    tracing::debug!(fragment = %fragment.name, "Adding plain config");
                    let bytes = std::fs::read(&fragment.path).map_err(|e| {
                        ConfdError::Render(format!("Failed to read {:?}: {}", fragment.path, e))
                    })?;
                    output.extend_from_slice(&bytes);
                    output.push(b'\n');
                }
                FragmentKind::Template => {
                    tracing::debug!(fragment = %fragment.name, "Rendering template");
                    let rendered = self.engine.render(&fragment.name, &ctx)?;
                    output.extend_from_slice(rendered.as_bytes());
                }
            }
        }

        Ok(output)
    }
}
