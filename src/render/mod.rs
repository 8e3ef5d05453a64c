//! Config rendering subsystem.
//!
//! # Data Flow
//! ```text
//! template dir
//!     → renderer.rs (sorted listing, *.conf / *.tmpl / ignored)
//!     → engine.rs (TemplateEngine::render with `domains` + `extra`)
//!     → candidate config bytes
//! ```
//!
//! # Design Decisions
//! - Composition order is the lexical file name order, nothing else
//! - The template language sits behind `TemplateEngine`
//! - Templates only read the bindings; rendering has no side effects

pub mod engine;
pub mod renderer;

pub use engine::{MiniJinjaEngine, RenderContext, RunMetadata, TemplateEngine};
pub use renderer::{Fragment, FragmentKind, Renderer};
