//! Markdown to Confluence storage format compiler.
//!
//! Markdown is parsed with pulldown-cmark into a document tree
//! ([`ast::Node`]), text runs are rescanned for storage tags, mentions and
//! math, blockquotes are classified into admonition panels, and the tree is
//! rendered through a per-compile handler table.
//!
//! # Example
//!
//! ```
//! use mdpub_renderer::{CompileOptions, Compiler};
//!
//! let compiled = Compiler::new(CompileOptions::default())
//!     .compile("# Hello\n\n> [!TIP]\n> Try it")
//!     .unwrap();
//!
//! assert!(compiled.markup.contains(r#"<h1 id="Hello">Hello</h1>"#));
//! assert!(compiled.markup.contains(r#"ac:name="tip""#));
//! ```

pub mod ast;
mod code_block;
mod diagram;
mod ids;
mod inline;
mod render;
mod transform;
mod util;

use std::path::PathBuf;

use mdpub_attachments::Attachment;

pub use code_block::{CodeInfo, code_macro};
pub use diagram::{DiagramFailure, DiagramRenderer, RenderedDiagram};
pub use ids::{IdGenerator, IdKind};
pub use transform::{alert_admonition, classify_blockquotes};
pub use util::{cdata, escape_html};

use crate::render::{Handlers, Renderer};

/// Unrecoverable compile failure.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("markdown event stream is unbalanced: {0}")]
    Unbalanced(String),
}

/// Rendering options for one compile.
#[derive(Clone, Debug, Default)]
pub struct CompileOptions {
    /// Directory local image paths are resolved against.
    pub base_dir: PathBuf,
    /// Skip the first level-1 heading (it is usually the page title).
    pub drop_h1: bool,
    /// Render soft line breaks as spaces.
    pub strip_linebreaks: bool,
    /// Default image alignment; enables width-based layout escalation.
    pub image_align: Option<String>,
    /// Diagram scale. Diagrams are only rendered when set.
    pub diagram_scale: Option<f64>,
}

/// Output of [`Compiler::compile`].
#[derive(Clone, Debug)]
pub struct Compiled {
    /// Storage format markup.
    pub markup: String,
    /// Local images and rendered diagrams referenced by the markup.
    pub attachments: Vec<Attachment>,
    /// Problems that did not stop the compile.
    pub warnings: Vec<String>,
}

/// Compiles markdown into storage format.
pub struct Compiler<'a> {
    options: CompileOptions,
    diagrams: Option<&'a dyn DiagramRenderer>,
}

impl<'a> Compiler<'a> {
    #[must_use]
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            diagrams: None,
        }
    }

    /// Render diagram fences with `renderer`.
    #[must_use]
    pub fn with_diagrams(mut self, renderer: &'a dyn DiagramRenderer) -> Self {
        self.diagrams = Some(renderer);
        self
    }

    #[must_use]
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile one document.
    ///
    /// Heading ids are unique within this call only.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] if the parser produced an inconsistent event
    /// stream. Problems local to one image or diagram are reported as
    /// warnings instead.
    pub fn compile(&self, markdown: &str) -> Result<Compiled, CompileError> {
        let mut document = ast::parse(markdown)?;
        classify_blockquotes(&mut document);

        let handlers = Handlers::new(&self.options);
        let mut renderer = Renderer::new(&self.options, self.diagrams);
        renderer.walk(&handlers, &document);
        let (markup, attachments, warnings) = renderer.finish();

        tracing::debug!(
            bytes = markup.len(),
            attachments = attachments.len(),
            warnings = warnings.len(),
            "Compiled document"
        );
        Ok(Compiled {
            markup,
            attachments,
            warnings,
        })
    }
}
