//! Loading and compiling a single markdown document.

use std::path::{Path, PathBuf};

use mdpub_attachments::Attachment;
use mdpub_includes::{ExpandOptions, Expander, render_builtin};
use mdpub_meta::{ExtractOptions, Meta, extract_meta};
use mdpub_renderer::Compiler;
use serde::Serialize;

use crate::error::PublishError;

/// Options for [`Document::load`].
#[derive(Clone, Debug, Default)]
pub struct DocumentOptions {
    pub extract: ExtractOptions,
    pub expand: ExpandOptions,
}

/// A markdown file with its header parsed and its directives expanded.
#[derive(Clone, Debug)]
pub struct Document {
    pub path: PathBuf,
    /// Directory relative paths in the document resolve against.
    pub base_dir: PathBuf,
    pub meta: Option<Meta>,
    /// Body after directive expansion.
    pub markdown: String,
    pub warnings: Vec<String>,
}

/// Compiled page body ready for upload.
#[derive(Clone, Debug)]
pub struct RenderedPage {
    pub markup: String,
    pub attachments: Vec<Attachment>,
    pub warnings: Vec<String>,
}

#[derive(Serialize)]
struct LayoutContext<'a> {
    layout: &'a str,
    body: &'a str,
    sidebar: &'a str,
}

impl Document {
    /// Read `path`, extract its header and expand its directives.
    pub fn load(path: &Path, options: &DocumentOptions) -> Result<Self, PublishError> {
        let source = std::fs::read_to_string(path).map_err(|source| PublishError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &source, options)
    }

    /// Like [`Document::load`] with the file contents already in memory.
    pub fn parse(path: &Path, source: &str, options: &DocumentOptions) -> Result<Self, PublishError> {
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let extracted = extract_meta(source, &options.extract);
        let mut warnings = extracted.warnings;

        let mut expander = Expander::new(&base_dir, options.expand.clone());
        let expanded = expander
            .expand(extracted.body)
            .map_err(|source| PublishError::Include {
                path: path.to_path_buf(),
                source,
            })?;
        warnings.extend(expanded.warnings);

        for warning in &warnings {
            tracing::warn!(path = %path.display(), "{warning}");
        }

        Ok(Self {
            path: path.to_path_buf(),
            base_dir,
            meta: extracted.meta,
            markdown: expanded.text,
            warnings,
        })
    }

    /// Metadata checked for the fields publishing needs.
    pub fn require_meta(&self) -> Result<&Meta, PublishError> {
        let meta = self.meta.as_ref().ok_or_else(|| PublishError::MissingTarget {
            path: self.path.clone(),
        })?;
        meta.validate().map_err(|source| PublishError::Meta {
            path: self.path.clone(),
            source,
        })?;
        Ok(meta)
    }

    /// Compile `markdown` (usually [`Document::markdown`] after link
    /// substitution) and merge it into the page layout.
    pub fn render(&self, compiler: &Compiler<'_>, markdown: &str) -> Result<RenderedPage, PublishError> {
        let compile_error = |source| PublishError::Compile {
            path: self.path.clone(),
            source,
        };

        let compiled = compiler.compile(markdown).map_err(compile_error)?;
        let mut warnings = compiled.warnings;
        let mut attachments = compiled.attachments;

        let (layout, sidebar_source) = self
            .meta
            .as_ref()
            .map_or(("", ""), |meta| (meta.layout.as_str(), meta.sidebar.as_str()));

        let sidebar = if sidebar_source.is_empty() {
            String::new()
        } else {
            let sidebar = compiler.compile(sidebar_source).map_err(compile_error)?;
            warnings.extend(sidebar.warnings);
            attachments.extend(sidebar.attachments);
            sidebar.markup
        };

        let markup = render_builtin(
            "ac:layout",
            LayoutContext {
                layout,
                body: &compiled.markup,
                sidebar: &sidebar,
            },
        )
        .map_err(PublishError::Layout)?;

        for warning in &warnings {
            tracing::warn!(path = %self.path.display(), "{warning}");
        }

        Ok(RenderedPage {
            markup,
            attachments,
            warnings,
        })
    }
}
