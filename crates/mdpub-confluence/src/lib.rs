//! Confluence publishing for mdpub.
//!
//! [`Document`] loads a markdown file, parses its header and expands its
//! directives. [`Publisher`] resolves the target page through a
//! [`ConfluenceApi`] (creating missing ancestors), uploads changed
//! attachments, writes the compiled body and reconciles labels.
//! [`ConfluenceClient`] implements [`ConfluenceApi`] over the REST API.
//!
//! # Example
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::Path;
//! use mdpub_confluence::{
//!     Auth, ConfluenceClient, Document, DocumentOptions, PublishOptions, Publisher,
//! };
//! use mdpub_renderer::CompileOptions;
//!
//! let client = ConfluenceClient::new(
//!     "https://wiki.example.com",
//!     &Auth::Bearer("token".to_owned()),
//! );
//! let document = Document::load(Path::new("docs/page.md"), &DocumentOptions::default())?;
//!
//! let publisher = Publisher::new(&client, CompileOptions::default(), PublishOptions::default());
//! let report = publisher.publish(&document)?;
//! println!("{} is at version {:?}", report.title, report.version);
//! # Ok(())
//! # }
//! ```

mod ancestry;
mod api;
mod client;
mod document;
mod error;
mod labels;
mod publish;

pub use ancestry::{Ancestry, ensure_ancestry, validate_ancestry};
pub use api::{Ancestor, ConfluenceApi, PageInfo, PageUpdate, User};
pub use client::{Auth, ConfluenceClient, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
pub use document::{Document, DocumentOptions, RenderedPage};
pub use error::{ConfluenceError, PublishError};
pub use labels::{LabelChanges, diff_labels, reconcile_labels};
pub use publish::{
    DEFAULT_CREATE_GRACE, PublishOptions, PublishReport, Publisher, compiler_for, version_hash,
    version_message,
};
