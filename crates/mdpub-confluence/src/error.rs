//! Error types for Confluence publishing.

use std::path::PathBuf;

/// Error from a Confluence API operation.
#[derive(Debug, thiserror::Error)]
pub enum ConfluenceError {
    /// Request could not be sent or the connection failed.
    #[error("{operation}: request failed")]
    Transport {
        operation: String,
        #[source]
        source: ureq::Error,
    },

    /// Server returned an error status.
    #[error("{operation}: HTTP {status}: {body}")]
    Http {
        operation: String,
        status: u16,
        body: String,
    },

    /// Response body did not have the expected shape.
    #[error("{operation}: unexpected response")]
    Json {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// Lookup succeeded but found nothing.
    #[error("{operation}: not found")]
    NotFound { operation: String },
}

impl ConfluenceError {
    /// HTTP status of the failed response, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error publishing one document.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has no metadata header and no page id was given", path.display())]
    MissingTarget { path: PathBuf },

    #[error("invalid metadata in {}", path.display())]
    Meta {
        path: PathBuf,
        #[source]
        source: mdpub_meta::MetaError,
    },

    #[error("failed to expand directives in {}", path.display())]
    Include {
        path: PathBuf,
        #[source]
        source: mdpub_includes::IncludeError,
    },

    #[error("failed to load attachment for {}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: mdpub_attachments::AttachmentError,
    },

    #[error("failed to compile {}", path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: mdpub_renderer::CompileError,
    },

    #[error("failed to render page layout")]
    Layout(#[source] mdpub_includes::IncludeError),

    #[error(
        "page \"{title}\" has unexpected ancestry\n  expected: {}\n  actual:   {}",
        expected.join(" > "),
        actual.join(" > ")
    )]
    AncestryMismatch {
        title: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("page \"{title}\" has no ancestors and is not the space home page")]
    Orphan { title: String },

    #[error(transparent)]
    Confluence(#[from] ConfluenceError),
}
