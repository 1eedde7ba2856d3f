//! Page attachments.
//!
//! An [`Attachment`] is a file uploaded to the page: a declared local file,
//! an image referenced from the markdown, or a rendered diagram. Each one is
//! identified remotely by its flattened filename and carries a SHA-256
//! checksum in the attachment comment, so re-publishing unchanged content
//! uploads nothing.
//!
//! - [`resolve`] classifies candidates against the remote listing and
//!   performs the create/update calls.
//! - [`substitute_links`] rewrites references in the markdown to the
//!   resolved download links.

mod image;
mod links;
mod resolve;

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

pub use image::{image_dimensions, png_dimensions};
pub use links::{Substituted, substitute_links};
pub use resolve::{AttachmentStore, Plan, RemoteAttachment, Resolved, plan, resolve};

/// Prefix of the checksum comment stored on remote attachments.
pub const CHECKSUM_PREFIX: &str = "mdpub:checksum: ";

/// Legacy scheme prefix accepted in front of replace-tokens.
pub const ATTACHMENT_SCHEME: &str = "attachment://";

/// Error loading a local attachment.
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    #[error("failed to read attachment {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("attachment {} is not a file", path.display())]
    NotAFile { path: PathBuf },
}

/// File attached to a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Display name (the declared path, or the diagram title).
    pub name: String,
    /// Remote filename, with path separators flattened to `_`.
    pub filename: String,
    pub content: Vec<u8>,
    /// Hex SHA-256 of `content`.
    pub checksum: String,
    /// Remote attachment id, set after resolution.
    pub id: Option<String>,
    /// Remote download link, set after resolution.
    pub link: Option<String>,
    /// Token in the markdown replaced by the resolved link.
    pub replace: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Attachment {
    /// Build an attachment from bytes. Image dimensions are read from the
    /// content header when it is a PNG, GIF or JPEG.
    pub fn new(name: impl Into<String>, replace: impl Into<String>, content: Vec<u8>) -> Self {
        let name = name.into();
        let dimensions = image_dimensions(&content);
        Self {
            filename: flatten_filename(&name),
            checksum: checksum(&content),
            name,
            content,
            id: None,
            link: None,
            replace: replace.into(),
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
        }
    }

    /// Load `path` relative to `base_dir`. The declared path becomes both
    /// the name and the replace-token.
    pub fn from_file(base_dir: &Path, path: &str) -> Result<Self, AttachmentError> {
        let full = base_dir.join(path);
        if full.is_dir() {
            return Err(AttachmentError::NotAFile { path: full });
        }
        let content = std::fs::read(&full).map_err(|source| AttachmentError::Read {
            path: full.clone(),
            source,
        })?;
        tracing::debug!(attachment = path, bytes = content.len(), "Loaded attachment");
        Ok(Self::new(path, path, content))
    }

    /// Comment stored on the remote attachment.
    pub fn comment(&self) -> String {
        format!("{CHECKSUM_PREFIX}{}", self.checksum)
    }
}

/// Load every declared attachment path relative to `base_dir`.
pub fn load_local(base_dir: &Path, paths: &[String]) -> Result<Vec<Attachment>, AttachmentError> {
    paths
        .iter()
        .map(|path| Attachment::from_file(base_dir, path))
        .collect()
}

/// Hex-encoded SHA-256 of `content`.
pub fn checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Replace path separators so the name is a valid remote filename.
pub fn flatten_filename(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}

/// `name.ext` becomes `name-<first 8 checksum digits>.ext`, for a file whose
/// name is already taken by different content.
pub fn qualified_filename(filename: &str, checksum: &str) -> String {
    let short = checksum.get(..8).unwrap_or(checksum);
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{short}.{ext}"),
        _ => format!("{filename}-{short}"),
    }
}
