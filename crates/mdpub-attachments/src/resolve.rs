//! Reconcile local attachments with the remote page.

use std::collections::HashMap;

use crate::{Attachment, CHECKSUM_PREFIX, qualified_filename};

/// Attachment as listed by the remote page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteAttachment {
    pub id: String,
    pub filename: String,
    /// Free-form comment; carries the checksum for attachments we uploaded.
    pub comment: String,
    /// Download link (context path + download path).
    pub link: String,
}

impl RemoteAttachment {
    /// Checksum recorded in the comment, if the comment has our prefix.
    pub fn checksum(&self) -> Option<&str> {
        self.comment.strip_prefix(CHECKSUM_PREFIX).map(str::trim)
    }
}

/// Remote operations needed to reconcile attachments.
pub trait AttachmentStore {
    type Error;

    fn list_attachments(&self, page_id: &str) -> Result<Vec<RemoteAttachment>, Self::Error>;

    fn create_attachment(
        &self,
        page_id: &str,
        attachment: &Attachment,
    ) -> Result<RemoteAttachment, Self::Error>;

    fn update_attachment(
        &self,
        page_id: &str,
        attachment_id: &str,
        attachment: &Attachment,
    ) -> Result<RemoteAttachment, Self::Error>;
}

/// Classification of candidates against the remote listing.
#[derive(Debug, Default)]
pub struct Plan {
    /// Same filename and checksum: nothing to upload.
    pub keep: Vec<(Attachment, RemoteAttachment)>,
    /// No remote attachment with this filename.
    pub create: Vec<Attachment>,
    /// Same filename, different checksum.
    pub update: Vec<(Attachment, RemoteAttachment)>,
    /// Same filename and content as an earlier candidate; shares its remote
    /// attachment but keeps its own replace token.
    pub duplicates: Vec<Attachment>,
}

impl Plan {
    /// Number of upload calls the plan requires.
    pub fn uploads(&self) -> usize {
        self.create.len() + self.update.len()
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Default)]
pub struct Resolved {
    /// Attachments with remote id and link populated, in keep, create,
    /// update order, followed by duplicates.
    pub attachments: Vec<Attachment>,
    pub created: usize,
    pub updated: usize,
}

/// Partition candidates into keep/create/update by filename and checksum.
///
/// A page cannot hold two attachments with one name. A later candidate with
/// the same content as an earlier one becomes a duplicate; one with
/// different content is renamed with a checksum suffix.
pub fn plan(candidates: Vec<Attachment>, remote: &[RemoteAttachment]) -> Plan {
    let by_name: HashMap<&str, &RemoteAttachment> =
        remote.iter().map(|r| (r.filename.as_str(), r)).collect();
    let mut seen: HashMap<String, String> = HashMap::new();
    let mut plan = Plan::default();

    for mut attachment in candidates {
        match seen.get(&attachment.filename) {
            Some(checksum) if *checksum == attachment.checksum => {
                tracing::debug!(attachment = %attachment.filename, "Duplicate attachment");
                plan.duplicates.push(attachment);
                continue;
            }
            Some(_) => {
                let renamed = qualified_filename(&attachment.filename, &attachment.checksum);
                tracing::warn!(
                    attachment = %attachment.filename,
                    renamed = %renamed,
                    "Attachment name taken by different content"
                );
                attachment.filename = renamed;
                if seen.contains_key(&attachment.filename) {
                    plan.duplicates.push(attachment);
                    continue;
                }
            }
            None => {}
        }
        seen.insert(attachment.filename.clone(), attachment.checksum.clone());

        match by_name.get(attachment.filename.as_str()) {
            Some(existing) if existing.checksum() == Some(attachment.checksum.as_str()) => {
                plan.keep.push((attachment, (*existing).clone()));
            }
            Some(existing) => plan.update.push((attachment, (*existing).clone())),
            None => plan.create.push(attachment),
        }
    }
    plan
}

/// List remote attachments, upload what changed, and return every candidate
/// with its remote id and link.
pub fn resolve<S: AttachmentStore + ?Sized>(
    store: &S,
    page_id: &str,
    candidates: Vec<Attachment>,
) -> Result<Resolved, S::Error> {
    if candidates.is_empty() {
        return Ok(Resolved::default());
    }

    let remote = store.list_attachments(page_id)?;
    let plan = plan(candidates, &remote);
    let mut resolved = Resolved::default();

    for (attachment, existing) in plan.keep {
        tracing::debug!(attachment = %attachment.filename, "Attachment unchanged");
        resolved.attachments.push(with_remote(attachment, existing));
    }

    for attachment in plan.create {
        tracing::info!(attachment = %attachment.filename, "Creating attachment");
        let created = store.create_attachment(page_id, &attachment)?;
        resolved.created += 1;
        resolved.attachments.push(with_remote(attachment, created));
    }

    for (attachment, existing) in plan.update {
        tracing::info!(attachment = %attachment.filename, "Updating attachment");
        let updated = store.update_attachment(page_id, &existing.id, &attachment)?;
        resolved.updated += 1;
        resolved.attachments.push(with_remote(attachment, updated));
    }

    for mut duplicate in plan.duplicates {
        if let Some(original) = resolved
            .attachments
            .iter()
            .find(|a| a.filename == duplicate.filename)
        {
            duplicate.id.clone_from(&original.id);
            duplicate.link.clone_from(&original.link);
        }
        resolved.attachments.push(duplicate);
    }

    Ok(resolved)
}

fn with_remote(mut attachment: Attachment, remote: RemoteAttachment) -> Attachment {
    attachment.id = Some(remote.id);
    attachment.link = Some(remote.link);
    attachment
}
