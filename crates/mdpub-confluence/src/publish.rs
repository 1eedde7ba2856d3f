//! Publishing a document to its Confluence page.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use mdpub_attachments::{Attachment, checksum, load_local, plan, resolve, substitute_links};
use mdpub_meta::{Meta, PageType};
use mdpub_renderer::{CompileOptions, Compiler, DiagramRenderer};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::ancestry::{ensure_ancestry, validate_ancestry};
use crate::api::{ConfluenceApi, PageInfo, PageUpdate};
use crate::document::Document;
use crate::error::PublishError;
use crate::labels::{LabelChanges, reconcile_labels};

/// Delay between creating a page and its first update.
pub const DEFAULT_CREATE_GRACE: Duration = Duration::from_secs(1);

/// Content hash suffix of version messages written by the publisher.
static VERSION_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[v([0-9a-f]{64})\]\s*$").unwrap());

/// Publishing behavior shared by every document of a run.
#[derive(Clone, Debug)]
pub struct PublishOptions {
    /// Resolve pages read-only and report what would change.
    pub dry_run: bool,
    /// Skip the page update when the rendered body is unchanged.
    pub changes_only: bool,
    pub minor_edit: bool,
    pub version_message: String,
    /// Restrict editing to the publishing user.
    pub edit_lock: bool,
    /// Delay after creating the target page before updating it.
    pub create_grace: Duration,
    /// Publish to this page instead of resolving one by title.
    pub page_id: Option<String>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            changes_only: false,
            minor_edit: false,
            version_message: String::new(),
            edit_lock: false,
            create_grace: DEFAULT_CREATE_GRACE,
            page_id: None,
        }
    }
}

/// What publishing one document did (or, in dry-run, would do).
#[derive(Clone, Debug, Default)]
pub struct PublishReport {
    pub path: PathBuf,
    pub title: String,
    /// `None` when the page does not exist and this was a dry run.
    pub page_id: Option<String>,
    pub link: Option<String>,
    /// Version after publishing.
    pub version: Option<u32>,
    /// Titles of pages created for ancestry and the target itself.
    pub created_pages: Vec<String>,
    pub attachments_created: usize,
    pub attachments_updated: usize,
    /// Whether the page body was written.
    pub updated: bool,
    /// The body matched the hash of the current version.
    pub unchanged: bool,
    pub labels: LabelChanges,
    pub warnings: Vec<String>,
    pub dry_run: bool,
}

/// Publishes documents through a [`ConfluenceApi`].
pub struct Publisher<'a, A: ConfluenceApi + ?Sized> {
    api: &'a A,
    compile: CompileOptions,
    diagrams: Option<&'a dyn DiagramRenderer>,
    options: PublishOptions,
}

impl<'a, A: ConfluenceApi + ?Sized> Publisher<'a, A> {
    #[must_use]
    pub fn new(api: &'a A, compile: CompileOptions, options: PublishOptions) -> Self {
        Self {
            api,
            compile,
            diagrams: None,
            options,
        }
    }

    #[must_use]
    pub fn with_diagrams(mut self, renderer: &'a dyn DiagramRenderer) -> Self {
        self.diagrams = Some(renderer);
        self
    }

    /// Compiler for `document`, resolving local files against its directory.
    pub fn compiler(&self, document: &Document) -> Compiler<'a> {
        compiler_for(document, &self.compile, self.diagrams)
    }

    /// Publish one document.
    ///
    /// Resolves (or creates) the target page, uploads changed attachments,
    /// updates the body with version `current + 1`, reconciles labels and
    /// optionally restricts editing.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] for missing metadata, unreadable includes or
    /// attachments, ancestry mismatches and failed remote calls.
    pub fn publish(&self, document: &Document) -> Result<PublishReport, PublishError> {
        let meta = match &self.options.page_id {
            Some(_) => document.meta.clone().unwrap_or_default(),
            None => document.require_meta()?.clone(),
        };
        let mut report = PublishReport {
            path: document.path.clone(),
            title: meta.title.clone(),
            dry_run: self.options.dry_run,
            warnings: document.warnings.clone(),
            ..PublishReport::default()
        };

        let target = self.resolve_target(&meta, &mut report)?;

        let declared = load_local(&document.base_dir, &meta.attachments).map_err(|source| {
            PublishError::Attachment {
                path: document.path.clone(),
                source,
            }
        })?;

        let Some(target) = target else {
            // Dry run for a page that does not exist yet.
            let compiler = self.compiler(document);
            let page = document.render(&compiler, &document.markdown)?;
            report.attachments_created = declared.len() + page.attachments.len();
            report.warnings.extend(page.warnings);
            return Ok(report);
        };
        report.page_id = Some(target.page.id.clone());
        report.link = Some(target.page.link.clone());
        report.version = Some(target.page.version);
        if report.title.is_empty() {
            report.title.clone_from(&target.page.title);
        }

        let markdown = if self.options.dry_run {
            self.count_uploads(&target.page.id, declared, &mut report)?;
            document.markdown.clone()
        } else {
            let resolved = resolve(self.api, &target.page.id, declared)?;
            report.attachments_created += resolved.created;
            report.attachments_updated += resolved.updated;
            let substituted = substitute_links(&document.markdown, &resolved.attachments);
            for token in substituted.unused {
                warn!(path = %document.path.display(), attachment = %token, "Attachment is not referenced");
                report
                    .warnings
                    .push(format!("attachment {token} is not referenced in the document"));
            }
            substituted.text
        };

        let compiler = self.compiler(document);
        let page = document.render(&compiler, &markdown)?;
        report.warnings.extend(page.warnings);

        if self.options.dry_run {
            self.count_uploads(&target.page.id, page.attachments, &mut report)?;
        } else {
            let resolved = resolve(self.api, &target.page.id, page.attachments)?;
            report.attachments_created += resolved.created;
            report.attachments_updated += resolved.updated;
        }

        let hash = checksum(page.markup.as_bytes());
        if self.options.changes_only && version_hash(&target.page.version_message) == Some(hash.as_str()) {
            info!(page_id = %target.page.id, "Page content unchanged, skipping update");
            report.unchanged = true;
        } else if !self.options.dry_run {
            let version_message = version_message(&self.options.version_message, &hash);
            let title = if meta.title.is_empty() {
                target.page.title.as_str()
            } else {
                meta.title.as_str()
            };
            let update = PageUpdate {
                title,
                body: &page.markup,
                version: target.page.version + 1,
                page_type: meta.page_type,
                parent_id: target.parent_id.as_deref(),
                minor_edit: self.options.minor_edit,
                version_message: &version_message,
                content_appearance: meta.content_appearance,
                emoji: &meta.emoji,
            };
            let updated = self.api.update_page(&target.page, &update)?;
            report.version = Some(updated.version);
            report.updated = true;
        }

        // Without a header there is no label set to reconcile against.
        if document.meta.is_some() {
            report.labels = reconcile_labels(self.api, &target.page.id, &meta.labels, self.options.dry_run)?;
        }

        if self.options.edit_lock && !self.options.dry_run {
            let user = self.api.current_user()?;
            self.api.restrict_editing(&target.page.id, &user)?;
        }

        Ok(report)
    }

    fn resolve_target(&self, meta: &Meta, report: &mut PublishReport) -> Result<Option<Target>, PublishError> {
        if let Some(page_id) = &self.options.page_id {
            let page = self.api.get_page(page_id)?;
            let parent_id = page.parent().map(|parent| parent.id.clone());
            return Ok(Some(Target { page, parent_id }));
        }

        if meta.page_type == PageType::BlogPost {
            let existing = self.api.find_page(&meta.space, &meta.title, PageType::BlogPost)?;
            return match existing {
                Some(page) => Ok(Some(Target {
                    page,
                    parent_id: None,
                })),
                None => self.create_target(meta, None, None, report),
            };
        }

        let mut chain = meta.parents.clone();
        chain.push(meta.title.clone());
        let existing = validate_ancestry(self.api, &meta.space, &chain)?;

        if let Some(page) = &existing
            && meta.parents.is_empty()
        {
            let parent_id = page.parent().map(|parent| parent.id.clone());
            return Ok(Some(Target {
                page: page.clone(),
                parent_id,
            }));
        }

        let ancestry = ensure_ancestry(self.api, &meta.space, &meta.parents, self.options.dry_run)?;
        report.created_pages.extend(ancestry.created);
        let parent_id = ancestry.parent.as_ref().map(|parent| parent.id.clone());

        match existing {
            Some(page) => Ok(Some(Target { page, parent_id })),
            None => self.create_target(meta, ancestry.parent.as_ref(), parent_id, report),
        }
    }

    fn create_target(
        &self,
        meta: &Meta,
        parent: Option<&PageInfo>,
        parent_id: Option<String>,
        report: &mut PublishReport,
    ) -> Result<Option<Target>, PublishError> {
        report.created_pages.push(meta.title.clone());
        if self.options.dry_run {
            info!(space = %meta.space, title = %meta.title, "Dry run: would create page");
            return Ok(None);
        }

        let page = self
            .api
            .create_page(&meta.space, meta.page_type, parent, &meta.title, "")?;
        debug!(page_id = %page.id, grace = ?self.options.create_grace, "Waiting after page creation");
        std::thread::sleep(self.options.create_grace);
        Ok(Some(Target { page, parent_id }))
    }

    /// Record what resolving `candidates` would upload, without uploading.
    fn count_uploads(
        &self,
        page_id: &str,
        candidates: Vec<Attachment>,
        report: &mut PublishReport,
    ) -> Result<(), PublishError> {
        if candidates.is_empty() {
            return Ok(());
        }
        let remote = self.api.list_attachments(page_id)?;
        let plan = plan(candidates, &remote);
        report.attachments_created += plan.create.len();
        report.attachments_updated += plan.update.len();
        Ok(())
    }
}

/// Resolved target page and the parent to send back on update.
struct Target {
    page: PageInfo,
    parent_id: Option<String>,
}

/// Compiler for `document` with its directory as the image base.
pub fn compiler_for<'a>(
    document: &Document,
    options: &CompileOptions,
    diagrams: Option<&'a dyn DiagramRenderer>,
) -> Compiler<'a> {
    let mut options = options.clone();
    options.base_dir.clone_from(&document.base_dir);
    let compiler = Compiler::new(options);
    match diagrams {
        Some(renderer) => compiler.with_diagrams(renderer),
        None => compiler,
    }
}

/// Content hash embedded in a version message, if any.
pub fn version_hash(message: &str) -> Option<&str> {
    VERSION_HASH_RE
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Version message with the content hash suffix.
pub fn version_message(message: &str, hash: &str) -> String {
    let message = message.trim();
    if message.is_empty() {
        format!("[v{hash}]")
    } else {
        format!("{message} [v{hash}]")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    #[test]
    fn test_version_message() {
        assert_eq!(version_message("", HASH), format!("[v{HASH}]"));
        assert_eq!(version_message(" sync ", HASH), format!("sync [v{HASH}]"));
    }

    #[test]
    fn test_version_hash() {
        assert_eq!(version_hash(&version_message("sync", HASH)), Some(HASH));
        assert_eq!(version_hash(&format!("[v{HASH}] ")), Some(HASH));
        assert_eq!(version_hash("edited in browser"), None);
        assert_eq!(version_hash("[vabc]"), None);
    }
}
