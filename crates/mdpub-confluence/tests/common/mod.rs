//! In-memory Confluence used by the publishing tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use mdpub_attachments::{Attachment, AttachmentStore, RemoteAttachment};
use mdpub_confluence::{
    Ancestor, ConfluenceApi, ConfluenceError, Document, DocumentOptions, PageInfo, PageUpdate, User,
};
use mdpub_meta::PageType;
use mdpub_renderer::{DiagramFailure, DiagramRenderer, RenderedDiagram};

#[derive(Clone, Debug, Default)]
pub struct StoredPage {
    pub info: PageInfo,
    pub body: String,
    pub labels: Vec<String>,
    pub attachments: Vec<RemoteAttachment>,
}

/// Page update as received by the fake.
#[derive(Clone, Debug)]
pub struct RecordedUpdate {
    pub page_id: String,
    pub title: String,
    pub version: u32,
    pub body: String,
    pub parent_id: Option<String>,
    pub version_message: String,
    pub minor_edit: bool,
    pub emoji: String,
}

#[derive(Debug, Default)]
pub struct Calls {
    pub find_page: Cell<usize>,
    pub find_home_page: Cell<usize>,
    pub create_page: Cell<usize>,
    pub update_page: Cell<usize>,
    pub list_attachments: Cell<usize>,
    pub create_attachment: Cell<usize>,
    pub update_attachment: Cell<usize>,
    pub add_labels: Cell<usize>,
    pub remove_label: Cell<usize>,
    pub restrict_editing: Cell<usize>,
}

fn bump(counter: &Cell<usize>) {
    counter.set(counter.get() + 1);
}

/// Single-space Confluence with a home page `Home` (id `home`).
#[derive(Debug)]
pub struct FakeConfluence {
    pub pages: RefCell<Vec<StoredPage>>,
    pub updates: RefCell<Vec<RecordedUpdate>>,
    /// `(parent title, title)` of every created page, in order.
    pub created: RefCell<Vec<(String, String)>>,
    pub restricted: RefCell<Vec<(String, User)>>,
    pub calls: Calls,
    next_id: Cell<usize>,
}

impl FakeConfluence {
    pub fn new() -> Self {
        let home = StoredPage {
            info: PageInfo {
                id: "home".to_owned(),
                title: "Home".to_owned(),
                page_type: "page".to_owned(),
                version: 1,
                ..PageInfo::default()
            },
            ..StoredPage::default()
        };
        Self {
            pages: RefCell::new(vec![home]),
            updates: RefCell::default(),
            created: RefCell::default(),
            restricted: RefCell::default(),
            calls: Calls::default(),
            next_id: Cell::new(1),
        }
    }

    /// Add a page under the chain of ancestor titles, which must exist.
    pub fn add_page(&self, title: &str, ancestors: &[&str], version: u32) -> String {
        let ancestors = ancestors
            .iter()
            .map(|title| Ancestor {
                id: self.page_by_title(title).map(|p| p.info.id).unwrap_or_default(),
                title: (*title).to_owned(),
            })
            .collect();
        let id = self.next_id("page");
        self.pages.borrow_mut().push(StoredPage {
            info: PageInfo {
                id: id.clone(),
                title: title.to_owned(),
                page_type: "page".to_owned(),
                version,
                ancestors,
                ..PageInfo::default()
            },
            ..StoredPage::default()
        });
        id
    }

    pub fn page_by_title(&self, title: &str) -> Option<StoredPage> {
        self.pages
            .borrow()
            .iter()
            .find(|p| p.info.title == title)
            .cloned()
    }

    pub fn set_labels(&self, page_id: &str, labels: &[&str]) {
        self.with_page(page_id, |page| {
            page.labels = labels.iter().map(|l| (*l).to_owned()).collect();
        });
    }

    fn next_id(&self, prefix: &str) -> String {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        format!("{prefix}-{id}")
    }

    fn with_page<T>(&self, page_id: &str, f: impl FnOnce(&mut StoredPage) -> T) -> Result<T, ConfluenceError> {
        let mut pages = self.pages.borrow_mut();
        let page = pages
            .iter_mut()
            .find(|p| p.info.id == page_id)
            .ok_or_else(|| ConfluenceError::NotFound {
                operation: format!("page {page_id}"),
            })?;
        Ok(f(page))
    }
}

impl AttachmentStore for FakeConfluence {
    type Error = ConfluenceError;

    fn list_attachments(&self, page_id: &str) -> Result<Vec<RemoteAttachment>, ConfluenceError> {
        bump(&self.calls.list_attachments);
        self.with_page(page_id, |page| page.attachments.clone())
    }

    fn create_attachment(
        &self,
        page_id: &str,
        attachment: &Attachment,
    ) -> Result<RemoteAttachment, ConfluenceError> {
        bump(&self.calls.create_attachment);
        let remote = RemoteAttachment {
            id: self.next_id("att"),
            filename: attachment.filename.clone(),
            comment: attachment.comment(),
            link: format!("/download/attachments/{page_id}/{}", attachment.filename),
        };
        self.with_page(page_id, |page| page.attachments.push(remote.clone()))?;
        Ok(remote)
    }

    fn update_attachment(
        &self,
        page_id: &str,
        attachment_id: &str,
        attachment: &Attachment,
    ) -> Result<RemoteAttachment, ConfluenceError> {
        bump(&self.calls.update_attachment);
        self.with_page(page_id, |page| {
            page.attachments
                .iter_mut()
                .find(|a| a.id == attachment_id)
                .map(|existing| {
                    existing.comment = attachment.comment();
                    existing.clone()
                })
        })?
        .ok_or_else(|| ConfluenceError::NotFound {
            operation: format!("attachment {attachment_id}"),
        })
    }
}

impl ConfluenceApi for FakeConfluence {
    fn find_page(
        &self,
        _space: &str,
        title: &str,
        page_type: PageType,
    ) -> Result<Option<PageInfo>, ConfluenceError> {
        bump(&self.calls.find_page);
        Ok(self
            .pages
            .borrow()
            .iter()
            .find(|p| p.info.title == title && p.info.page_type == page_type.as_str())
            .map(|p| p.info.clone()))
    }

    fn get_page(&self, page_id: &str) -> Result<PageInfo, ConfluenceError> {
        self.with_page(page_id, |page| page.info.clone())
    }

    fn find_home_page(&self, _space: &str) -> Result<PageInfo, ConfluenceError> {
        bump(&self.calls.find_home_page);
        self.get_page("home")
    }

    fn create_page(
        &self,
        _space: &str,
        page_type: PageType,
        parent: Option<&PageInfo>,
        title: &str,
        body: &str,
    ) -> Result<PageInfo, ConfluenceError> {
        bump(&self.calls.create_page);
        let ancestors = match (page_type, parent) {
            (PageType::Page, Some(parent)) => {
                let mut ancestors = parent.ancestors.clone();
                ancestors.push(Ancestor {
                    id: parent.id.clone(),
                    title: parent.title.clone(),
                });
                ancestors
            }
            _ => Vec::new(),
        };
        let info = PageInfo {
            id: self.next_id("page"),
            title: title.to_owned(),
            page_type: page_type.as_str().to_owned(),
            version: 1,
            ancestors,
            ..PageInfo::default()
        };
        self.created.borrow_mut().push((
            parent.map(|p| p.title.clone()).unwrap_or_default(),
            title.to_owned(),
        ));
        self.pages.borrow_mut().push(StoredPage {
            info: info.clone(),
            body: body.to_owned(),
            ..StoredPage::default()
        });
        Ok(info)
    }

    fn update_page(
        &self,
        page: &PageInfo,
        update: &PageUpdate<'_>,
    ) -> Result<PageInfo, ConfluenceError> {
        bump(&self.calls.update_page);
        self.updates.borrow_mut().push(RecordedUpdate {
            page_id: page.id.clone(),
            title: update.title.to_owned(),
            version: update.version,
            body: update.body.to_owned(),
            parent_id: update.parent_id.map(str::to_owned),
            version_message: update.version_message.to_owned(),
            minor_edit: update.minor_edit,
            emoji: update.emoji.to_owned(),
        });
        self.with_page(&page.id, |stored| {
            if update.version != stored.info.version + 1 {
                return Err(ConfluenceError::Http {
                    operation: format!("update page {}", page.id),
                    status: 409,
                    body: "version conflict".to_owned(),
                });
            }
            stored.info.version = update.version;
            update.title.clone_into(&mut stored.info.title);
            update.version_message.clone_into(&mut stored.info.version_message);
            update.body.clone_into(&mut stored.body);
            Ok(stored.info.clone())
        })?
    }

    fn get_labels(&self, page_id: &str) -> Result<Vec<String>, ConfluenceError> {
        self.with_page(page_id, |page| page.labels.clone())
    }

    fn add_labels(&self, page_id: &str, labels: &[String]) -> Result<(), ConfluenceError> {
        bump(&self.calls.add_labels);
        self.with_page(page_id, |page| page.labels.extend_from_slice(labels))
    }

    fn remove_label(&self, page_id: &str, label: &str) -> Result<(), ConfluenceError> {
        bump(&self.calls.remove_label);
        self.with_page(page_id, |page| page.labels.retain(|l| l != label))
    }

    fn current_user(&self) -> Result<User, ConfluenceError> {
        Ok(User {
            account_id: Some("acc-1".to_owned()),
            username: Some("publisher".to_owned()),
            user_key: None,
        })
    }

    fn restrict_editing(&self, page_id: &str, user: &User) -> Result<(), ConfluenceError> {
        bump(&self.calls.restrict_editing);
        self.restricted
            .borrow_mut()
            .push((page_id.to_owned(), user.clone()));
        Ok(())
    }
}

/// Renders every `mermaid` block to a fixed 1x1 PNG.
#[derive(Debug, Default)]
pub struct FakeDiagrams {
    pub calls: Cell<usize>,
}

impl DiagramRenderer for FakeDiagrams {
    fn supports(&self, language: &str) -> bool {
        language == "mermaid"
    }

    fn render(&self, _language: &str, source: &str) -> Result<RenderedDiagram, DiagramFailure> {
        bump(&self.calls);
        let mut png = png_header(120, 40);
        png.extend_from_slice(source.as_bytes());
        Ok(RenderedDiagram {
            png,
            width: 120,
            height: 40,
        })
    }
}

/// Minimal PNG signature and IHDR chunk with the given dimensions.
pub fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data
}

/// Write `files` under `dir` (creating parent directories) and load the
/// document at `page`.
pub fn document(dir: &Path, page: &str, files: &[(&str, &[u8])]) -> Document {
    for (name, content) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    let path: PathBuf = dir.join(page);
    Document::load(&path, &DocumentOptions::default()).unwrap()
}
