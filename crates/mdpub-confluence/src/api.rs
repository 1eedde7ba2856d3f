//! Remote operations the publisher relies on.

use mdpub_attachments::AttachmentStore;
use mdpub_meta::{ContentAppearance, PageType};

use crate::error::ConfluenceError;

/// Page (or blog post) as seen by the publisher.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub id: String,
    pub title: String,
    /// `page` or `blogpost`.
    pub page_type: String,
    pub version: u32,
    /// Message of the current version.
    pub version_message: String,
    /// Ancestors, outermost first; the nearest is last.
    pub ancestors: Vec<Ancestor>,
    /// Web UI link.
    pub link: String,
}

impl PageInfo {
    pub fn ancestor_titles(&self) -> Vec<String> {
        self.ancestors.iter().map(|a| a.title.clone()).collect()
    }

    pub fn parent(&self) -> Option<&Ancestor> {
        self.ancestors.last()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ancestor {
    pub id: String,
    pub title: String,
}

/// New body and properties for an existing page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageUpdate<'a> {
    pub title: &'a str,
    pub body: &'a str,
    /// Version number to write; always the current version plus one.
    pub version: u32,
    pub page_type: PageType,
    /// Nearest ancestor. The API accepts exactly one.
    pub parent_id: Option<&'a str>,
    pub minor_edit: bool,
    pub version_message: &'a str,
    pub content_appearance: ContentAppearance,
    /// Title emoji; empty leaves the property unset.
    pub emoji: &'a str,
}

/// Account the client authenticates as.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct User {
    pub account_id: Option<String>,
    pub username: Option<String>,
    pub user_key: Option<String>,
}

/// Confluence operations used for publishing.
pub trait ConfluenceApi: AttachmentStore<Error = ConfluenceError> {
    /// Find a page by exact title within a space.
    fn find_page(
        &self,
        space: &str,
        title: &str,
        page_type: PageType,
    ) -> Result<Option<PageInfo>, ConfluenceError>;

    fn get_page(&self, page_id: &str) -> Result<PageInfo, ConfluenceError>;

    /// Home page of a space; the root for pages without ancestors.
    fn find_home_page(&self, space: &str) -> Result<PageInfo, ConfluenceError>;

    /// Create an empty page. Blog posts ignore `parent`.
    fn create_page(
        &self,
        space: &str,
        page_type: PageType,
        parent: Option<&PageInfo>,
        title: &str,
        body: &str,
    ) -> Result<PageInfo, ConfluenceError>;

    fn update_page(
        &self,
        page: &PageInfo,
        update: &PageUpdate<'_>,
    ) -> Result<PageInfo, ConfluenceError>;

    fn get_labels(&self, page_id: &str) -> Result<Vec<String>, ConfluenceError>;

    /// Add labels in one request.
    fn add_labels(&self, page_id: &str, labels: &[String]) -> Result<(), ConfluenceError>;

    fn remove_label(&self, page_id: &str, label: &str) -> Result<(), ConfluenceError>;

    fn current_user(&self) -> Result<User, ConfluenceError>;

    /// Allow only `user` to edit the page.
    fn restrict_editing(&self, page_id: &str, user: &User) -> Result<(), ConfluenceError>;
}
