//! Wire types of the Confluence REST API.

use serde::Deserialize;

use crate::api::{Ancestor, PageInfo};

/// Paged list response.
#[derive(Debug, Deserialize)]
pub(super) struct Results<T> {
    pub results: Vec<T>,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

/// Page or blog post.
#[derive(Debug, Deserialize)]
pub(super) struct Content {
    pub id: String,
    #[serde(rename = "type", default)]
    pub content_type: String,
    pub title: String,
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub ancestors: Vec<ContentRef>,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

impl Content {
    pub fn into_page(self, base_url: &str) -> PageInfo {
        let (version, version_message) = self
            .version
            .map(|v| (v.number, v.message))
            .unwrap_or_default();
        let link = match self.links.webui {
            Some(webui) => format!("{base_url}{webui}"),
            None => format!("{base_url}/pages/viewpage.action?pageId={}", self.id),
        };
        PageInfo {
            id: self.id,
            title: self.title,
            page_type: self.content_type,
            version,
            version_message,
            ancestors: self
                .ancestors
                .into_iter()
                .map(|a| Ancestor {
                    id: a.id,
                    title: a.title,
                })
                .collect(),
            link,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ContentRef {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct Version {
    pub number: u32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct Links {
    #[serde(default)]
    pub webui: Option<String>,
    #[serde(default)]
    pub download: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    /// Next page of a paged list, relative to the base URL.
    #[serde(default)]
    pub next: Option<String>,
}

/// Space with its expanded home page.
#[derive(Debug, Deserialize)]
pub(super) struct Space {
    #[serde(default)]
    pub homepage: Option<ContentRef>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RemoteAttachment {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub metadata: AttachmentMetadata,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct AttachmentMetadata {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct Label {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CurrentUser {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub user_key: Option<String>,
}
