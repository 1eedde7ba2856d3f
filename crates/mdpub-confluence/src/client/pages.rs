//! Page operations for Confluence API.

use mdpub_meta::PageType;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::json;
use tracing::info;

use super::types::{Content, Results, Space};
use super::{ConfluenceClient, Method};
use crate::api::{PageInfo, PageUpdate};
use crate::error::ConfluenceError;

/// Fields expanded on every page lookup.
const PAGE_EXPAND: &str = "ancestors,version";

fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

impl ConfluenceClient {
    pub(crate) fn find_page_by_title(
        &self,
        space: &str,
        title: &str,
        page_type: PageType,
    ) -> Result<Option<PageInfo>, ConfluenceError> {
        let url = format!(
            "{}/content?spaceKey={}&title={}&type={}&expand={PAGE_EXPAND}",
            self.api_url(),
            encode(space),
            encode(title),
            page_type.as_str(),
        );
        let operation = format!("find {} \"{title}\" in space {space}", page_type.as_str());
        let found: Results<Content> = self.get_json(&operation, &url)?;

        Ok(found
            .results
            .into_iter()
            .find(|content| content.title == title)
            .map(|content| content.into_page(&self.base_url)))
    }

    pub(crate) fn get_page_by_id(&self, page_id: &str) -> Result<PageInfo, ConfluenceError> {
        let url = format!(
            "{}/content/{}?expand={PAGE_EXPAND}",
            self.api_url(),
            encode(page_id)
        );
        let content: Content = self.get_json(&format!("get page {page_id}"), &url)?;
        Ok(content.into_page(&self.base_url))
    }

    pub(crate) fn get_home_page(&self, space: &str) -> Result<PageInfo, ConfluenceError> {
        let operation = format!("find home page of space {space}");
        let url = format!("{}/space/{}?expand=homepage", self.api_url(), encode(space));
        let found: Space = self.get_json(&operation, &url)?;
        let home = found
            .homepage
            .ok_or(ConfluenceError::NotFound { operation })?;
        self.get_page_by_id(&home.id)
    }

    pub(crate) fn create_content(
        &self,
        space: &str,
        page_type: PageType,
        parent: Option<&PageInfo>,
        title: &str,
        body: &str,
    ) -> Result<PageInfo, ConfluenceError> {
        let mut payload = json!({
            "type": page_type.as_str(),
            "title": title,
            "space": {"key": space},
            "body": {
                "storage": {
                    "value": body,
                    "representation": "storage"
                }
            }
        });
        if page_type == PageType::Page
            && let Some(parent) = parent
        {
            payload["ancestors"] = json!([{"id": parent.id}]);
        }

        info!(space, title, parent = parent.map(|p| p.title.as_str()), "Creating page");
        let url = format!("{}/content", self.api_url());
        let operation = format!("create {} \"{title}\"", page_type.as_str());
        let content: Content = self.send_json(Method::Post, &operation, &url, &payload)?;
        Ok(content.into_page(&self.base_url))
    }

    pub(crate) fn update_content(
        &self,
        page: &PageInfo,
        update: &PageUpdate<'_>,
    ) -> Result<PageInfo, ConfluenceError> {
        let mut payload = json!({
            "id": page.id,
            "type": update.page_type.as_str(),
            "title": update.title,
            "version": {
                "number": update.version,
                "minorEdit": update.minor_edit,
                "message": update.version_message
            },
            "body": {
                "storage": {
                    "value": update.body,
                    "representation": "storage"
                }
            },
            "metadata": {
                "properties": {
                    "content-appearance-published": {
                        "key": "content-appearance-published",
                        "value": update.content_appearance.as_str()
                    },
                    "content-appearance-draft": {
                        "key": "content-appearance-draft",
                        "value": update.content_appearance.as_str()
                    }
                }
            }
        });
        if let Some(parent_id) = update.parent_id {
            payload["ancestors"] = json!([{"id": parent_id}]);
        }
        if !update.emoji.is_empty() {
            payload["metadata"]["properties"]["emoji-title-published"] = json!({
                "key": "emoji-title-published",
                "value": emoji_property(update.emoji)
            });
        }

        info!(
            page_id = %page.id,
            from = page.version,
            to = update.version,
            "Updating page"
        );
        let url = format!("{}/content/{}", self.api_url(), encode(&page.id));
        let operation = format!("update page {} \"{}\"", page.id, update.title);
        let content: Content = self.send_json(Method::Put, &operation, &url, &payload)?;
        Ok(content.into_page(&self.base_url))
    }
}

/// Title emoji property value: hex code points joined by `-`.
fn emoji_property(emoji: &str) -> String {
    emoji
        .chars()
        .filter(|c| *c != '\u{FE0F}')
        .map(|c| format!("{:x}", u32::from(c)))
        .collect::<Vec<_>>()
        .join("-")
}
