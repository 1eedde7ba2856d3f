//! User and restriction operations for Confluence API.

use serde_json::{Value, json};
use tracing::info;

use super::types::CurrentUser;
use super::{ConfluenceClient, Method};
use crate::api::User;
use crate::error::ConfluenceError;

impl ConfluenceClient {
    pub(crate) fn get_current_user(&self) -> Result<User, ConfluenceError> {
        let url = format!("{}/user/current", self.api_url());
        let user: CurrentUser = self.get_json("get current user", &url)?;
        Ok(User {
            account_id: user.account_id,
            username: user.username,
            user_key: user.user_key,
        })
    }

    /// Replace the page's edit restriction with a single user.
    pub(crate) fn restrict_page_editing(
        &self,
        page_id: &str,
        user: &User,
    ) -> Result<(), ConfluenceError> {
        let subject = match (&user.account_id, &user.username) {
            (Some(account_id), _) => json!({"type": "known", "accountId": account_id}),
            (None, Some(username)) => json!({"type": "known", "username": username}),
            (None, None) => json!({"type": "known", "userKey": user.user_key}),
        };
        let payload = json!([{
            "operation": "update",
            "restrictions": {
                "user": [subject]
            }
        }]);

        info!(page_id, "Restricting page editing to current user");
        let url = format!("{}/content/{page_id}/restriction", self.api_url());
        let _: Value = self.send_json(
            Method::Put,
            &format!("restrict editing of page {page_id}"),
            &url,
            &payload,
        )?;
        Ok(())
    }
}
