//! Label operations for Confluence API.

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Value, json};

use super::types::{Label, Results};
use super::{ConfluenceClient, Method};
use crate::error::ConfluenceError;

impl ConfluenceClient {
    pub(crate) fn get_page_labels(&self, page_id: &str) -> Result<Vec<String>, ConfluenceError> {
        let url = format!("{}/content/{page_id}/label?limit=200", self.api_url());
        let labels: Results<Label> = self.get_json(&format!("get labels of page {page_id}"), &url)?;
        Ok(labels.results.into_iter().map(|label| label.name).collect())
    }

    pub(crate) fn add_page_labels(
        &self,
        page_id: &str,
        labels: &[String],
    ) -> Result<(), ConfluenceError> {
        if labels.is_empty() {
            return Ok(());
        }
        let payload: Vec<Value> = labels
            .iter()
            .map(|name| json!({"prefix": "global", "name": name}))
            .collect();
        let url = format!("{}/content/{page_id}/label", self.api_url());
        let _: Value = self.send_json(
            Method::Post,
            &format!("add labels to page {page_id}"),
            &url,
            &Value::Array(payload),
        )?;
        Ok(())
    }

    pub(crate) fn remove_page_label(&self, page_id: &str, label: &str) -> Result<(), ConfluenceError> {
        let url = format!(
            "{}/content/{page_id}/label/{}",
            self.api_url(),
            utf8_percent_encode(label, NON_ALPHANUMERIC)
        );
        self.request(
            Method::Delete,
            &format!("remove label {label} from page {page_id}"),
            &url,
            None,
        )?;
        Ok(())
    }
}
