//! Confluence REST API client.
//!
//! Sync client for the Confluence Server/Data Center (and Cloud v1) REST
//! API with basic or bearer authentication. Idempotent requests are retried
//! a bounded number of times on transport errors, `429` and `5xx`.

mod attachments;
mod labels;
mod pages;
mod types;
mod users;

use std::thread;
use std::time::Duration;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use mdpub_meta::PageType;
use serde::de::DeserializeOwned;
use ureq::Agent;

use crate::api::{ConfluenceApi, PageInfo, PageUpdate, User};
use crate::error::ConfluenceError;

/// Default HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 2;

/// Credentials sent with every request.
#[derive(Clone, Debug)]
pub enum Auth {
    Basic { username: String, password: String },
    Bearer(String),
    Anonymous,
}

impl Auth {
    fn header(&self) -> Option<String> {
        match self {
            Self::Basic { username, password } => Some(format!(
                "Basic {}",
                BASE64_STANDARD.encode(format!("{username}:{password}"))
            )),
            Self::Bearer(token) => Some(format!("Bearer {token}")),
            Self::Anonymous => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    fn is_idempotent(self) -> bool {
        !matches!(self, Self::Post)
    }
}

/// Request body with its content type.
struct Payload<'a> {
    content_type: &'a str,
    data: &'a [u8],
}

/// Confluence REST API client.
pub struct ConfluenceClient {
    agent: Agent,
    base_url: String,
    auth: Option<String>,
    retries: u32,
    retry_delay: Duration,
}

impl ConfluenceClient {
    pub fn new(base_url: &str, auth: &Auth) -> Self {
        Self::with_timeout(base_url, auth, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, auth: &Auth, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
            auth: auth.header(),
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self) -> String {
        format!("{}/rest/api", self.base_url)
    }

    /// Send a request and return the body of a successful response.
    fn request(
        &self,
        method: Method,
        operation: &str,
        url: &str,
        payload: Option<&Payload<'_>>,
    ) -> Result<String, ConfluenceError> {
        let attempts = if method.is_idempotent() {
            self.retries + 1
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            match self.send_once(method, operation, url, payload) {
                Err(err) if attempt < attempts && is_retryable(&err) => {
                    tracing::warn!(operation, attempt, error = %err, "Retrying request");
                    thread::sleep(self.retry_delay * attempt);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn send_once(
        &self,
        method: Method,
        operation: &str,
        url: &str,
        payload: Option<&Payload<'_>>,
    ) -> Result<String, ConfluenceError> {
        tracing::debug!(?method, url, "Confluence request");
        let auth = self.auth.as_deref();

        let result = match method {
            Method::Get | Method::Delete => {
                let mut request = if method == Method::Get {
                    self.agent.get(url)
                } else {
                    self.agent.delete(url)
                };
                request = request.header("Accept", "application/json");
                if let Some(auth) = auth {
                    request = request.header("Authorization", auth);
                }
                request.call()
            }
            Method::Post | Method::Put => {
                let mut request = if method == Method::Post {
                    self.agent.post(url)
                } else {
                    self.agent.put(url)
                };
                request = request
                    .header("Accept", "application/json")
                    .header("X-Atlassian-Token", "nocheck");
                if let Some(auth) = auth {
                    request = request.header("Authorization", auth);
                }
                match payload {
                    Some(payload) => request
                        .header("Content-Type", payload.content_type)
                        .send(payload.data),
                    None => request.send_empty(),
                }
            }
        };

        let response = result.map_err(|source| ConfluenceError::Transport {
            operation: operation.to_owned(),
            source,
        })?;

        let status = response.status().as_u16();
        let mut body = response.into_body();
        let text = body
            .read_to_string()
            .unwrap_or_else(|_| String::from("(unable to read response body)"));

        if status >= 400 {
            return Err(ConfluenceError::Http {
                operation: operation.to_owned(),
                status,
                body: text,
            });
        }
        Ok(text)
    }

    fn get_json<T: DeserializeOwned>(&self, operation: &str, url: &str) -> Result<T, ConfluenceError> {
        let body = self.request(Method::Get, operation, url, None)?;
        parse_json(operation, &body)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        operation: &str,
        url: &str,
        value: &serde_json::Value,
    ) -> Result<T, ConfluenceError> {
        let data = serde_json::to_vec(value).map_err(|source| ConfluenceError::Json {
            operation: operation.to_owned(),
            source,
        })?;
        let payload = Payload {
            content_type: "application/json",
            data: &data,
        };
        let body = self.request(method, operation, url, Some(&payload))?;
        parse_json(operation, &body)
    }
}

impl ConfluenceApi for ConfluenceClient {
    fn find_page(
        &self,
        space: &str,
        title: &str,
        page_type: PageType,
    ) -> Result<Option<PageInfo>, ConfluenceError> {
        self.find_page_by_title(space, title, page_type)
    }

    fn get_page(&self, page_id: &str) -> Result<PageInfo, ConfluenceError> {
        self.get_page_by_id(page_id)
    }

    fn find_home_page(&self, space: &str) -> Result<PageInfo, ConfluenceError> {
        self.get_home_page(space)
    }

    fn create_page(
        &self,
        space: &str,
        page_type: PageType,
        parent: Option<&PageInfo>,
        title: &str,
        body: &str,
    ) -> Result<PageInfo, ConfluenceError> {
        self.create_content(space, page_type, parent, title, body)
    }

    fn update_page(
        &self,
        page: &PageInfo,
        update: &PageUpdate<'_>,
    ) -> Result<PageInfo, ConfluenceError> {
        self.update_content(page, update)
    }

    fn get_labels(&self, page_id: &str) -> Result<Vec<String>, ConfluenceError> {
        self.get_page_labels(page_id)
    }

    fn add_labels(&self, page_id: &str, labels: &[String]) -> Result<(), ConfluenceError> {
        self.add_page_labels(page_id, labels)
    }

    fn remove_label(&self, page_id: &str, label: &str) -> Result<(), ConfluenceError> {
        self.remove_page_label(page_id, label)
    }

    fn current_user(&self) -> Result<User, ConfluenceError> {
        self.get_current_user()
    }

    fn restrict_editing(&self, page_id: &str, user: &User) -> Result<(), ConfluenceError> {
        self.restrict_page_editing(page_id, user)
    }
}

fn parse_json<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T, ConfluenceError> {
    serde_json::from_str(body).map_err(|source| ConfluenceError::Json {
        operation: operation.to_owned(),
        source,
    })
}

fn is_retryable(err: &ConfluenceError) -> bool {
    match err {
        ConfluenceError::Transport { .. } => true,
        ConfluenceError::Http { status, .. } => *status == 429 || *status >= 500,
        _ => false,
    }
}
