//! Attachment operations for Confluence API.

use std::borrow::Cow;

use mdpub_attachments::{Attachment, AttachmentStore, RemoteAttachment};
use rand::RngExt;
use tracing::info;

use super::types::{RemoteAttachment as WireAttachment, Results};
use super::{ConfluenceClient, Method, Payload};
use crate::error::ConfluenceError;

/// Attachments requested per listing call; further pages follow `_links.next`.
const ATTACHMENT_PAGE_SIZE: usize = 200;

impl ConfluenceClient {
    /// Path prefix of the server (`/confluence` for `https://host/confluence`).
    fn context_path(&self) -> &str {
        let without_scheme = self
            .base_url
            .split_once("://")
            .map_or(self.base_url.as_str(), |(_, rest)| rest);
        without_scheme.find('/').map_or("", |i| &without_scheme[i..])
    }

    fn to_remote(&self, wire: WireAttachment) -> RemoteAttachment {
        let download = wire.links.download.unwrap_or_default();
        RemoteAttachment {
            id: wire.id,
            filename: wire.title,
            comment: wire.metadata.comment,
            link: format!("{}{download}", self.context_path()),
        }
    }

    fn upload(
        &self,
        operation: &str,
        url: &str,
        attachment: &Attachment,
    ) -> Result<String, ConfluenceError> {
        let boundary = format!("----MdpubFormBoundary{:016x}", rand::rng().random::<u64>());
        let body = multipart_body(&boundary, attachment);
        let content_type = format!("multipart/form-data; boundary={boundary}");
        let payload = Payload {
            content_type: &content_type,
            data: &body,
        };
        self.request(Method::Post, operation, url, Some(&payload))
    }
}

/// Multipart form with the file, the checksum comment and the minor-edit
/// flag.
fn multipart_body(boundary: &str, attachment: &Attachment) -> Vec<u8> {
    let mut body = Vec::with_capacity(attachment.content.len() + 512);

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            quoted_filename(&attachment.filename)
        )
        .as_bytes(),
    );
    body.extend_from_slice(
        format!("Content-Type: {}\r\n\r\n", content_type(&attachment.filename)).as_bytes(),
    );
    body.extend_from_slice(&attachment.content);
    body.extend_from_slice(b"\r\n");

    for (name, value) in [("comment", attachment.comment()), ("minorEdit", "true".to_owned())] {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

/// Filename for a quoted `Content-Disposition` parameter: quotes, backslashes
/// and line breaks are percent-encoded.
fn quoted_filename(filename: &str) -> Cow<'_, str> {
    if !filename.contains(['"', '\\', '\r', '\n']) {
        return Cow::Borrowed(filename);
    }
    let mut quoted = String::with_capacity(filename.len() + 8);
    for ch in filename.chars() {
        match ch {
            '"' => quoted.push_str("%22"),
            '\\' => quoted.push_str("%5C"),
            '\r' => quoted.push_str("%0D"),
            '\n' => quoted.push_str("%0A"),
            _ => quoted.push(ch),
        }
    }
    Cow::Owned(quoted)
}

fn content_type(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        _ => "application/octet-stream",
    }
}

impl AttachmentStore for ConfluenceClient {
    type Error = ConfluenceError;

    fn list_attachments(&self, page_id: &str) -> Result<Vec<RemoteAttachment>, ConfluenceError> {
        let operation = format!("list attachments of page {page_id}");
        let mut url = format!(
            "{}/content/{page_id}/child/attachment?expand=metadata&limit={ATTACHMENT_PAGE_SIZE}&start=0",
            self.api_url()
        );
        let mut remote = Vec::new();
        loop {
            let listed: Results<WireAttachment> = self.get_json(&operation, &url)?;
            remote.extend(listed.results.into_iter().map(|wire| self.to_remote(wire)));
            match listed.links.next {
                Some(next) => url = format!("{}{next}", self.base_url),
                None => break,
            }
        }
        Ok(remote)
    }

    fn create_attachment(
        &self,
        page_id: &str,
        attachment: &Attachment,
    ) -> Result<RemoteAttachment, ConfluenceError> {
        info!(page_id, attachment = %attachment.filename, "Uploading new attachment");
        let operation = format!("create attachment {} on page {page_id}", attachment.filename);
        let url = format!("{}/content/{page_id}/child/attachment", self.api_url());
        let body = self.upload(&operation, &url, attachment)?;

        let created: Results<WireAttachment> = super::parse_json(&operation, &body)?;
        created
            .results
            .into_iter()
            .next()
            .map(|wire| self.to_remote(wire))
            .ok_or(ConfluenceError::NotFound { operation })
    }

    fn update_attachment(
        &self,
        page_id: &str,
        attachment_id: &str,
        attachment: &Attachment,
    ) -> Result<RemoteAttachment, ConfluenceError> {
        info!(page_id, attachment = %attachment.filename, attachment_id, "Updating attachment");
        let operation = format!("update attachment {} on page {page_id}", attachment.filename);
        let url = format!(
            "{}/content/{page_id}/child/attachment/{attachment_id}/data",
            self.api_url()
        );
        let body = self.upload(&operation, &url, attachment)?;

        let updated: WireAttachment = super::parse_json(&operation, &body)?;
        Ok(self.to_remote(updated))
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::client::Auth;

    #[test]
    fn test_context_path() {
        let client = ConfluenceClient::new("https://host/confluence/", &Auth::Anonymous);
        assert_eq!(client.context_path(), "/confluence");

        let client = ConfluenceClient::new("https://host", &Auth::Anonymous);
        assert_eq!(client.context_path(), "");
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("a.PNG"), "image/png");
        assert_eq!(content_type("doc.pdf"), "application/pdf");
        assert_eq!(content_type("noext"), "application/octet-stream");
    }

    #[test]
    fn test_multipart_body() {
        let attachment = Attachment::new("a.txt", "a.txt", b"hello".to_vec());
        let body = String::from_utf8(multipart_body("XYZ", &attachment)).unwrap();

        assert!(body.starts_with("--XYZ\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n"));
        assert!(body.contains("Content-Type: text/plain\r\n\r\nhello\r\n"));
        assert!(body.contains(&format!("name=\"comment\"\r\n\r\n{}\r\n", attachment.comment())));
        assert!(body.contains("name=\"minorEdit\"\r\n\r\ntrue\r\n"));
        assert!(body.ends_with("--XYZ--\r\n"));
    }

    #[test]
    fn test_list_attachments() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/wiki/rest/api/content/1/child/attachment")
            .match_query(Matcher::Any)
            .with_body(
                r#"{"results":[{"id":"att1","title":"a.png",
                    "metadata":{"comment":"mdpub:checksum: abc"},
                    "_links":{"download":"/download/attachments/1/a.png?version=1"}}]}"#,
            )
            .create();

        let client = ConfluenceClient::new(&format!("{}/wiki", server.url()), &Auth::Anonymous);
        let listed = client.list_attachments("1").unwrap();

        assert_eq!(
            listed,
            vec![RemoteAttachment {
                id: "att1".to_owned(),
                filename: "a.png".to_owned(),
                comment: "mdpub:checksum: abc".to_owned(),
                link: "/wiki/download/attachments/1/a.png?version=1".to_owned(),
            }]
        );
        assert_eq!(listed[0].checksum(), Some("abc"));
    }

    #[test]
    fn test_list_attachments_follows_next_link() {
        let mut server = mockito::Server::new();
        let first = server
            .mock("GET", "/wiki/rest/api/content/1/child/attachment")
            .match_query(Matcher::UrlEncoded("start".to_owned(), "0".to_owned()))
            .with_body(
                r#"{"results":[{"id":"att1","title":"a.png","_links":{"download":"/download/a.png"}}],
                    "_links":{"next":"/rest/api/content/1/child/attachment?expand=metadata&limit=200&start=200"}}"#,
            )
            .create();
        let second = server
            .mock("GET", "/wiki/rest/api/content/1/child/attachment")
            .match_query(Matcher::UrlEncoded("start".to_owned(), "200".to_owned()))
            .with_body(
                r#"{"results":[{"id":"att2","title":"b.png","_links":{"download":"/download/b.png"}}],
                    "_links":{}}"#,
            )
            .create();

        let client = ConfluenceClient::new(&format!("{}/wiki", server.url()), &Auth::Anonymous);
        let listed = client.list_attachments("1").unwrap();

        first.assert();
        second.assert();
        let ids: Vec<_> = listed.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["att1", "att2"]);
    }

    #[test]
    fn test_quoted_filename() {
        assert_eq!(quoted_filename("a.png"), "a.png");
        assert_eq!(quoted_filename("say \"hi\".png"), "say %22hi%22.png");
        assert_eq!(quoted_filename("a\\b\r\n.png"), "a%5Cb%0D%0A.png");
    }

    #[test]
    fn test_create_attachment() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/rest/api/content/1/child/attachment")
            .match_header("x-atlassian-token", "nocheck")
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".to_owned()),
            )
            .match_body(Matcher::Regex("mdpub:checksum: ".to_owned()))
            .with_body(
                r#"{"results":[{"id":"att9","title":"b.png",
                    "_links":{"download":"/download/attachments/1/b.png"}}]}"#,
            )
            .create();

        let client = ConfluenceClient::new(&server.url(), &Auth::Anonymous);
        let created = client
            .create_attachment("1", &Attachment::new("b.png", "b.png", b"B".to_vec()))
            .unwrap();

        mock.assert();
        assert_eq!(created.id, "att9");
        assert_eq!(created.link, "/download/attachments/1/b.png");
    }

    #[test]
    fn test_update_attachment() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/rest/api/content/1/child/attachment/att9/data")
            .with_body(
                r#"{"id":"att9","title":"b.png",
                    "_links":{"download":"/download/attachments/1/b.png?version=2"}}"#,
            )
            .create();

        let client = ConfluenceClient::new(&server.url(), &Auth::Anonymous);
        let updated = client
            .update_attachment("1", "att9", &Attachment::new("b.png", "b.png", b"B2".to_vec()))
            .unwrap();

        mock.assert();
        assert_eq!(updated.link, "/download/attachments/1/b.png?version=2");
    }
}
