//! Diagram rendering via a Kroki server.
//!
//! [`KrokiRenderer`] posts diagram source to `{server}/{endpoint}/png` and
//! reads the image size from the PNG header. It plugs into the compiler as
//! a [`DiagramRenderer`]; a failed render falls back to a code block there.

mod language;

use std::collections::HashSet;
use std::time::Duration;

use mdpub_attachments::png_dimensions;
use mdpub_renderer::{DiagramFailure, DiagramRenderer, RenderedDiagram};
use ureq::Agent;

pub use language::DiagramLanguage;

/// Default Kroki request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Diagram rendering error.
#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    #[error("unsupported diagram language \"{0}\"")]
    Unsupported(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: ureq::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("failed to read response from {url}: {source}")]
    Read {
        url: String,
        #[source]
        source: ureq::Error,
    },

    #[error("response from {url} is not a PNG image")]
    InvalidPng { url: String },
}

/// Create an HTTP agent with the given timeout.
///
/// Status codes are checked by the caller so error bodies can be reported.
pub fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

/// Renders diagrams to PNG through Kroki.
pub struct KrokiRenderer {
    agent: Agent,
    server_url: String,
    /// Languages allowed to render; `None` allows every known language.
    enabled: Option<HashSet<DiagramLanguage>>,
}

impl KrokiRenderer {
    pub fn new(server_url: &str, timeout: Duration) -> Self {
        Self {
            agent: create_agent(timeout),
            server_url: server_url.trim_end_matches('/').to_owned(),
            enabled: None,
        }
    }

    /// Only render the named languages. Unknown names are logged and
    /// ignored.
    #[must_use]
    pub fn with_languages(mut self, names: &[String]) -> Self {
        let mut enabled = HashSet::new();
        for name in names {
            match DiagramLanguage::parse(name) {
                Some(language) => {
                    enabled.insert(language);
                }
                None => tracing::warn!(language = %name, "Ignoring unknown diagram language"),
            }
        }
        self.enabled = Some(enabled);
        self
    }

    fn is_enabled(&self, language: DiagramLanguage) -> bool {
        self.enabled
            .as_ref()
            .is_none_or(|enabled| enabled.contains(&language))
    }

    /// Render one diagram to PNG.
    pub fn render_png(
        &self,
        language: DiagramLanguage,
        source: &str,
    ) -> Result<RenderedDiagram, DiagramError> {
        let url = format!("{}/{}/png", self.server_url, language.kroki_endpoint());
        tracing::debug!(url = %url, bytes = source.len(), "Rendering diagram");

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/plain")
            .send(source.as_bytes())
            .map_err(|source| DiagramError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            let body = body
                .read_to_string()
                .unwrap_or_else(|_| String::from("(unable to read error body)"));
            return Err(DiagramError::Status { url, status, body });
        }

        let png = body.read_to_vec().map_err(|source| DiagramError::Read {
            url: url.clone(),
            source,
        })?;
        let (width, height) = png_dimensions(&png).ok_or(DiagramError::InvalidPng { url })?;

        Ok(RenderedDiagram { png, width, height })
    }
}

impl DiagramRenderer for KrokiRenderer {
    fn supports(&self, language: &str) -> bool {
        DiagramLanguage::parse(language).is_some_and(|language| self.is_enabled(language))
    }

    fn render(&self, language: &str, source: &str) -> Result<RenderedDiagram, DiagramFailure> {
        let parsed = DiagramLanguage::parse(language)
            .ok_or_else(|| DiagramError::Unsupported(language.to_owned()))?;
        Ok(self.render_png(parsed, source)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data
    }

    #[test]
    fn test_render_png() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/mermaid/png")
            .match_header("content-type", "text/plain")
            .match_body("graph TD; A-->B")
            .with_status(200)
            .with_body(png(320, 240))
            .create();

        let renderer = KrokiRenderer::new(&format!("{}/", server.url()), DEFAULT_TIMEOUT);
        let rendered = renderer.render("kroki-mermaid", "graph TD; A-->B").unwrap();

        mock.assert();
        assert_eq!((rendered.width, rendered.height), (320, 240));
        assert_eq!(rendered.png, png(320, 240));
    }

    #[test]
    fn test_error_status_carries_body() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/graphviz/png")
            .with_status(400)
            .with_body("Syntax error in line 1")
            .create();

        let renderer = KrokiRenderer::new(&server.url(), DEFAULT_TIMEOUT);
        let err = renderer
            .render_png(DiagramLanguage::GraphViz, "digraph {")
            .unwrap_err();

        assert!(matches!(err, DiagramError::Status { status: 400, .. }));
        assert!(err.to_string().contains("Syntax error in line 1"));
    }

    #[test]
    fn test_non_png_response() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/plantuml/png")
            .with_status(200)
            .with_body("<svg/>")
            .create();

        let renderer = KrokiRenderer::new(&server.url(), DEFAULT_TIMEOUT);
        let err = renderer
            .render_png(DiagramLanguage::PlantUml, "@startuml\n@enduml")
            .unwrap_err();

        assert!(matches!(err, DiagramError::InvalidPng { .. }));
    }

    #[test]
    fn test_supports_respects_enabled_languages() {
        let renderer = KrokiRenderer::new("http://localhost:1", DEFAULT_TIMEOUT);
        assert!(renderer.supports("mermaid"));
        assert!(renderer.supports("dot"));
        assert!(!renderer.supports("rust"));

        let renderer = renderer.with_languages(&["mermaid".to_owned(), "bogus".to_owned()]);
        assert!(renderer.supports("mermaid"));
        assert!(!renderer.supports("dot"));
    }

    #[test]
    fn test_unsupported_language_is_error() {
        let renderer = KrokiRenderer::new("http://localhost:1", DEFAULT_TIMEOUT);
        let err = renderer.render("rust", "fn main() {}").unwrap_err();
        assert_eq!(err.to_string(), "unsupported diagram language \"rust\"");
    }
}
