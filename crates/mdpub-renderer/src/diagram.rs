//! Hook for rendering fenced diagram sources to images.

use mdpub_attachments::{Attachment, checksum};

/// Error returned by a [`DiagramRenderer`].
pub type DiagramFailure = Box<dyn std::error::Error + Send + Sync>;

/// Rendered diagram image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDiagram {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Turns diagram source into a PNG.
///
/// Implementations own their transport and timeout; the compiler only
/// decides which fences to hand over.
pub trait DiagramRenderer {
    /// Whether fences tagged with `language` are diagrams.
    fn supports(&self, language: &str) -> bool;

    /// Render `source` written in `language`.
    ///
    /// # Errors
    ///
    /// Any failure; the compiler falls back to a code macro.
    fn render(&self, language: &str, source: &str) -> Result<RenderedDiagram, DiagramFailure>;
}

/// Attachment for a rendered diagram.
///
/// Named after the fence title, or the checksum of the source when the
/// fence has none, so identical diagrams share one attachment.
pub(crate) fn diagram_attachment(
    title: Option<&str>,
    source: &str,
    rendered: RenderedDiagram,
) -> Attachment {
    let name = match title {
        Some(title) => title.to_owned(),
        None => checksum(source.as_bytes()),
    };
    let filename = format!("{name}.png");
    let mut attachment = Attachment::new(filename.clone(), filename, rendered.png);
    attachment.width = Some(rendered.width);
    attachment.height = Some(rendered.height);
    attachment
}

/// Display width for an image rendered at `scale`.
pub(crate) fn scaled_width(width: u32, scale: f64) -> u32 {
    if scale <= 0.0 {
        return width;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = (f64::from(width) / scale).round() as u32;
    scaled
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn rendered() -> RenderedDiagram {
        RenderedDiagram {
            png: b"png".to_vec(),
            width: 400,
            height: 300,
        }
    }

    #[test]
    fn test_attachment_named_by_title() {
        let attachment = diagram_attachment(Some("flow"), "a -> b", rendered());

        assert_eq!(attachment.filename, "flow.png");
        assert_eq!(attachment.replace, "flow.png");
        assert_eq!((attachment.width, attachment.height), (Some(400), Some(300)));
    }

    #[test]
    fn test_attachment_named_by_checksum() {
        let attachment = diagram_attachment(None, "a -> b", rendered());

        assert_eq!(attachment.filename, format!("{}.png", checksum(b"a -> b")));
    }

    #[test]
    fn test_scaled_width() {
        assert_eq!(scaled_width(400, 2.0), 200);
        assert_eq!(scaled_width(400, 1.0), 400);
        assert_eq!(scaled_width(400, 0.0), 400);
    }
}
