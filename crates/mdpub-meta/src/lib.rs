//! Document metadata extraction.
//!
//! A document may start with a block of header comments that describe where
//! and how it is published:
//!
//! ```markdown
//! <!-- Space: DOC -->
//! <!-- Parent: Engineering -->
//! <!-- Title: Release process -->
//! <!-- Label: howto -->
//! ```
//!
//! [`extract_meta`] consumes that block and returns a [`Meta`] descriptor
//! plus the remaining body. Parsing stops at the first line that is neither
//! blank nor a header comment. `Include` and `Macro` directives also end the
//! block but are left in the body for the directive expander.
//!
//! Problems with individual header lines (unknown keys, bad values) are
//! reported as warnings; extraction itself never fails.

use std::sync::LazyLock;

use regex::Regex;

/// `<!-- Key: value -->`
static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<!--\s*([^:]+?)\s*:\s*(.*?)\s*-->$").unwrap());

/// Legacy link-reference form: `[]: # (Key: value)`.
static LEGACY_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[\]:\s*#\s*\(([^:]+?)\s*:\s*(.*?)\s*\)$").unwrap());

/// Directive comments that terminate the header block without being consumed.
static DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^<!--\s*(?:macro|include)\s*:").unwrap());

/// Leading ATX level-1 heading.
static H1_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[ \t]+(.+?)(?:[ \t]+#+)?[ \t]*$").unwrap());

/// Kind of remote content a document is published as.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PageType {
    #[default]
    Page,
    BlogPost,
}

impl PageType {
    /// Name used by the remote content API.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::BlogPost => "blogpost",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "page" => Some(Self::Page),
            "blogpost" => Some(Self::BlogPost),
            _ => None,
        }
    }
}

/// Page width setting applied on update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContentAppearance {
    #[default]
    FullWidth,
    Fixed,
}

impl ContentAppearance {
    /// Value of the remote `content-appearance` property.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullWidth => "full-width",
            Self::Fixed => "fixed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "full-width" => Some(Self::FullWidth),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }
}

/// Structured descriptor of a document, built from its header comments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Meta {
    /// Ancestor titles, outermost first.
    pub parents: Vec<String>,
    pub space: String,
    pub page_type: PageType,
    pub title: String,
    /// Layout template name (`article` enables the sidebar column).
    pub layout: String,
    pub sidebar: String,
    /// Declared attachment paths, relative to the document.
    pub attachments: Vec<String>,
    pub labels: Vec<String>,
    pub content_appearance: ContentAppearance,
    pub emoji: String,
}

impl Meta {
    /// Check that the fields required for publishing are present.
    pub fn validate(&self) -> Result<(), MetaError> {
        if self.space.is_empty() {
            return Err(MetaError::MissingSpace);
        }
        if self.title.is_empty() {
            return Err(MetaError::MissingTitle);
        }
        Ok(())
    }

    fn apply(&mut self, key: &str, value: &str) -> Option<String> {
        match key.to_ascii_lowercase().as_str() {
            "parent" => self.parents.push(value.to_owned()),
            "space" => value.clone_into(&mut self.space),
            "type" => match PageType::parse(value) {
                Some(page_type) => self.page_type = page_type,
                None => return Some(format!("unknown page type \"{value}\"")),
            },
            "title" => value.trim().clone_into(&mut self.title),
            "layout" => value.clone_into(&mut self.layout),
            "sidebar" => {
                "article".clone_into(&mut self.layout);
                value.clone_into(&mut self.sidebar);
            }
            "attachment" => self.attachments.push(value.to_owned()),
            "label" => self.labels.push(value.to_owned()),
            "content-appearance" => match ContentAppearance::parse(value) {
                Some(appearance) => self.content_appearance = appearance,
                None => return Some(format!("unknown content appearance \"{value}\"")),
            },
            "emoji" => value.clone_into(&mut self.emoji),
            _ => return Some(format!("unknown header key \"{key}\"")),
        }
        None
    }
}

/// Errors for metadata that cannot be published.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MetaError {
    #[error("space is not set (add a `<!-- Space: KEY -->` header or configure one)")]
    MissingSpace,
    #[error("title is not set (add a `<!-- Title: ... -->` header or enable title_from_h1)")]
    MissingTitle,
}

/// Settings that supplement or synthesize header metadata.
#[derive(Clone, Debug, Default)]
pub struct ExtractOptions {
    /// Parents prepended to the document's own `Parent` headers.
    pub parents: Vec<String>,
    /// Space used when the document does not declare one.
    pub space: Option<String>,
    /// Take the title from the first level-1 heading when none is declared.
    pub title_from_h1: bool,
}

/// Result of [`extract_meta`].
#[derive(Debug)]
pub struct Extracted<'a> {
    /// `None` when the document has no header block and no option forces one.
    pub meta: Option<Meta>,
    /// Document text after the consumed header lines.
    pub body: &'a str,
    pub warnings: Vec<String>,
}

/// Parse the leading header block of `data`.
pub fn extract_meta<'a>(data: &'a str, options: &ExtractOptions) -> Extracted<'a> {
    let mut meta: Option<Meta> = None;
    let mut warnings = Vec::new();
    let mut offset = 0;

    for (index, raw) in data.split_inclusive('\n').enumerate() {
        let line = raw.trim_end_matches(['\n', '\r']).trim();
        let line_no = index + 1;

        if line.is_empty() {
            offset += raw.len();
            continue;
        }
        if DIRECTIVE_RE.is_match(line) {
            break;
        }

        let caps = if let Some(caps) = HEADER_RE.captures(line) {
            caps
        } else if let Some(caps) = LEGACY_HEADER_RE.captures(line) {
            warnings.push(format!(
                "line {line_no}: legacy header syntax, use `<!-- {}: ... -->`",
                &caps[1]
            ));
            caps
        } else {
            break;
        };

        let meta = meta.get_or_insert_with(Meta::default);
        if let Some(warning) = meta.apply(&caps[1], &caps[2]) {
            warnings.push(format!("line {line_no}: {warning}"));
        }
        offset += raw.len();
    }

    // Leading blank lines belong to the body when no header was found.
    let body = if meta.is_some() { &data[offset..] } else { data };

    if meta.is_none() && (options.title_from_h1 || options.space.is_some()) {
        meta = Some(Meta::default());
    }

    if let Some(meta) = meta.as_mut() {
        if meta.space.is_empty()
            && let Some(space) = &options.space
        {
            space.clone_into(&mut meta.space);
        }
        if meta.title.is_empty()
            && options.title_from_h1
            && let Some(title) = first_h1(body)
        {
            meta.title = title;
        }
        if !options.parents.is_empty() {
            let mut parents = options.parents.clone();
            parents.append(&mut meta.parents);
            meta.parents = parents;
        }
    }

    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    Extracted {
        meta,
        body,
        warnings,
    }
}

/// Find the text of the first level-1 ATX heading outside fenced code.
fn first_h1(body: &str) -> Option<String> {
    let mut fence: Option<(char, usize)> = None;
    for line in body.lines() {
        let trimmed = line.trim_start();
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~');
        if let Some(ch) = marker {
            let len = trimmed.chars().take_while(|c| *c == ch).count();
            if len >= 3 {
                match fence {
                    None => fence = Some((ch, len)),
                    Some((open, open_len))
                        if open == ch && len >= open_len && trimmed[len..].trim().is_empty() =>
                    {
                        fence = None;
                    }
                    Some(_) => {}
                }
                continue;
            }
        }
        if fence.is_some() {
            continue;
        }
        if let Some(caps) = H1_RE.captures(line) {
            return Some(caps[1].to_owned());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_extract_full_header() {
        let doc = "<!-- Space: DOC -->\n\
                   <!-- Parent: Root -->\n\
                   <!-- Parent: Guides -->\n\
                   <!-- Title: Release process -->\n\
                   <!-- Label: howto -->\n\
                   <!-- Label: release -->\n\
                   <!-- Attachment: img/a.png -->\n\
                   <!-- Content-Appearance: fixed -->\n\
                   <!-- Emoji: rocket -->\n\
                   \n\
                   Body text\n";
        let extracted = extract_meta(doc, &ExtractOptions::default());
        let meta = extracted.meta.unwrap();

        assert_eq!(meta.space, "DOC");
        assert_eq!(meta.parents, vec!["Root", "Guides"]);
        assert_eq!(meta.title, "Release process");
        assert_eq!(meta.labels, vec!["howto", "release"]);
        assert_eq!(meta.attachments, vec!["img/a.png"]);
        assert_eq!(meta.content_appearance, ContentAppearance::Fixed);
        assert_eq!(meta.emoji, "rocket");
        assert_eq!(meta.page_type, PageType::Page);
        assert_eq!(extracted.body, "Body text\n");
        assert!(extracted.warnings.is_empty());
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let doc = "<!-- space: DOC -->\n<!-- TITLE: X -->\n<!-- type: BlogPost -->\n";
        let meta = extract_meta(doc, &ExtractOptions::default()).meta.unwrap();

        assert_eq!(meta.space, "DOC");
        assert_eq!(meta.title, "X");
        assert_eq!(meta.page_type, PageType::BlogPost);
    }

    #[test]
    fn test_stops_at_first_content_line() {
        let doc = "<!-- Space: DOC -->\ntext\n<!-- Title: Late -->\n";
        let extracted = extract_meta(doc, &ExtractOptions::default());

        assert_eq!(extracted.meta.unwrap().title, "");
        assert_eq!(extracted.body, "text\n<!-- Title: Late -->\n");
    }

    #[test]
    fn test_macro_line_is_not_consumed() {
        let doc = "<!-- Space: DOC -->\n<!-- Macro: :box:\nTemplate: ac:box\n-->\n";
        let extracted = extract_meta(doc, &ExtractOptions::default());

        assert_eq!(extracted.meta.unwrap().space, "DOC");
        assert_eq!(
            extracted.body,
            "<!-- Macro: :box:\nTemplate: ac:box\n-->\n"
        );
    }

    #[test]
    fn test_include_line_is_not_consumed() {
        let doc = "<!-- Title: T -->\n<!-- Include: header.md -->\n";
        let extracted = extract_meta(doc, &ExtractOptions::default());

        assert_eq!(extracted.body, "<!-- Include: header.md -->\n");
    }

    #[test]
    fn test_unknown_key_is_warning() {
        let doc = "<!-- Space: DOC -->\n<!-- Colour: blue -->\n<!-- Title: X -->\n";
        let extracted = extract_meta(doc, &ExtractOptions::default());

        assert_eq!(extracted.meta.unwrap().title, "X");
        assert_eq!(
            extracted.warnings,
            vec!["line 2: unknown header key \"Colour\""]
        );
    }

    #[test]
    fn test_unknown_type_keeps_page() {
        let doc = "<!-- Type: wiki -->\n";
        let extracted = extract_meta(doc, &ExtractOptions::default());

        assert_eq!(extracted.meta.unwrap().page_type, PageType::Page);
        assert_eq!(extracted.warnings, vec!["line 1: unknown page type \"wiki\""]);
    }

    #[test]
    fn test_sidebar_sets_article_layout() {
        let doc = "<!-- Sidebar: Related links -->\n";
        let meta = extract_meta(doc, &ExtractOptions::default()).meta.unwrap();

        assert_eq!(meta.layout, "article");
        assert_eq!(meta.sidebar, "Related links");
    }

    #[test]
    fn test_legacy_header_syntax() {
        let doc = "[]: # (Title: Old style)\n\nBody";
        let extracted = extract_meta(doc, &ExtractOptions::default());

        assert_eq!(extracted.meta.unwrap().title, "Old style");
        assert_eq!(extracted.warnings.len(), 1);
        assert_eq!(extracted.body, "Body");
    }

    #[test]
    fn test_no_header_returns_none() {
        let doc = "\n# Heading\n\ntext";
        let extracted = extract_meta(doc, &ExtractOptions::default());

        assert!(extracted.meta.is_none());
        assert_eq!(extracted.body, doc);
    }

    #[test]
    fn test_synthesized_from_title_h1() {
        let doc = "# My page\n\ntext";
        let options = ExtractOptions {
            title_from_h1: true,
            space: Some("DOC".to_owned()),
            ..Default::default()
        };
        let meta = extract_meta(doc, &options).meta.unwrap();

        assert_eq!(meta.title, "My page");
        assert_eq!(meta.space, "DOC");
        assert_eq!(meta.page_type, PageType::Page);
        assert_eq!(meta.content_appearance, ContentAppearance::FullWidth);
    }

    #[test]
    fn test_h1_inside_fence_is_ignored() {
        let doc = "```sh\n# comment\n```\n\n# Real title #\n";
        let options = ExtractOptions {
            title_from_h1: true,
            ..Default::default()
        };

        assert_eq!(extract_meta(doc, &options).meta.unwrap().title, "Real title");
    }

    #[test]
    fn test_space_option_does_not_override_header() {
        let doc = "<!-- Space: OWN -->\n";
        let options = ExtractOptions {
            space: Some("CLI".to_owned()),
            ..Default::default()
        };

        assert_eq!(extract_meta(doc, &options).meta.unwrap().space, "OWN");
    }

    #[test]
    fn test_configured_parents_are_prepended() {
        let doc = "<!-- Parent: Child -->\n";
        let options = ExtractOptions {
            parents: vec!["Top".to_owned()],
            ..Default::default()
        };

        assert_eq!(
            extract_meta(doc, &options).meta.unwrap().parents,
            vec!["Top", "Child"]
        );
    }

    #[test]
    fn test_validate() {
        let mut meta = Meta::default();
        assert_eq!(meta.validate(), Err(MetaError::MissingSpace));

        meta.space = "DOC".to_owned();
        assert_eq!(meta.validate(), Err(MetaError::MissingTitle));

        meta.title = "X".to_owned();
        assert_eq!(meta.validate(), Ok(()));
    }
}
