//! Replace attachment references in markdown with resolved links.

use std::collections::{HashMap, HashSet};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;

use crate::{ATTACHMENT_SCHEME, Attachment};

/// Characters escaped in download links. Reserved URL characters are kept so
/// query strings survive.
const LINK_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'(')
    .add(b')');

/// Result of [`substitute_links`].
#[derive(Debug, PartialEq, Eq)]
pub struct Substituted {
    pub text: String,
    /// Replace-tokens of attachments never referenced in the text.
    pub unused: Vec<String>,
}

/// Replace each resolved attachment's token (bare or with the
/// `attachment://` prefix) with its escaped link.
///
/// All tokens are matched in one pass, longest first, so `a.jpg.jpg` is never
/// split by a shorter `a.jpg` token and replaced text is never rescanned.
/// Attachments without a link are ignored.
pub fn substitute_links(text: &str, attachments: &[Attachment]) -> Substituted {
    let mut links: HashMap<String, (String, &str)> = HashMap::new();
    for attachment in attachments {
        let Some(link) = &attachment.link else {
            continue;
        };
        if attachment.replace.is_empty() {
            continue;
        }
        let escaped = utf8_percent_encode(link, LINK_ENCODE_SET).to_string();
        let token = attachment.replace.as_str();
        links.insert(format!("{ATTACHMENT_SCHEME}{token}"), (escaped.clone(), token));
        links.insert(token.to_owned(), (escaped, token));
    }
    if links.is_empty() {
        return Substituted {
            text: text.to_owned(),
            unused: Vec::new(),
        };
    }

    let mut tokens: Vec<&String> = links.keys().collect();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    let pattern = tokens
        .iter()
        .map(|token| regex::escape(token))
        .collect::<Vec<_>>()
        .join("|");

    let mut used: HashSet<&str> = HashSet::new();
    let replaced = match Regex::new(&pattern) {
        Ok(re) => re
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let (link, token) = &links[&caps[0]];
                used.insert(*token);
                link.clone()
            })
            .into_owned(),
        // Escaped literals always compile; only a size limit could fail.
        Err(err) => {
            tracing::warn!(error = %err, "Too many attachment tokens to substitute");
            text.to_owned()
        }
    };

    let mut unused = Vec::new();
    for attachment in attachments {
        if attachment.link.is_some()
            && !used.contains(attachment.replace.as_str())
            && !unused.contains(&attachment.replace)
        {
            tracing::warn!(attachment = %attachment.replace, "Attachment is not referenced in the document");
            unused.push(attachment.replace.clone());
        }
    }

    Substituted {
        text: replaced,
        unused,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn resolved(token: &str, link: &str) -> Attachment {
        let mut attachment = Attachment::new(token, token, token.as_bytes().to_vec());
        attachment.link = Some(link.to_owned());
        attachment
    }

    #[test]
    fn test_longer_token_wins() {
        let attachments = vec![
            resolved("a.jpg", "/dl/a.jpg"),
            resolved("a.jpg.jpg", "/dl/a.jpg.jpg"),
        ];

        let out = substitute_links("![](a.jpg) ![](a.jpg.jpg)", &attachments);

        assert_eq!(out.text, "![](/dl/a.jpg) ![](/dl/a.jpg.jpg)");
        assert!(out.unused.is_empty());
    }

    #[test]
    fn test_replacement_is_not_rescanned() {
        // The link of the first attachment contains the second token.
        let attachments = vec![resolved("x.png", "/dl/y.png"), resolved("y.png", "/dl/other")];

        let out = substitute_links("x.png", &attachments);

        assert_eq!(out.text, "/dl/y.png");
        assert_eq!(out.unused, vec!["y.png"]);
    }

    #[test]
    fn test_legacy_scheme_prefix() {
        let attachments = vec![resolved("doc.pdf", "/dl/doc.pdf")];

        let out = substitute_links("[doc](attachment://doc.pdf)", &attachments);

        assert_eq!(out.text, "[doc](/dl/doc.pdf)");
    }

    #[test]
    fn test_link_is_escaped() {
        let attachments = vec![resolved("my file.png", "/download/my file.png?version=1&api=v2")];

        let out = substitute_links("see my file.png", &attachments);

        assert_eq!(out.text, "see /download/my%20file.png?version=1&api=v2");
    }

    #[test]
    fn test_unresolved_attachments_are_ignored() {
        let attachment = Attachment::new("a.png", "a.png", Vec::new());

        let out = substitute_links("a.png", &[attachment]);

        assert_eq!(out.text, "a.png");
        assert!(out.unused.is_empty());
    }
}
