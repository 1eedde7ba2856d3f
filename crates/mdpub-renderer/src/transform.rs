//! Tree rewrites applied between parsing and rendering.

use std::sync::LazyLock;

use pulldown_cmark::BlockQuoteKind;
use regex::Regex;

use crate::ast::{Admonition, Kind, Node};

/// Free-text marker at the start of a blockquote (`> info: ...`).
static KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(info|note|warn(?:ing)?|tip)\b").unwrap());

/// How many leading paragraphs are searched for a keyword marker.
const KEYWORD_PARAGRAPHS: usize = 2;

/// Admonition for a GitHub alert. The mapping is not the identity: a
/// `[!WARNING]` becomes a `note` panel and `[!CAUTION]` a `warning` panel.
pub fn alert_admonition(kind: BlockQuoteKind) -> Admonition {
    match kind {
        BlockQuoteKind::Note | BlockQuoteKind::Important => Admonition::Info,
        BlockQuoteKind::Tip => Admonition::Tip,
        BlockQuoteKind::Warning => Admonition::Note,
        BlockQuoteKind::Caution => Admonition::Warning,
    }
}

/// Admonition for a leading keyword, with the same targets as alerts.
fn keyword_admonition(keyword: &str) -> Admonition {
    match keyword.to_ascii_lowercase().as_str() {
        "tip" => Admonition::Tip,
        "warn" | "warning" => Admonition::Note,
        _ => Admonition::Info,
    }
}

/// Mark outermost blockquotes that carry an alert or keyword marker.
///
/// Blockquotes nested in another blockquote are left plain. The keyword
/// itself stays in the text.
pub fn classify_blockquotes(root: &mut Node) {
    classify(root, 0);
}

fn classify(node: &mut Node, depth: usize) {
    let mut child_depth = depth;
    if let Kind::Blockquote { alert, admonition } = &mut node.kind {
        if depth == 0 {
            *admonition = match alert {
                Some(kind) => Some(alert_admonition(*kind)),
                None => keyword(&node.children),
            };
        }
        child_depth += 1;
    }
    for child in &mut node.children {
        classify(child, child_depth);
    }
}

fn keyword(children: &[Node]) -> Option<Admonition> {
    children
        .iter()
        .filter(|child| child.kind == Kind::Paragraph)
        .take(KEYWORD_PARAGRAPHS)
        .find_map(|paragraph| {
            let text = paragraph.plain_text();
            KEYWORD_RE
                .captures(&text)
                .map(|caps| keyword_admonition(&caps[1]))
        })
}
