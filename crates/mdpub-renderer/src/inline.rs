//! Inline extensions scanned over merged text runs.
//!
//! - raw storage tags: `<ac:*>`, `</ac:*>`, `<ri:*/>` and `<![CDATA[...]]>`
//! - mentions: `@{name}`
//! - math: `$inline$` and `$$display$$`
//!
//! Soft breaks inside the run come back out as [`Kind::SoftBreak`] nodes.

use std::sync::LazyLock;

use regex::Regex;
use unicode_width::UnicodeWidthChar;

use crate::ast::{Kind, Node};

/// Stand-in for a `$` that was backslash-escaped in the source.
pub(crate) const ESCAPED_DOLLAR: char = '\u{E000}';

/// How far display math may extend past its opening `$$`, in bytes.
const MAX_DISPLAY_MATH_LEN: usize = 4096;

static RAW_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:<!\[CDATA\[(?s:.*?)\]\]>",
        r"|</?(?:ac|ri):[A-Za-z0-9_:-]+",
        r#"(?:\s+[A-Za-z0-9_:-]+\s*=\s*(?:"[^"]*"|'[^']*'))*\s*/?>)"#,
    ))
    .unwrap()
});

/// Split a text run into text, soft break and extension nodes.
pub(crate) fn scan(run: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while let Some(ch) = run[i..].chars().next() {
        let found = match ch {
            '<' => RAW_TAG_RE.find(&run[i..]).map(|m| {
                (
                    m.end(),
                    Kind::RawTag {
                        raw: m.as_str().to_owned(),
                    },
                )
            }),
            '@' => scan_mention(&run[i..]),
            '$' if !run[..i].ends_with('$') => scan_math(&run[i..]),
            '\n' => Some((
                1,
                Kind::SoftBreak {
                    between_wide: is_wide(run[..i].chars().next_back())
                        && is_wide(run[i + 1..].chars().next()),
                },
            )),
            _ => None,
        };

        match found {
            Some((len, kind)) => {
                push_text(&mut nodes, &run[text_start..i]);
                nodes.push(Node::new(kind));
                i += len;
                text_start = i;
            }
            None => i += ch.len_utf8(),
        }
    }
    push_text(&mut nodes, &run[text_start..]);
    nodes
}

fn push_text(nodes: &mut Vec<Node>, text: &str) {
    if !text.is_empty() {
        nodes.push(Node::new(Kind::Text {
            text: text.replace(ESCAPED_DOLLAR, "$"),
        }));
    }
}

fn is_wide(ch: Option<char>) -> bool {
    ch.and_then(UnicodeWidthChar::width) == Some(2)
}

/// `@{name}`, consuming through the next `}`.
fn scan_mention(s: &str) -> Option<(usize, Kind)> {
    let rest = s.strip_prefix("@{")?;
    let close = rest.find('}')?;
    let name = &rest[..close];
    if name.trim().is_empty() || name.contains('\n') {
        return None;
    }
    Some((
        close + 3,
        Kind::Mention {
            name: name.trim().to_owned(),
        },
    ))
}

fn scan_math(s: &str) -> Option<(usize, Kind)> {
    if let Some(rest) = s.strip_prefix("$$") {
        let window = &rest[..floor_char_boundary(rest, MAX_DISPLAY_MATH_LEN)];
        let close = window.find("$$")?;
        let tex = rest[..close].trim();
        if tex.is_empty() {
            return None;
        }
        return Some((
            close + 4,
            Kind::MathBlock {
                tex: restore_tex(tex),
            },
        ));
    }

    let rest = &s[1..];
    let first = rest.chars().next()?;
    if first.is_whitespace() {
        return None;
    }
    let line = rest.split('\n').next().unwrap_or(rest);
    let close = line.find('$')?;
    let tex = &line[..close];
    if tex.is_empty() || tex.ends_with(char::is_whitespace) {
        return None;
    }
    Some((
        close + 2,
        Kind::MathInline {
            tex: restore_tex(tex),
        },
    ))
}

/// Escaped dollars stay escaped inside TeX.
fn restore_tex(tex: &str) -> String {
    tex.replace(ESCAPED_DOLLAR, "\\$")
}

fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
