//! Document tree.
//!
//! pulldown-cmark events are folded into a tree of [`Node`]s. Text runs are
//! rescanned for the inline extensions the generic parser does not know
//! about (raw storage tags, mentions, math), see [`crate::inline`].

use std::ops::Range;

use pulldown_cmark::{
    Alignment, BlockQuoteKind, CodeBlockKind, Event, LinkType, Options, Parser, Tag, TagEnd,
};

use crate::CompileError;
use crate::inline::{self, ESCAPED_DOLLAR};
use crate::util::heading_level_to_num;

/// Target macro of a classified blockquote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admonition {
    Info,
    Note,
    Tip,
    Warning,
}

impl Admonition {
    /// Structured macro name.
    pub fn macro_name(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Note => "note",
            Self::Tip => "tip",
            Self::Warning => "warning",
        }
    }
}

/// Node kind with the attributes its renderer needs.
#[derive(Clone, Debug, PartialEq)]
pub enum Kind {
    Document,
    Paragraph,
    Heading {
        level: u8,
    },
    Blockquote {
        /// GitHub alert marker (`> [!NOTE]`) recognized by the parser.
        alert: Option<BlockQuoteKind>,
        /// Set by [`crate::transform::classify_blockquotes`].
        admonition: Option<Admonition>,
    },
    List {
        start: Option<u64>,
    },
    ListItem,
    TaskCheckbox {
        checked: bool,
    },
    CodeBlock {
        text: String,
    },
    FencedCodeBlock {
        info: String,
        text: String,
    },
    HtmlBlock {
        html: String,
    },
    Text {
        text: String,
    },
    SoftBreak {
        /// Both neighbours are East Asian wide characters.
        between_wide: bool,
    },
    HardBreak,
    CodeSpan {
        code: String,
    },
    Emphasis,
    Strong,
    Strikethrough,
    Link {
        dest: String,
        title: String,
    },
    Image {
        dest: String,
        title: String,
    },
    /// Storage-format tag or CDATA passed through unescaped.
    RawTag {
        raw: String,
    },
    RawHtml {
        html: String,
    },
    Mention {
        name: String,
    },
    MathInline {
        tex: String,
    },
    MathBlock {
        tex: String,
    },
    Rule,
    Table {
        alignments: Vec<Alignment>,
    },
    TableHead,
    TableRow,
    TableCell,
}

/// Fieldless mirror of [`Kind`], used as the dispatch key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Document,
    Paragraph,
    Heading,
    Blockquote,
    List,
    ListItem,
    TaskCheckbox,
    CodeBlock,
    FencedCodeBlock,
    HtmlBlock,
    Text,
    SoftBreak,
    HardBreak,
    CodeSpan,
    Emphasis,
    Strong,
    Strikethrough,
    Link,
    Image,
    RawTag,
    RawHtml,
    Mention,
    MathInline,
    MathBlock,
    Rule,
    Table,
    TableHead,
    TableRow,
    TableCell,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: Kind,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            children: Vec::new(),
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            Kind::Document => NodeType::Document,
            Kind::Paragraph => NodeType::Paragraph,
            Kind::Heading { .. } => NodeType::Heading,
            Kind::Blockquote { .. } => NodeType::Blockquote,
            Kind::List { .. } => NodeType::List,
            Kind::ListItem => NodeType::ListItem,
            Kind::TaskCheckbox { .. } => NodeType::TaskCheckbox,
            Kind::CodeBlock { .. } => NodeType::CodeBlock,
            Kind::FencedCodeBlock { .. } => NodeType::FencedCodeBlock,
            Kind::HtmlBlock { .. } => NodeType::HtmlBlock,
            Kind::Text { .. } => NodeType::Text,
            Kind::SoftBreak { .. } => NodeType::SoftBreak,
            Kind::HardBreak => NodeType::HardBreak,
            Kind::CodeSpan { .. } => NodeType::CodeSpan,
            Kind::Emphasis => NodeType::Emphasis,
            Kind::Strong => NodeType::Strong,
            Kind::Strikethrough => NodeType::Strikethrough,
            Kind::Link { .. } => NodeType::Link,
            Kind::Image { .. } => NodeType::Image,
            Kind::RawTag { .. } => NodeType::RawTag,
            Kind::RawHtml { .. } => NodeType::RawHtml,
            Kind::Mention { .. } => NodeType::Mention,
            Kind::MathInline { .. } => NodeType::MathInline,
            Kind::MathBlock { .. } => NodeType::MathBlock,
            Kind::Rule => NodeType::Rule,
            Kind::Table { .. } => NodeType::Table,
            Kind::TableHead => NodeType::TableHead,
            Kind::TableRow => NodeType::TableRow,
            Kind::TableCell => NodeType::TableCell,
        }
    }

    /// Concatenated text of all descendants, without markup.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match &self.kind {
            Kind::Text { text } => out.push_str(text),
            Kind::CodeSpan { code } => out.push_str(code),
            Kind::SoftBreak { .. } | Kind::HardBreak => out.push(' '),
            Kind::MathInline { tex } => out.push_str(tex),
            _ => {}
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}

/// Parser extensions enabled on top of `CommonMark`.
fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_GFM
}

/// Parse markdown into a document tree.
///
/// # Errors
///
/// Returns [`CompileError::Unbalanced`] if the event stream closes more
/// elements than it opened.
pub fn parse(markdown: &str) -> Result<Node, CompileError> {
    let mut builder = TreeBuilder::new(markdown);
    for (event, range) in Parser::new_ext(markdown, parser_options()).into_offset_iter() {
        builder.event(event, range)?;
    }
    builder.finish()
}

struct TreeBuilder<'s> {
    source: &'s str,
    stack: Vec<Node>,
    /// Pending text run (text plus soft breaks as `\n`).
    run: String,
    /// Inside a storage-tag autolink whose events are replaced by raw text.
    in_raw_autolink: bool,
}

impl<'s> TreeBuilder<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            stack: vec![Node::new(Kind::Document)],
            run: String::new(),
            in_raw_autolink: false,
        }
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) -> Result<(), CompileError> {
        if self.in_raw_autolink {
            if matches!(event, Event::End(TagEnd::Link)) {
                self.in_raw_autolink = false;
            }
            return Ok(());
        }

        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(end) => self.end(&end)?,
            Event::Text(text) => self.text(&text, range),
            Event::Code(code) => self.leaf(Kind::CodeSpan {
                code: code.into_string(),
            }),
            Event::Html(html) => {
                if let Some(Node {
                    kind: Kind::HtmlBlock { html: block },
                    ..
                }) = self.stack.last_mut()
                {
                    block.push_str(&html);
                } else {
                    self.leaf(Kind::RawHtml {
                        html: html.into_string(),
                    });
                }
            }
            Event::InlineHtml(html) => self.leaf(Kind::RawHtml {
                html: html.into_string(),
            }),
            Event::SoftBreak => self.run.push('\n'),
            Event::HardBreak => self.leaf(Kind::HardBreak),
            Event::Rule => self.leaf(Kind::Rule),
            Event::TaskListMarker(checked) => self.leaf(Kind::TaskCheckbox { checked }),
            Event::FootnoteReference(label) => {
                self.run.push_str(&format!("[^{label}]"));
            }
            Event::InlineMath(tex) => self.leaf(Kind::MathInline {
                tex: tex.into_string(),
            }),
            Event::DisplayMath(tex) => self.leaf(Kind::MathBlock {
                tex: tex.into_string(),
            }),
        }
        Ok(())
    }

    fn start(&mut self, tag: Tag<'_>) {
        // `<ac:image>` is a valid autolink; keep storage tags away from the
        // link parser.
        if let Tag::Link {
            link_type: LinkType::Autolink,
            dest_url,
            ..
        } = &tag
            && (dest_url.starts_with("ac:") || dest_url.starts_with("ri:"))
        {
            self.run.push('<');
            self.run.push_str(dest_url);
            self.run.push('>');
            self.in_raw_autolink = true;
            return;
        }

        self.flush_run();
        let kind = match tag {
            Tag::Paragraph => Kind::Paragraph,
            Tag::Heading { level, .. } => Kind::Heading {
                level: heading_level_to_num(level),
            },
            Tag::BlockQuote(alert) => Kind::Blockquote {
                alert,
                admonition: None,
            },
            Tag::CodeBlock(CodeBlockKind::Fenced(info)) => Kind::FencedCodeBlock {
                info: info.into_string(),
                text: String::new(),
            },
            Tag::CodeBlock(CodeBlockKind::Indented) => Kind::CodeBlock {
                text: String::new(),
            },
            Tag::HtmlBlock => Kind::HtmlBlock {
                html: String::new(),
            },
            Tag::List(start) => Kind::List { start },
            Tag::Item => Kind::ListItem,
            Tag::Table(alignments) => Kind::Table { alignments },
            Tag::TableHead => Kind::TableHead,
            Tag::TableRow => Kind::TableRow,
            Tag::TableCell => Kind::TableCell,
            Tag::Emphasis => Kind::Emphasis,
            Tag::Strong => Kind::Strong,
            Tag::Strikethrough => Kind::Strikethrough,
            Tag::Link {
                dest_url, title, ..
            } => Kind::Link {
                dest: dest_url.into_string(),
                title: title.into_string(),
            },
            Tag::Image {
                dest_url, title, ..
            } => Kind::Image {
                dest: dest_url.into_string(),
                title: title.into_string(),
            },
            // Not enabled in the parser options; render contents inline.
            Tag::FootnoteDefinition(_)
            | Tag::MetadataBlock(_)
            | Tag::DefinitionList
            | Tag::DefinitionListTitle
            | Tag::DefinitionListDefinition
            | Tag::Superscript
            | Tag::Subscript => Kind::Paragraph,
        };
        self.stack.push(Node::new(kind));
    }

    fn end(&mut self, end: &TagEnd) -> Result<(), CompileError> {
        self.flush_run();
        if self.stack.len() < 2 {
            return Err(CompileError::Unbalanced(format!("{end:?}")));
        }
        if let Some(node) = self.stack.pop() {
            self.push(node);
        }
        Ok(())
    }

    fn text(&mut self, text: &str, range: Range<usize>) {
        match self.stack.last_mut().map(|node| &mut node.kind) {
            Some(Kind::FencedCodeBlock { text: code, .. } | Kind::CodeBlock { text: code }) => {
                code.push_str(text);
            }
            _ => {
                let marked = mark_escaped_dollars(text, self.source, range);
                self.run.push_str(&marked);
            }
        }
    }

    fn leaf(&mut self, kind: Kind) {
        self.flush_run();
        self.push(Node::new(kind));
    }

    fn push(&mut self, node: Node) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        }
    }

    fn flush_run(&mut self) {
        if self.run.is_empty() {
            return;
        }
        let run = std::mem::take(&mut self.run);
        for node in inline::scan(&run) {
            self.push(node);
        }
    }

    fn finish(mut self) -> Result<Node, CompileError> {
        self.flush_run();
        if self.stack.len() != 1 {
            return Err(CompileError::Unbalanced(format!(
                "{} unclosed elements",
                self.stack.len() - 1
            )));
        }
        self.stack
            .pop()
            .ok_or_else(|| CompileError::Unbalanced("empty tree".to_owned()))
    }
}

/// Replace `$` characters that were backslash-escaped in the source with
/// [`ESCAPED_DOLLAR`], so the math scanner does not treat them as
/// delimiters.
fn mark_escaped_dollars(text: &str, source: &str, range: Range<usize>) -> String {
    if !text.contains('$') {
        return text.to_owned();
    }
    let src = source.get(range.clone()).unwrap_or(text);

    if src == text {
        // The escaping backslash may sit just before the event's range.
        let before = &source[..range.start];
        let slashes = before.len() - before.trim_end_matches('\\').len();
        if text.starts_with('$') && slashes % 2 == 1 {
            let mut out = String::with_capacity(text.len() + 2);
            out.push(ESCAPED_DOLLAR);
            out.push_str(&text[1..]);
            return out;
        }
        return text.to_owned();
    }

    let mut out = String::with_capacity(text.len());
    let mut src_chars = src.chars().peekable();
    for ch in text.chars() {
        match src_chars.next() {
            Some(s) if s == ch => out.push(ch),
            Some('\\') if src_chars.peek() == Some(&ch) => {
                src_chars.next();
                out.push(if ch == '$' { ESCAPED_DOLLAR } else { ch });
            }
            // Entities or other rewrites: give up on escape tracking.
            _ => return text.to_owned(),
        }
    }
    out
}
