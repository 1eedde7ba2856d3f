//! Storage-format rendering.
//!
//! Rendering walks the document tree and dispatches each node to the
//! handler registered for its [`NodeType`]. The table is built for every
//! compile from the options, so there is no process-wide registry. A
//! handler sees each node twice: on [`Phase::Enter`] it may return
//! [`Walk::SkipChildren`] when it renders the subtree itself, and on
//! [`Phase::Exit`] it closes what it opened. Node types without a handler
//! render only their children.

use std::collections::HashMap;
use std::fmt::Write;

use mdpub_attachments::{Attachment, qualified_filename};
use percent_encoding::percent_decode_str;
use pulldown_cmark::Alignment;

use crate::CompileOptions;
use crate::ast::{Kind, Node, NodeType};
use crate::code_block::{CodeInfo, code_macro, parameter};
use crate::diagram::{DiagramRenderer, diagram_attachment, scaled_width};
use crate::ids::{IdGenerator, IdKind};
use crate::util::{cdata, escape_html};

/// Images wider than this get the `wide` layout.
const WIDE_THRESHOLD: u32 = 760;

/// Images wider than this get the `full-width` layout and are clamped.
const FULL_WIDTH_THRESHOLD: u32 = 1800;

/// Link destinations with this prefix point at another page by title.
const PAGE_LINK_PREFIX: &str = "ac:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Enter,
    Exit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Walk {
    Continue,
    SkipChildren,
}

pub(crate) type Handler = fn(&mut Renderer<'_>, &Node, Phase) -> Walk;

/// Node type to handler table.
pub(crate) struct Handlers {
    table: HashMap<NodeType, Handler>,
}

impl Handlers {
    pub(crate) fn new(options: &CompileOptions) -> Self {
        let mut table: HashMap<NodeType, Handler> = HashMap::new();
        table.insert(NodeType::Paragraph, paragraph);
        table.insert(NodeType::Heading, heading);
        table.insert(NodeType::Blockquote, blockquote);
        table.insert(NodeType::List, list);
        table.insert(NodeType::ListItem, list_item);
        table.insert(NodeType::TaskCheckbox, skip);
        table.insert(NodeType::CodeBlock, code_block);
        table.insert(NodeType::FencedCodeBlock, code_block);
        table.insert(NodeType::HtmlBlock, raw_html);
        table.insert(NodeType::RawHtml, raw_html);
        table.insert(NodeType::RawTag, raw_html);
        table.insert(NodeType::Text, text);
        table.insert(
            NodeType::SoftBreak,
            if options.strip_linebreaks {
                soft_break_space
            } else {
                soft_break
            },
        );
        table.insert(NodeType::HardBreak, hard_break);
        table.insert(NodeType::CodeSpan, code_span);
        table.insert(NodeType::Emphasis, emphasis);
        table.insert(NodeType::Strong, strong);
        table.insert(NodeType::Strikethrough, strikethrough);
        table.insert(NodeType::Link, link);
        table.insert(NodeType::Image, image);
        table.insert(NodeType::Mention, mention);
        table.insert(NodeType::MathInline, math_inline);
        table.insert(NodeType::MathBlock, math_block);
        table.insert(NodeType::Rule, rule);
        table.insert(NodeType::Table, table_handler);
        table.insert(NodeType::TableHead, table_head);
        table.insert(NodeType::TableRow, table_row);
        table.insert(NodeType::TableCell, table_cell);
        Self { table }
    }

    fn get(&self, node_type: NodeType) -> Option<Handler> {
        self.table.get(&node_type).copied()
    }
}

/// Mutable state of one compile.
pub(crate) struct Renderer<'a> {
    options: &'a CompileOptions,
    diagrams: Option<&'a dyn DiagramRenderer>,
    out: String,
    ids: IdGenerator,
    attachments: Vec<Attachment>,
    warnings: Vec<String>,
    /// Set until the first H1 has been dropped.
    drop_h1: bool,
    /// The heading being exited was dropped.
    dropping_heading: bool,
    /// Last task id handed out; ids are document-wide.
    task_id: usize,
    /// Whether each open list is a task list.
    lists: Vec<bool>,
    alignments: Vec<Alignment>,
    in_table_head: bool,
    cell_index: usize,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(
        options: &'a CompileOptions,
        diagrams: Option<&'a dyn DiagramRenderer>,
    ) -> Self {
        Self {
            options,
            diagrams,
            out: String::with_capacity(4096),
            ids: IdGenerator::new(),
            attachments: Vec::new(),
            warnings: Vec::new(),
            drop_h1: options.drop_h1,
            dropping_heading: false,
            task_id: 0,
            lists: Vec::new(),
            alignments: Vec::new(),
            in_table_head: false,
            cell_index: 0,
        }
    }

    pub(crate) fn walk(&mut self, handlers: &Handlers, node: &Node) {
        let handler = handlers.get(node.node_type());
        let walk = handler.map_or(Walk::Continue, |h| h(self, node, Phase::Enter));
        if walk == Walk::Continue {
            for child in &node.children {
                self.walk(handlers, child);
            }
        }
        if let Some(h) = handler {
            h(self, node, Phase::Exit);
        }
    }

    pub(crate) fn finish(self) -> (String, Vec<Attachment>, Vec<String>) {
        (self.out, self.attachments, self.warnings)
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    /// Register an attachment, reusing an earlier one with the same filename
    /// and content. A different file under a taken name is renamed with a
    /// checksum suffix.
    fn attach(&mut self, mut attachment: Attachment) -> &Attachment {
        let taken = |attachments: &[Attachment], filename: &str| {
            attachments.iter().position(|a| a.filename == filename)
        };

        if let Some(index) = taken(&self.attachments, &attachment.filename) {
            if self.attachments[index].checksum == attachment.checksum {
                return &self.attachments[index];
            }
            let renamed = qualified_filename(&attachment.filename, &attachment.checksum);
            tracing::debug!(
                attachment = %attachment.filename,
                renamed = %renamed,
                "Attachment name taken by different content"
            );
            if attachment.replace == attachment.filename {
                attachment.replace.clone_from(&renamed);
            }
            attachment.filename = renamed;
            if let Some(index) = taken(&self.attachments, &attachment.filename) {
                return &self.attachments[index];
            }
        }

        tracing::debug!(attachment = %attachment.filename, "Registered attachment");
        self.attachments.push(attachment);
        &self.attachments[self.attachments.len() - 1]
    }
}

fn skip(_: &mut Renderer<'_>, _: &Node, _: Phase) -> Walk {
    Walk::SkipChildren
}

/// Open or close `tag` depending on the phase.
fn wrap(r: &mut Renderer<'_>, phase: Phase, tag: &str) -> Walk {
    match phase {
        Phase::Enter => write!(r.out, "<{tag}>"),
        Phase::Exit => write!(r.out, "</{tag}>"),
    }
    .ok();
    Walk::Continue
}

fn paragraph(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    // Paragraphs holding only storage tags or display math are macro
    // markup, not prose.
    let bare = node.children.iter().all(|child| match &child.kind {
        Kind::RawTag { .. } | Kind::MathBlock { .. } | Kind::SoftBreak { .. } => true,
        Kind::Text { text } => text.trim().is_empty(),
        _ => false,
    });
    if bare {
        return Walk::Continue;
    }
    match phase {
        Phase::Enter => r.out.push_str("<p>"),
        Phase::Exit => r.out.push_str("</p>\n"),
    }
    Walk::Continue
}

fn heading(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    let Kind::Heading { level } = node.kind else {
        return Walk::Continue;
    };
    match phase {
        Phase::Enter => {
            if level == 1 && r.drop_h1 {
                r.drop_h1 = false;
                r.dropping_heading = true;
                return Walk::SkipChildren;
            }
            let id = r.ids.generate(&node.plain_text(), IdKind::Heading);
            write!(r.out, r#"<h{level} id="{}">"#, escape_html(&id)).ok();
        }
        Phase::Exit => {
            if r.dropping_heading {
                r.dropping_heading = false;
            } else {
                writeln!(r.out, "</h{level}>").ok();
            }
        }
    }
    Walk::Continue
}

fn blockquote(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    let Kind::Blockquote { admonition, .. } = node.kind else {
        return Walk::Continue;
    };
    match (admonition, phase) {
        (Some(admonition), Phase::Enter) => {
            write!(
                r.out,
                r#"<ac:structured-macro ac:name="{}" ac:schema-version="1">"#,
                admonition.macro_name()
            )
            .ok();
            parameter(&mut r.out, "icon", "true");
            r.out.push_str("<ac:rich-text-body>\n");
        }
        (Some(_), Phase::Exit) => {
            r.out.push_str("</ac:rich-text-body></ac:structured-macro>\n");
        }
        (None, Phase::Enter) => r.out.push_str("<blockquote>\n"),
        (None, Phase::Exit) => r.out.push_str("</blockquote>\n"),
    }
    Walk::Continue
}

/// Checkbox state of a list item, looking through a loose item's paragraph.
fn item_checkbox(item: &Node) -> Option<bool> {
    let first = item.children.first()?;
    let first = match first.kind {
        Kind::Paragraph => first.children.first()?,
        _ => first,
    };
    match first.kind {
        Kind::TaskCheckbox { checked } => Some(checked),
        _ => None,
    }
}

fn list(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    let Kind::List { start } = node.kind else {
        return Walk::Continue;
    };
    match phase {
        Phase::Enter => {
            let is_task = node.children.iter().any(|item| item_checkbox(item).is_some());
            r.lists.push(is_task);
            match (is_task, start) {
                (true, _) => r.out.push_str("<ac:task-list>\n"),
                (false, Some(1)) => r.out.push_str("<ol>\n"),
                (false, Some(start)) => {
                    writeln!(r.out, r#"<ol start="{start}">"#).ok();
                }
                (false, None) => r.out.push_str("<ul>\n"),
            }
        }
        Phase::Exit => {
            let is_task = r.lists.pop().unwrap_or(false);
            r.out.push_str(match (is_task, start) {
                (true, _) => "</ac:task-list>\n",
                (false, Some(_)) => "</ol>\n",
                (false, None) => "</ul>\n",
            });
        }
    }
    Walk::Continue
}

fn list_item(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    let in_task_list = r.lists.last().copied().unwrap_or(false);
    match (in_task_list, phase) {
        (true, Phase::Enter) => {
            r.task_id += 1;
            let status = if item_checkbox(node) == Some(true) {
                "complete"
            } else {
                "incomplete"
            };
            write!(
                r.out,
                "<ac:task><ac:task-id>{}</ac:task-id><ac:task-status>{status}</ac:task-status><ac:task-body>",
                r.task_id
            )
            .ok();
        }
        (true, Phase::Exit) => r.out.push_str("</ac:task-body></ac:task>\n"),
        (false, Phase::Enter) => r.out.push_str("<li>"),
        (false, Phase::Exit) => r.out.push_str("</li>\n"),
    }
    Walk::Continue
}

fn code_block(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    if phase == Phase::Exit {
        return Walk::SkipChildren;
    }
    let (info, code) = match &node.kind {
        Kind::FencedCodeBlock { info, text } => (CodeInfo::parse(info), text.as_str()),
        Kind::CodeBlock { text } => (CodeInfo::default(), text.as_str()),
        _ => return Walk::SkipChildren,
    };

    if !render_diagram(r, &info, code) {
        code_macro(&info, code, &mut r.out);
        r.out.push('\n');
    }
    Walk::SkipChildren
}

/// Render the block as a diagram image. Returns `false` when the block is
/// not a diagram or rendering failed.
fn render_diagram(r: &mut Renderer<'_>, info: &CodeInfo, code: &str) -> bool {
    let (Some(language), Some(diagrams), Some(scale)) =
        (&info.language, r.diagrams, r.options.diagram_scale)
    else {
        return false;
    };
    if !diagrams.supports(language) {
        return false;
    }

    let rendered = match diagrams.render(language, code) {
        Ok(rendered) => rendered,
        Err(err) => {
            r.warn(format!("failed to render {language} diagram: {err}"));
            return false;
        }
    };

    let attachment = diagram_attachment(info.title.as_deref(), code, rendered);
    let width = scaled_width(attachment.width.unwrap_or_default(), scale);
    let filename = r.attach(attachment).filename.clone();
    write!(
        r.out,
        r#"<ac:image ac:width="{width}"><ri:attachment ri:filename="{}"/></ac:image>"#,
        escape_html(&filename)
    )
    .ok();
    r.out.push('\n');
    true
}

fn raw_html(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    if phase == Phase::Enter {
        match &node.kind {
            Kind::HtmlBlock { html } | Kind::RawHtml { html } => r.out.push_str(html),
            Kind::RawTag { raw } => r.out.push_str(raw),
            _ => {}
        }
    }
    Walk::SkipChildren
}

fn text(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    if let (Phase::Enter, Kind::Text { text }) = (phase, &node.kind) {
        r.out.push_str(&escape_html(text));
    }
    Walk::SkipChildren
}

fn soft_break(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    if let (Phase::Enter, Kind::SoftBreak { between_wide }) = (phase, &node.kind)
        && !between_wide
    {
        r.out.push('\n');
    }
    Walk::SkipChildren
}

fn soft_break_space(r: &mut Renderer<'_>, _: &Node, phase: Phase) -> Walk {
    if phase == Phase::Enter {
        r.out.push(' ');
    }
    Walk::SkipChildren
}

fn hard_break(r: &mut Renderer<'_>, _: &Node, phase: Phase) -> Walk {
    if phase == Phase::Enter {
        r.out.push_str("<br />");
    }
    Walk::SkipChildren
}

fn rule(r: &mut Renderer<'_>, _: &Node, phase: Phase) -> Walk {
    if phase == Phase::Enter {
        r.out.push_str("<hr />\n");
    }
    Walk::SkipChildren
}

fn code_span(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    if let (Phase::Enter, Kind::CodeSpan { code }) = (phase, &node.kind) {
        write!(r.out, "<code>{}</code>", escape_html(code)).ok();
    }
    Walk::SkipChildren
}

fn emphasis(r: &mut Renderer<'_>, _: &Node, phase: Phase) -> Walk {
    wrap(r, phase, "em")
}

fn strong(r: &mut Renderer<'_>, _: &Node, phase: Phase) -> Walk {
    wrap(r, phase, "strong")
}

fn strikethrough(r: &mut Renderer<'_>, _: &Node, phase: Phase) -> Walk {
    wrap(r, phase, "del")
}

/// Page title and anchor of an `ac:` link, percent-decoded.
fn page_link(dest: &str) -> Option<(String, Option<String>)> {
    let target = dest.strip_prefix(PAGE_LINK_PREFIX)?;
    let decoded = percent_decode_str(target).decode_utf8_lossy();
    Some(match decoded.split_once('#') {
        Some((title, anchor)) => (title.to_owned(), Some(anchor.to_owned())),
        None => (decoded.into_owned(), None),
    })
}

fn link(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    let Kind::Link { dest, title } = &node.kind else {
        return Walk::Continue;
    };

    if let Some((page, anchor)) = page_link(dest) {
        match phase {
            Phase::Enter => {
                r.out.push_str("<ac:link");
                if let Some(anchor) = anchor.filter(|a| !a.is_empty()) {
                    write!(r.out, r#" ac:anchor="{}""#, escape_html(&anchor)).ok();
                }
                let page = if page.is_empty() {
                    node.plain_text()
                } else {
                    page
                };
                write!(
                    r.out,
                    r#"><ri:page ri:content-title="{}"/><ac:link-body>"#,
                    escape_html(&page)
                )
                .ok();
            }
            Phase::Exit => r.out.push_str("</ac:link-body></ac:link>"),
        }
        return Walk::Continue;
    }

    match phase {
        Phase::Enter => {
            write!(r.out, r#"<a href="{}""#, escape_html(dest)).ok();
            if !title.is_empty() {
                write!(r.out, r#" title="{}""#, escape_html(title)).ok();
            }
            r.out.push('>');
        }
        Phase::Exit => r.out.push_str("</a>"),
    }
    Walk::Continue
}

/// Resolve an image destination to a local file under the base directory.
fn local_image(r: &Renderer<'_>, dest: &str) -> Option<Attachment> {
    if dest.contains("://") || dest.starts_with("data:") {
        return None;
    }
    let decoded = percent_decode_str(dest).decode_utf8_lossy();
    let path = decoded.strip_prefix("./").unwrap_or(&*decoded);
    match Attachment::from_file(&r.options.base_dir, path) {
        Ok(attachment) => Some(attachment),
        Err(err) => {
            tracing::debug!(image = dest, error = %err, "Treating image as external URL");
            None
        }
    }
}

fn image(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    let (Phase::Enter, Kind::Image { dest, title }) = (phase, &node.kind) else {
        return Walk::SkipChildren;
    };

    let alt = node.plain_text();
    let (resource, width, height) = match local_image(r, dest) {
        Some(attachment) => {
            let attachment = r.attach(attachment);
            (
                format!(
                    r#"<ri:attachment ri:filename="{}"/>"#,
                    escape_html(&attachment.filename)
                ),
                attachment.width,
                attachment.height,
            )
        }
        None => (
            format!(r#"<ri:url ri:value="{}"/>"#, escape_html(dest)),
            None,
            None,
        ),
    };

    r.out.push_str("<ac:image");
    let (mut width, mut height) = (width, height);
    if let Some(align) = &r.options.image_align {
        let layout = match width {
            Some(w) if w > FULL_WIDTH_THRESHOLD => {
                width = Some(FULL_WIDTH_THRESHOLD);
                height = height.map(|h| scale_dimension(h, FULL_WIDTH_THRESHOLD, w));
                "full-width"
            }
            Some(w) if w > WIDE_THRESHOLD => "wide",
            _ => align.as_str(),
        };
        write!(
            r.out,
            r#" ac:align="{}" ac:layout="{}""#,
            escape_html(align),
            escape_html(layout)
        )
        .ok();
    }
    if !alt.is_empty() {
        write!(r.out, r#" ac:alt="{}""#, escape_html(&alt)).ok();
    }
    if !title.is_empty() {
        write!(r.out, r#" ac:title="{}""#, escape_html(title)).ok();
    }
    if let Some(width) = width {
        write!(r.out, r#" ac:width="{width}""#).ok();
    }
    if let Some(height) = height {
        write!(r.out, r#" ac:height="{height}""#).ok();
    }
    write!(r.out, ">{resource}</ac:image>").ok();
    Walk::SkipChildren
}

/// `value * to / from`, rounded.
fn scale_dimension(value: u32, to: u32, from: u32) -> u32 {
    if from == 0 {
        return value;
    }
    let scaled = (u64::from(value) * u64::from(to) + u64::from(from) / 2) / u64::from(from);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

fn mention(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    if let (Phase::Enter, Kind::Mention { name }) = (phase, &node.kind) {
        write!(
            r.out,
            r#"<ac:link><ri:user ri:username="{}"/></ac:link>"#,
            escape_html(name)
        )
        .ok();
    }
    Walk::SkipChildren
}

fn math_inline(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    if let (Phase::Enter, Kind::MathInline { tex }) = (phase, &node.kind) {
        r.out
            .push_str(r#"<ac:structured-macro ac:name="mathinline" ac:schema-version="1">"#);
        parameter(&mut r.out, "body", tex);
        r.out.push_str("</ac:structured-macro>");
    }
    Walk::SkipChildren
}

fn math_block(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    if let (Phase::Enter, Kind::MathBlock { tex }) = (phase, &node.kind) {
        write!(
            r.out,
            r#"<ac:structured-macro ac:name="mathblock" ac:schema-version="1"><ac:plain-text-body>{}</ac:plain-text-body></ac:structured-macro>"#,
            cdata(tex)
        )
        .ok();
    }
    Walk::SkipChildren
}

fn table_handler(r: &mut Renderer<'_>, node: &Node, phase: Phase) -> Walk {
    let Kind::Table { alignments } = &node.kind else {
        return Walk::Continue;
    };
    match phase {
        Phase::Enter => {
            r.alignments.clone_from(alignments);
            r.out.push_str("<table>\n");
        }
        Phase::Exit => {
            r.alignments.clear();
            r.out.push_str("</tbody></table>\n");
        }
    }
    Walk::Continue
}

fn table_head(r: &mut Renderer<'_>, _: &Node, phase: Phase) -> Walk {
    match phase {
        Phase::Enter => {
            r.in_table_head = true;
            r.cell_index = 0;
            r.out.push_str("<thead><tr>");
        }
        Phase::Exit => {
            r.in_table_head = false;
            r.out.push_str("</tr></thead>\n<tbody>\n");
        }
    }
    Walk::Continue
}

fn table_row(r: &mut Renderer<'_>, _: &Node, phase: Phase) -> Walk {
    match phase {
        Phase::Enter => {
            r.cell_index = 0;
            r.out.push_str("<tr>");
        }
        Phase::Exit => r.out.push_str("</tr>\n"),
    }
    Walk::Continue
}

fn table_cell(r: &mut Renderer<'_>, _: &Node, phase: Phase) -> Walk {
    let tag = if r.in_table_head { "th" } else { "td" };
    match phase {
        Phase::Enter => {
            let align = match r.alignments.get(r.cell_index) {
                Some(Alignment::Left) => Some("left"),
                Some(Alignment::Center) => Some("center"),
                Some(Alignment::Right) => Some("right"),
                Some(Alignment::None) | None => None,
            };
            match align {
                Some(align) => write!(r.out, r#"<{tag} style="text-align: {align}">"#),
                None => write!(r.out, "<{tag}>"),
            }
            .ok();
        }
        Phase::Exit => {
            r.cell_index += 1;
            write!(r.out, "</{tag}>").ok();
        }
    }
    Walk::Continue
}
