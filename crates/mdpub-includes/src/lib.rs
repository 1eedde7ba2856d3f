//! Include and macro directive expansion.
//!
//! The expander rewrites a markdown document until no more directives fire:
//!
//! - `<!-- Include: path -->` is replaced by the rendered template. Included
//!   text may itself contain directives, which the next pass expands.
//! - `<!-- Macro: regex\nTemplate: path -->` is removed from the text and
//!   registered as a rule. Rules are applied globally once the document has
//!   reached its fixed point.
//!
//! Directives inside fenced code blocks are never touched. A directive that
//! fails (missing template, bad YAML, render error, include cycle) stays in
//! the text verbatim and is reported as a warning; the rest of the document
//! still expands.
//!
//! # Example
//!
//! ```
//! use mdpub_includes::{ExpandOptions, Expander};
//!
//! let mut expander = Expander::new(".", ExpandOptions::default());
//! let expanded = expander
//!     .expand("<!-- Include: ac:status\nTitle: OK\n-->")
//!     .unwrap();
//! assert!(expanded.text.contains(r#"ac:name="status""#));
//! ```

mod directive;
mod error;
mod fence;
mod macros;
mod stdlib;
mod template;

use std::path::PathBuf;

pub use error::IncludeError;
pub use macros::Macro;
pub use template::{Delims, TemplateStore, render_builtin};

use directive::{DIRECTIVE_RE, Directive, IncludeDirective};
use template::parse_context;

/// Default maximum include nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// Default cap on expansion passes before giving up.
pub const DEFAULT_MAX_PASSES: usize = 64;

/// Expander configuration.
#[derive(Clone, Debug)]
pub struct ExpandOptions {
    /// Directories searched for templates after the document directory.
    pub include_dirs: Vec<PathBuf>,
    /// Maximum include nesting depth.
    pub max_depth: usize,
    /// Maximum number of passes before expansion is declared non-terminating.
    pub max_passes: usize,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            include_dirs: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

/// Result of [`Expander::expand`].
#[derive(Debug)]
pub struct Expanded {
    pub text: String,
    /// Passes run, including the final pass that changed nothing.
    pub passes: usize,
    pub warnings: Vec<String>,
}

/// Piece of the document together with the include chain that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    text: String,
    chain: Vec<String>,
}

/// Directive expander for one document.
///
/// Holds the template registry and the macros collected so far, so the same
/// expander can be reused for documents sharing a directory.
pub struct Expander {
    templates: TemplateStore,
    macros: Vec<Macro>,
    options: ExpandOptions,
    warnings: Vec<String>,
}

impl Expander {
    /// Create an expander resolving templates relative to `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>, options: ExpandOptions) -> Self {
        Self {
            templates: TemplateStore::new(base_dir, &options.include_dirs),
            macros: Vec::new(),
            options,
            warnings: Vec::new(),
        }
    }

    /// Template registry, including every template loaded so far.
    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Macros registered by `Macro` directives so far.
    pub fn macros(&self) -> &[Macro] {
        &self.macros
    }

    /// Expand `text` to its fixed point, then apply registered macros.
    ///
    /// # Errors
    ///
    /// Returns [`IncludeError::NoFixedPoint`] if expansion is still producing
    /// new directives after `max_passes` passes.
    pub fn expand(&mut self, text: &str) -> Result<Expanded, IncludeError> {
        self.warnings.clear();
        let mut segments = vec![Segment {
            text: text.to_owned(),
            chain: Vec::new(),
        }];

        let mut passes = 0;
        loop {
            if passes == self.options.max_passes {
                return Err(IncludeError::NoFixedPoint { passes });
            }
            passes += 1;
            if !self.pass(&mut segments) {
                break;
            }
        }
        tracing::debug!(passes, macros = self.macros.len(), "Directives expanded");

        let mut text: String = segments.iter().map(|s| s.text.as_str()).collect();
        for rule in &self.macros {
            text = rule.apply(&text, &mut self.templates, &mut self.warnings);
        }

        Ok(Expanded {
            text,
            passes,
            warnings: std::mem::take(&mut self.warnings),
        })
    }

    /// Run one expansion pass over all segments. Returns whether anything
    /// was rewritten.
    fn pass(&mut self, segments: &mut Vec<Segment>) -> bool {
        let full: String = segments.iter().map(|s| s.text.as_str()).collect();
        let spans = fence::code_spans(&full);

        let mut output: Vec<Segment> = Vec::with_capacity(segments.len());
        let mut expanded = false;
        let mut base = 0;

        for segment in segments.drain(..) {
            let mut last = 0;

            for caps in DIRECTIVE_RE.captures_iter(&segment.text) {
                let Some(whole) = caps.get(0) else {
                    continue;
                };
                if fence::in_spans(&spans, base + whole.start()) {
                    continue;
                }
                let Some(directive) = Directive::from_captures(&caps) else {
                    continue;
                };

                let replacement = match directive {
                    Directive::Include(include) => self
                        .include(&include, &segment.chain)
                        .map(|text| (text, Some(include.name))),
                    Directive::Macro(directive) => Macro::compile(&directive).map(|rule| {
                        tracing::debug!(pattern = rule.pattern(), template = rule.template(), "Registered macro");
                        self.macros.push(rule);
                        (String::new(), None)
                    }),
                };

                match replacement {
                    Ok((text, name)) => {
                        push_segment(&mut output, &segment.text[last..whole.start()], &segment.chain);
                        let mut chain = segment.chain.clone();
                        chain.extend(name);
                        push_segment(&mut output, &text, &chain);
                        last = whole.end();
                        expanded = true;
                    }
                    Err(err) => self.warn(err.to_string()),
                }
            }

            push_segment(&mut output, &segment.text[last..], &segment.chain);
            base += segment.text.len();
        }

        *segments = output;
        expanded
    }

    fn include(
        &mut self,
        include: &IncludeDirective,
        chain: &[String],
    ) -> Result<String, IncludeError> {
        if chain.iter().any(|name| *name == include.name) {
            let mut cycle = chain.to_vec();
            cycle.push(include.name.clone());
            return Err(IncludeError::Cycle { chain: cycle });
        }
        if chain.len() >= self.options.max_depth {
            return Err(IncludeError::DepthExceeded {
                name: include.name.clone(),
                max: self.options.max_depth,
            });
        }

        let context = parse_context(&include.name, &include.config)?;
        tracing::debug!(template = %include.name, depth = chain.len(), "Expanding include");
        self.templates.render(&include.name, &include.delims, context)
    }

    fn warn(&mut self, message: String) {
        if !self.warnings.contains(&message) {
            tracing::warn!("{message}");
            self.warnings.push(message);
        }
    }
}

/// Append text to the segment list, merging with the previous segment when
/// both came from the same include chain.
fn push_segment(segments: &mut Vec<Segment>, text: &str, chain: &[String]) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = segments.last_mut()
        && last.chain == chain
    {
        last.text.push_str(text);
        return;
    }
    segments.push(Segment {
        text: text.to_owned(),
        chain: chain.to_vec(),
    });
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn expander(dir: &TempDir) -> Expander {
        Expander::new(dir.path(), ExpandOptions::default())
    }

    #[test]
    fn test_no_directives_is_identity() {
        let dir = TempDir::new().unwrap();
        let text = "# Title\n\n<!-- a comment -->\nBody\n";

        let expanded = expander(&dir).expand(text).unwrap();

        assert_eq!(expanded.text, text);
        assert_eq!(expanded.passes, 1);
        assert!(expanded.warnings.is_empty());
    }

    #[test]
    fn test_include_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("greeting.md"), "Hello, {{ name }}!").unwrap();

        let expanded = expander(&dir)
            .expand("Before\n<!-- Include: greeting.md\nname: World\n-->\nAfter\n")
            .unwrap();

        assert_eq!(expanded.text, "Before\nHello, World!\nAfter\n");
    }

    #[test]
    fn test_nested_includes_reach_fixed_point() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("outer.md"), "[<!-- Include: inner.md -->]").unwrap();
        fs::write(dir.path().join("inner.md"), "inner").unwrap();

        let expanded = expander(&dir).expand("<!-- Include: outer.md -->").unwrap();

        assert_eq!(expanded.text, "[inner]");
        assert_eq!(expanded.passes, 3);
    }

    #[test]
    fn test_include_inside_fence_is_verbatim() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("part.md"), "PART").unwrap();
        let text = "````md\n<!-- Include: part.md -->\n```\nstill code\n````\n\
                    <!-- Include: part.md -->\n";

        let expanded = expander(&dir).expand(text).unwrap();

        assert_eq!(
            expanded.text,
            "````md\n<!-- Include: part.md -->\n```\nstill code\n````\nPART\n"
        );
    }

    #[test]
    fn test_macro_inside_fence_is_verbatim() {
        let dir = TempDir::new().unwrap();
        let text = "```\n<!-- Macro: :x:\nTemplate: ac:emoticon\nname: tick\n-->\n:x:\n```\n";

        let expanded = expander(&dir).expand(text).unwrap();

        assert_eq!(expanded.text, text);
    }

    #[test]
    fn test_failed_include_is_preserved() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ok.md"), "fine").unwrap();
        let text = "<!-- Include: missing.md -->\n<!-- Include: ok.md -->\n";

        let expanded = expander(&dir).expand(text).unwrap();

        assert_eq!(expanded.text, "<!-- Include: missing.md -->\nfine\n");
        assert_eq!(expanded.warnings.len(), 1);
        assert!(expanded.warnings[0].contains("missing.md"));
    }

    #[test]
    fn test_bad_yaml_is_preserved() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("t.md"), "x").unwrap();
        let text = "<!-- Include: t.md\nkey: [unclosed\n-->";

        let expanded = expander(&dir).expand(text).unwrap();

        assert_eq!(expanded.text, text);
        assert!(expanded.warnings[0].contains("invalid YAML"));
    }

    #[test]
    fn test_include_cycle_is_detected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "A(<!-- Include: b.md -->)").unwrap();
        fs::write(dir.path().join("b.md"), "B(<!-- Include: a.md -->)").unwrap();

        let expanded = expander(&dir).expand("<!-- Include: a.md -->").unwrap();

        assert_eq!(expanded.text, "A(B(<!-- Include: a.md -->))");
        assert_eq!(expanded.warnings, vec!["include cycle: a.md -> b.md -> a.md"]);
    }

    #[test]
    fn test_same_template_twice_is_not_a_cycle() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x.md"), "x").unwrap();

        let expanded = expander(&dir)
            .expand("<!-- Include: x.md --> <!-- Include: x.md -->")
            .unwrap();

        assert_eq!(expanded.text, "x x");
        assert!(expanded.warnings.is_empty());
    }

    #[test]
    fn test_depth_limit() {
        let dir = TempDir::new().unwrap();
        for i in 0..3 {
            fs::write(
                dir.path().join(format!("{i}.md")),
                format!("{i}<!-- Include: {}.md -->", i + 1),
            )
            .unwrap();
        }
        fs::write(dir.path().join("3.md"), "end").unwrap();
        let options = ExpandOptions {
            max_depth: 2,
            ..Default::default()
        };

        let expanded = Expander::new(dir.path(), options)
            .expand("<!-- Include: 0.md -->")
            .unwrap();

        assert_eq!(expanded.text, "01<!-- Include: 2.md -->");
        assert!(expanded.warnings[0].contains("maximum include depth (2)"));
    }

    #[test]
    fn test_pass_cap_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "<!-- Include: b.md -->").unwrap();
        fs::write(dir.path().join("b.md"), "b").unwrap();
        let options = ExpandOptions {
            max_passes: 1,
            ..Default::default()
        };

        let err = Expander::new(dir.path(), options)
            .expand("<!-- Include: a.md -->")
            .unwrap_err();

        assert!(matches!(err, IncludeError::NoFixedPoint { passes: 1 }));
    }

    #[test]
    fn test_macro_is_registered_and_applied() {
        let dir = TempDir::new().unwrap();
        let text = "<!-- Macro: :jira:([A-Z]+-\\d+):\nTemplate: ac:jira:ticket\nTicket: ${1}\n-->\n\
                    See :jira:DOC-42:.\n";

        let mut expander = expander(&dir);
        let expanded = expander.expand(text).unwrap();

        assert_eq!(
            expanded.text,
            "\nSee <ac:structured-macro ac:name=\"jira\">\
             <ac:parameter ac:name=\"key\">DOC-42</ac:parameter>\
             </ac:structured-macro>.\n"
        );
        assert_eq!(expander.macros().len(), 1);
    }

    #[test]
    fn test_macro_from_included_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("macros.md"),
            "<!-- Macro: :ok:\nTemplate: ac:emoticon\nname: tick\n-->",
        )
        .unwrap();

        let expanded = expander(&dir)
            .expand("<!-- Include: macros.md\nDelims: none\n-->\nDone :ok:")
            .unwrap();

        assert_eq!(expanded.text, "\nDone <ac:emoticon ac:name=\"tick\"/>");
    }

    #[test]
    fn test_include_dirs_search_path() {
        let doc_dir = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        fs::write(shared.path().join("common.md"), "common").unwrap();
        let options = ExpandOptions {
            include_dirs: vec![shared.path().to_path_buf()],
            ..Default::default()
        };

        let expanded = Expander::new(doc_dir.path(), options)
            .expand("<!-- Include: common.md -->")
            .unwrap();

        assert_eq!(expanded.text, "common");
    }
}
