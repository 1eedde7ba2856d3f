//! User-declared macros.
//!
//! A `Macro` directive registers a rule: every match of its regex in the
//! document body is replaced by its template, rendered with the directive's
//! YAML config after capture-group expansion (`${1}`, `${name}`).

use regex::Regex;

use crate::directive::MacroDirective;
use crate::error::IncludeError;
use crate::fence;
use crate::template::{Delims, TemplateStore, parse_context};

/// A compiled (trigger regex, template, config) rule.
#[derive(Debug)]
pub struct Macro {
    regex: Regex,
    template: String,
    config: String,
}

impl Macro {
    pub(crate) fn compile(directive: &MacroDirective) -> Result<Self, IncludeError> {
        let regex = Regex::new(&directive.expr).map_err(|source| IncludeError::Regex {
            expr: directive.expr.clone(),
            source,
        })?;
        Ok(Self {
            regex,
            template: directive.template.clone(),
            config: directive.config.clone(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Replace every match outside fenced code and inline code spans.
    ///
    /// A match whose template fails to render is left as is and reported
    /// through `warnings`.
    pub(crate) fn apply(
        &self,
        text: &str,
        templates: &mut TemplateStore,
        warnings: &mut Vec<String>,
    ) -> String {
        let spans = fence::all_code_spans(text);
        let mut output = String::with_capacity(text.len());
        let mut last = 0;

        for caps in self.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            if whole.is_empty() || fence::in_spans(&spans, whole.start()) {
                continue;
            }

            let mut config = String::new();
            caps.expand(&self.config, &mut config);

            let rendered = parse_context(&self.template, &config)
                .and_then(|context| templates.render(&self.template, &Delims::Standard, context));

            match rendered {
                Ok(rendered) => {
                    output.push_str(&text[last..whole.start()]);
                    output.push_str(&rendered);
                    last = whole.end();
                }
                Err(err) => {
                    let message = format!("macro \"{}\": {err}", self.regex.as_str());
                    if !warnings.contains(&message) {
                        tracing::warn!("{message}");
                        warnings.push(message);
                    }
                }
            }
        }

        output.push_str(&text[last..]);
        output
    }
}
