//! Directive grammar.
//!
//! ```text
//! <!-- Include: <path> [\nDelims: none|"L","R"] [\n<yaml config>] -->
//! <!-- Macro: <regex>\nTemplate: <path>[\n<yaml config>] -->
//! ```

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::template::Delims;

/// Both directive grammars, matched in a single pass.
pub(crate) static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?s)<!--[ \t]*(?:",
        r"(?i:include):[ \t]*(?P<include>[^\n]+?)[ \t]*",
        r#"(?:\n[ \t]*(?i:delims):[ \t]*(?:(?P<nodelims>none)|"(?P<left>[^"\n]*)"[ \t]*,[ \t]*"(?P<right>[^"\n]*)")[ \t]*)?"#,
        r"(?:\n(?P<iconfig>.*?))?",
        r"|",
        r"(?i:macro):[ \t]*(?P<expr>[^\n]+?)[ \t]*\n",
        r"[ \t]*(?i:template):[ \t]*(?P<template>[^\n]+?)[ \t]*",
        r"(?:\n(?P<mconfig>.*?))?",
        r")[ \t]*-->",
    ))
    .unwrap()
});

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct IncludeDirective {
    pub name: String,
    pub delims: Delims,
    pub config: String,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MacroDirective {
    pub expr: String,
    pub template: String,
    pub config: String,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Directive {
    Include(IncludeDirective),
    Macro(MacroDirective),
}

impl Directive {
    pub(crate) fn from_captures(caps: &Captures<'_>) -> Option<Self> {
        let group = |name| caps.name(name).map_or("", |m| m.as_str());

        if let Some(name) = caps.name("include") {
            let delims = if caps.name("nodelims").is_some() {
                Delims::None
            } else if let (Some(left), Some(right)) = (caps.name("left"), caps.name("right")) {
                Delims::Custom(left.as_str().to_owned(), right.as_str().to_owned())
            } else {
                Delims::Standard
            };
            return Some(Self::Include(IncludeDirective {
                name: name.as_str().to_owned(),
                delims,
                config: group("iconfig").to_owned(),
            }));
        }

        let expr = caps.name("expr")?;
        Some(Self::Macro(MacroDirective {
            expr: expr.as_str().to_owned(),
            template: group("template").to_owned(),
            config: group("mconfig").to_owned(),
        }))
    }
}
