//! Fenced code info strings and the code macro.

use crate::util::{cdata, escape_html};

/// Options parsed from a fence info string.
///
/// Grammar: `(lang|-)? (option)* (title <text>)?`, where an option is
/// `collapse`, `nocollapse`, a first-line number, or a theme name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodeInfo {
    pub language: Option<String>,
    pub collapse: Option<bool>,
    pub title: Option<String>,
    pub theme: Option<String>,
    pub firstline: Option<u32>,
    pub linenumbers: bool,
}

impl CodeInfo {
    pub fn parse(info: &str) -> Self {
        let mut result = Self::default();
        let mut rest = info.trim();

        if let Some((first, tail)) = next_token(rest)
            && !is_option(first)
        {
            if first != "-" {
                result.language = Some(first.to_owned());
            }
            rest = tail;
        }

        while let Some((token, tail)) = next_token(rest) {
            match token {
                "title" => {
                    let title = tail.trim();
                    if !title.is_empty() {
                        result.title = Some(title.to_owned());
                    }
                    break;
                }
                "collapse" => result.collapse = Some(true),
                "nocollapse" => result.collapse = Some(false),
                _ => {
                    if let Ok(line) = token.parse::<u32>() {
                        result.firstline = Some(line);
                        result.linenumbers = true;
                    } else {
                        result.theme = Some(token.to_owned());
                    }
                }
            }
            rest = tail;
        }
        result
    }
}

fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    Some(s.split_once(char::is_whitespace).unwrap_or((s, "")))
}

fn is_option(token: &str) -> bool {
    matches!(token, "collapse" | "nocollapse" | "title") || token.parse::<u32>().is_ok()
}

/// Render a code macro. The trailing newline of the block is dropped.
pub fn code_macro(info: &CodeInfo, code: &str, out: &mut String) {
    out.push_str(r#"<ac:structured-macro ac:name="code" ac:schema-version="1">"#);
    if let Some(language) = &info.language {
        parameter(out, "language", language);
    }
    if let Some(collapse) = info.collapse {
        parameter(out, "collapse", if collapse { "true" } else { "false" });
    }
    if let Some(title) = &info.title {
        parameter(out, "title", title);
    }
    if let Some(theme) = &info.theme {
        parameter(out, "theme", theme);
    }
    if info.linenumbers {
        parameter(out, "linenumbers", "true");
    }
    if let Some(firstline) = info.firstline {
        parameter(out, "firstline", &firstline.to_string());
    }
    out.push_str("<ac:plain-text-body>");
    out.push_str(&cdata(code.strip_suffix('\n').unwrap_or(code)));
    out.push_str("</ac:plain-text-body></ac:structured-macro>");
}

pub(crate) fn parameter(out: &mut String, name: &str, value: &str) {
    out.push_str(r#"<ac:parameter ac:name=""#);
    out.push_str(name);
    out.push_str(r#"">"#);
    out.push_str(&escape_html(value));
    out.push_str("</ac:parameter>");
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_language_only() {
        assert_eq!(
            CodeInfo::parse("rust"),
            CodeInfo {
                language: Some("rust".to_owned()),
                ..CodeInfo::default()
            }
        );
    }

    #[test]
    fn test_parse_full_grammar() {
        assert_eq!(
            CodeInfo::parse("python collapse 10 monokai title Setup script"),
            CodeInfo {
                language: Some("python".to_owned()),
                collapse: Some(true),
                title: Some("Setup script".to_owned()),
                theme: Some("monokai".to_owned()),
                firstline: Some(10),
                linenumbers: true,
            }
        );
    }

    #[test]
    fn test_parse_dash_means_no_language() {
        let info = CodeInfo::parse("- nocollapse");
        assert_eq!(info.language, None);
        assert_eq!(info.collapse, Some(false));
    }

    #[test]
    fn test_parse_leading_option_is_not_language() {
        let info = CodeInfo::parse("title Example");
        assert_eq!(info.language, None);
        assert_eq!(info.title.as_deref(), Some("Example"));

        let info = CodeInfo::parse("5");
        assert_eq!(info.language, None);
        assert_eq!(info.firstline, Some(5));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(CodeInfo::parse(""), CodeInfo::default());
    }

    #[test]
    fn test_code_macro() {
        let mut out = String::new();
        let info = CodeInfo::parse("sh collapse title Run <it>");
        code_macro(&info, "echo ]]> done\n", &mut out);

        assert_eq!(
            out,
            concat!(
                r#"<ac:structured-macro ac:name="code" ac:schema-version="1">"#,
                r#"<ac:parameter ac:name="language">sh</ac:parameter>"#,
                r#"<ac:parameter ac:name="collapse">true</ac:parameter>"#,
                r#"<ac:parameter ac:name="title">Run &lt;it&gt;</ac:parameter>"#,
                "<ac:plain-text-body><![CDATA[echo ]]]]><![CDATA[> done]]></ac:plain-text-body>",
                "</ac:structured-macro>",
            )
        );
    }

    #[test]
    fn test_code_macro_without_language() {
        let mut out = String::new();
        code_macro(&CodeInfo::default(), "plain", &mut out);
        assert!(!out.contains(r#"ac:name="language""#));
        assert!(out.contains("<![CDATA[plain]]>"));
    }
}
