//! Reformatting of the active buffer.
//!
//! [`BasicFormatter`] applies plain regex substitutions; it has no grammar and
//! will mis-indent markup it does not expect (for example self-closing tags
//! outside its short void-element list).

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::domain::buffers::Language;

const INDENT: &str = "  ";
const VOID_PREFIXES: [&str; 4] = ["input", "img", "br", "hr"];

static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s*<").expect("between-tags regex"));
static CLOSING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/\w").expect("closing-tag regex"));
static OPENING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^<?\w[^>]*[^/]$").expect("opening-tag regex"));
static OPEN_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\{\s*").expect("open-brace regex"));
static SEMICOLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";\s*").expect("semicolon regex"));
static CLOSE_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\}\s*").expect("close-brace regex"));
static COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*").expect("comma regex"));

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("{language} formatter failed: {message}")]
    Failed { language: Language, message: String },
}

impl FormatError {
    pub fn failed(language: Language, message: impl Into<String>) -> Self {
        Self::Failed {
            language,
            message: message.into(),
        }
    }
}

pub trait Formatter: Send + Sync {
    fn format(&self, language: Language, source: &str) -> Result<String, FormatError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicFormatter;

impl Formatter for BasicFormatter {
    fn format(&self, language: Language, source: &str) -> Result<String, FormatError> {
        Ok(match language {
            Language::Markup => format_markup(source),
            Language::Style => format_style(source),
            Language::Script => format_script(source),
        })
    }
}

/// Break markup between adjacent tags and indent by nesting depth.
pub fn format_markup(source: &str) -> String {
    let mut formatted = String::with_capacity(source.len() * 2);
    let mut depth: usize = 0;

    for element in BETWEEN_TAGS.split(source) {
        if CLOSING_TAG.is_match(element) {
            depth = depth.saturating_sub(1);
        }

        formatted.push_str(&INDENT.repeat(depth));
        formatted.push('<');
        formatted.push_str(element);
        formatted.push_str(">\n");

        if OPENING_TAG.is_match(element)
            && !VOID_PREFIXES.iter().any(|tag| element.starts_with(tag))
        {
            depth += 1;
        }
    }

    // The first piece keeps its own `<` and the last its own `>`.
    let end = formatted.len().saturating_sub(2);
    formatted.get(1..end).unwrap_or_default().to_string()
}

/// Break rules onto their own lines and declarations one per line.
pub fn format_style(source: &str) -> String {
    let text = break_blocks(source);
    COMMA.replace_all(&text, ",\n").trim().to_string()
}

/// Break blocks and statements onto their own lines.
pub fn format_script(source: &str) -> String {
    break_blocks(source).trim().to_string()
}

fn break_blocks(source: &str) -> String {
    let text = OPEN_BRACE.replace_all(source, " {\n  ");
    let text = SEMICOLON.replace_all(&text, ";\n  ");
    CLOSE_BRACE.replace_all(&text, "\n}\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_nests_children() {
        assert_eq!(
            format_markup("<div><p>hi</p></div>"),
            "<div>\n  <p>hi</p>\n</div>"
        );
    }

    #[test]
    fn markup_void_elements_do_not_indent() {
        assert_eq!(
            format_markup("<div><img src=\"a.png\"><br><span>x</span></div>"),
            "<div>\n  <img src=\"a.png\">\n  <br>\n  <span>x</span>\n</div>"
        );
    }

    #[test]
    fn markup_empty_input_stays_empty() {
        assert_eq!(format_markup(""), "");
    }

    #[test]
    fn style_breaks_rules_and_declarations() {
        assert_eq!(
            format_style("h1,h2{color:red;margin:0;}"),
            "h1,\nh2 {\n  color:red;\n  margin:0;\n}"
        );
    }

    #[test]
    fn script_breaks_blocks() {
        assert_eq!(
            format_script("if (a) { run(); }"),
            "if (a) {\n  run();\n}"
        );
    }

    #[test]
    fn basic_formatter_dispatches_by_language() {
        let formatter = BasicFormatter;
        let out = formatter
            .format(Language::Style, "a{b:c;}")
            .expect("basic formatter never fails");
        assert_eq!(out, "a {\n  b:c;\n}");
    }

    #[test]
    fn markup_splits_across_whitespace_between_tags() {
        assert_eq!(
            format_markup("<ul>\n  <li>a</li>   <li>b</li>\n</ul>"),
            "<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>"
        );
    }

    #[test]
    fn markup_self_closing_tags_do_not_indent() {
        assert_eq!(
            format_markup("<div><x-icon/><p>a</p></div>"),
            "<div>\n  <x-icon/>\n  <p>a</p>\n</div>"
        );
    }

    #[test]
    fn script_collapses_existing_whitespace() {
        assert_eq!(
            format_script("function f()   {\n\n  a();   b();\n}"),
            "function f() {\n  a();\n  b();\n}"
        );
    }
}
