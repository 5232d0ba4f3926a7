//! The three editable source buffers owned by a playground session.

use std::{fmt, str::FromStr};

use super::error::DomainError;

/// Language tag identifying one of the three buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Markup,
    Style,
    Script,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Markup, Language::Style, Language::Script];

    /// Short tab name used by editor tabs (`html`, `css`, `js`).
    pub fn tab_name(self) -> &'static str {
        match self {
            Language::Markup => "html",
            Language::Style => "css",
            Language::Script => "js",
        }
    }

    /// Line comment syntax as `(open, close)`; `close` is empty for `//`.
    pub fn comment_delimiters(self) -> (&'static str, &'static str) {
        match self {
            Language::Markup => ("<!--", "-->"),
            Language::Style => ("/*", "*/"),
            Language::Script => ("//", ""),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tab_name())
    }
}

impl FromStr for Language {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "html" | "markup" => Ok(Language::Markup),
            "css" | "style" => Ok(Language::Style),
            "js" | "javascript" | "script" => Ok(Language::Script),
            other => Err(DomainError::unknown("language", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuffer {
    language: Language,
    text: String,
}

impl SourceBuffer {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            text: String::new(),
        }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }
}

/// Markup, style and script buffers. All three exist for the lifetime of the
/// session; clearing empties them but never removes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuffers {
    markup: SourceBuffer,
    style: SourceBuffer,
    script: SourceBuffer,
}

impl SourceBuffers {
    pub fn new() -> Self {
        Self {
            markup: SourceBuffer::new(Language::Markup),
            style: SourceBuffer::new(Language::Style),
            script: SourceBuffer::new(Language::Script),
        }
    }

    pub fn with_text(
        markup: impl Into<String>,
        style: impl Into<String>,
        script: impl Into<String>,
    ) -> Self {
        let mut buffers = Self::new();
        buffers.markup.set_text(markup);
        buffers.style.set_text(style);
        buffers.script.set_text(script);
        buffers
    }

    pub fn get(&self, language: Language) -> &SourceBuffer {
        match language {
            Language::Markup => &self.markup,
            Language::Style => &self.style,
            Language::Script => &self.script,
        }
    }

    pub fn get_mut(&mut self, language: Language) -> &mut SourceBuffer {
        match language {
            Language::Markup => &mut self.markup,
            Language::Style => &mut self.style,
            Language::Script => &mut self.script,
        }
    }

    pub fn text(&self, language: Language) -> &str {
        self.get(language).text()
    }

    pub fn markup(&self) -> &str {
        self.markup.text()
    }

    pub fn style(&self) -> &str {
        self.style.text()
    }

    pub fn script(&self) -> &str {
        self.script.text()
    }

    pub fn clear(&mut self) {
        for language in Language::ALL {
            self.get_mut(language).clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        Language::ALL
            .iter()
            .all(|language| self.text(*language).is_empty())
    }
}

impl Default for SourceBuffers {
    fn default() -> Self {
        Self::new()
    }
}
