//! Text edits driven by keyboard shortcuts.

use crate::domain::buffers::Language;

/// Byte range selected in the active editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn caret(at: usize) -> Self {
        Self { start: at, end: at }
    }

    /// Clamp to `text`, moving each bound back to a character boundary.
    pub fn clamp_to(self, text: &str) -> Self {
        Self::new(floor_boundary(text, self.start), floor_boundary(text, self.end))
    }
}

fn floor_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Result of applying an edit to a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub text: String,
    pub selection: Selection,
}

/// Comment or uncomment the line(s) spanned by `selection`.
///
/// A line whose trimmed text starts with the language's opening delimiter is
/// uncommented; otherwise it is wrapped (`<!-- .. -->`, `/* .. */`, `// ..`).
pub fn toggle_line_comment(text: &str, selection: Selection, language: Language) -> Edit {
    let selection = selection.clamp_to(text);
    let line_start = text[..selection.start].rfind('\n').map_or(0, |at| at + 1);
    let line_end = text[selection.end..]
        .find('\n')
        .map_or(text.len(), |at| selection.end + at);
    let line = &text[line_start..line_end];

    let (open, close) = language.comment_delimiters();
    let replacement = if line.trim_start().starts_with(open) {
        uncomment(line, open, close)
    } else if close.is_empty() {
        format!("{open} {line}")
    } else {
        format!("{open} {line} {close}")
    };

    let mut edited = String::with_capacity(text.len() + open.len() + close.len() + 2);
    edited.push_str(&text[..line_start]);
    edited.push_str(&replacement);
    edited.push_str(&text[line_end..]);

    Edit {
        selection: Selection::new(line_start, line_start + replacement.len()),
        text: edited,
    }
}

fn uncomment(line: &str, open: &str, close: &str) -> String {
    let indent_len = line.len() - line.trim_start().len();
    let (indent, rest) = line.split_at(indent_len);
    let rest = &rest[open.len()..];
    let rest = rest.strip_prefix(' ').unwrap_or(rest);

    let body = if close.is_empty() {
        rest.to_string()
    } else {
        match rest.rfind(close) {
            Some(at) => {
                let (head, tail) = rest.split_at(at);
                let head = head.strip_suffix(' ').unwrap_or(head);
                format!("{head}{}", &tail[close.len()..])
            }
            None => rest.to_string(),
        }
    };
    format!("{indent}{body}")
}

/// Replace the selection with one indent unit and place the caret after it.
pub fn insert_indent(text: &str, selection: Selection) -> Edit {
    const INDENT: &str = "  ";
    let selection = selection.clamp_to(text);

    let mut edited = String::with_capacity(text.len() + INDENT.len());
    edited.push_str(&text[..selection.start]);
    edited.push_str(INDENT);
    edited.push_str(&text[selection.end..]);

    Edit {
        text: edited,
        selection: Selection::caret(selection.start + INDENT.len()),
    }
}

/// A key press with its modifier state and whether an editor had focus.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyCombo {
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub in_editor: bool,
}

impl KeyCombo {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn in_editor(mut self) -> Self {
        self.in_editor = true;
        self
    }

    fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Save,
    Format,
    ToggleComment,
    InsertIndent,
}

impl Shortcut {
    /// Map a key press to a playground shortcut. Unrecognised combinations
    /// return `None` and are left to the browser.
    pub fn resolve(combo: &KeyCombo) -> Option<Self> {
        match combo.key.as_str() {
            "s" if combo.command() => Some(Shortcut::Save),
            "F" if combo.command() && combo.shift => Some(Shortcut::Format),
            "/" if combo.command() => Some(Shortcut::ToggleComment),
            "Tab" if combo.in_editor => Some(Shortcut::InsertIndent),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_current_line_per_language() {
        let text = "a\nb\nc";
        let caret = Selection::caret(2);

        assert_eq!(
            toggle_line_comment(text, caret, Language::Script).text,
            "a\n// b\nc"
        );
        assert_eq!(
            toggle_line_comment(text, caret, Language::Style).text,
            "a\n/* b */\nc"
        );
        assert_eq!(
            toggle_line_comment(text, caret, Language::Markup).text,
            "a\n<!-- b -->\nc"
        );
    }

    #[test]
    fn toggling_twice_restores_the_line() {
        for language in Language::ALL {
            let text = "first\n    indented line\nlast";
            let caret = Selection::caret(10);

            let commented = toggle_line_comment(text, caret, language);
            let restored = toggle_line_comment(&commented.text, commented.selection, language);

            assert_eq!(restored.text, text, "{language}");
        }
    }

    #[test]
    fn uncomments_indented_line() {
        let edit = toggle_line_comment("  // x = 1;", Selection::caret(0), Language::Script);
        assert_eq!(edit.text, "  x = 1;");
    }

    #[test]
    fn selection_is_clamped_to_char_boundaries() {
        let text = "héllo";
        let selection = Selection::new(2, 99).clamp_to(text);
        assert_eq!(selection, Selection::new(1, text.len()));
    }

    #[test]
    fn indent_replaces_selection() {
        let edit = insert_indent("abcdef", Selection::new(2, 4));
        assert_eq!(edit.text, "ab  ef");
        assert_eq!(edit.selection, Selection::caret(4));
    }

    #[test]
    fn resolves_known_shortcuts_only() {
        assert_eq!(
            Shortcut::resolve(&KeyCombo::new("s").ctrl()),
            Some(Shortcut::Save)
        );
        assert_eq!(
            Shortcut::resolve(&KeyCombo::new("F").meta().shift()),
            Some(Shortcut::Format)
        );
        assert_eq!(
            Shortcut::resolve(&KeyCombo::new("/").ctrl()),
            Some(Shortcut::ToggleComment)
        );
        assert_eq!(
            Shortcut::resolve(&KeyCombo::new("Tab").in_editor()),
            Some(Shortcut::InsertIndent)
        );
        assert_eq!(Shortcut::resolve(&KeyCombo::new("s")), None);
        assert_eq!(Shortcut::resolve(&KeyCombo::new("c").ctrl()), None);
        assert_eq!(Shortcut::resolve(&KeyCombo::new("F").ctrl()), None);
    }

    #[test]
    fn tab_outside_an_editor_keeps_focus_navigation() {
        assert_eq!(Shortcut::resolve(&KeyCombo::new("Tab")), None);
        assert_eq!(Shortcut::resolve(&KeyCombo::new("Tab").shift()), None);
    }
}
