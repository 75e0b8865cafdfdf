//! Highlight patterns for query results.

use super::translate::{escape_literal, translate, Dialect, VERY_NOMAGIC};

/// Flags of the query a highlight pattern is built for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighlightOptions {
    /// The pattern is plain text.
    pub literal: bool,
    pub ignore_case: bool,
    /// A grep query; `.` keeps its regex meaning.
    pub grep: bool,
}

/// Build the Vim pattern that highlights matches of a query pattern.
///
/// One pair of surrounding `"` or `'` quotes is stripped. Outside grep mode
/// every `.` becomes `\w`, so `foo.bar` highlights identifiers rather than
/// arbitrary text.
pub fn highlight_pattern(pattern: &str, options: HighlightOptions) -> String {
    let case = if options.ignore_case { r"\c" } else { r"\C" };
    let double_quoted = is_quoted(pattern, '"');
    let body = if double_quoted || is_quoted(pattern, '\'') {
        &pattern[1..pattern.len() - 1]
    } else {
        pattern
    };

    if options.literal {
        let escaped = if double_quoted {
            escape_keeping_quote_escapes(body)
        } else {
            escape_literal(body)
        };
        return format!("{}{}{}", VERY_NOMAGIC, case, escaped);
    }

    let translated = translate(&format!("{}{}", case, body), Dialect::Pcre);
    if options.grep {
        translated
    } else {
        translated.replace('.', r"\w")
    }
}

fn is_quoted(pattern: &str, quote: char) -> bool {
    pattern.len() > 1 && pattern.starts_with(quote) && pattern.ends_with(quote)
}

/// Double every backslash except one escaping a `"`.
fn escape_keeping_quote_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c == '\\' && chars.peek() != Some(&'"') {
            out.push('\\');
        }
    }
    out
}

/// Highlight patterns accumulated by a session.
///
/// A new query replaces the list unless it is an append query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightSet {
    patterns: Vec<String>,
}

impl HighlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pattern: String, append: bool) {
        if !append {
            self.patterns.clear();
        }
        self.patterns.push(pattern);
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
    }
}
