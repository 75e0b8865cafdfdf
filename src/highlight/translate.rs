//! PCRE to Vim regex translation.
//!
//! The external search tool matches with PCRE-style patterns, while result
//! highlighting is done by Vim's regex engine. [`translate`] rewrites the
//! pattern through an ordered table of rules and prefixes the result with
//! Vim's very-magic marker `\v`. Later rules rely on earlier ones, so the
//! order of [`RULES`] is part of the contract.
//!
//! The output only drives highlighting; results are filtered by the search
//! tool using the original pattern.

use regex::Regex;
use std::sync::LazyLock;

/// Vim "very magic" marker: every ASCII punctuation character is an operator.
pub const VERY_MAGIC: &str = r"\v";

/// Vim "very nomagic" marker: only `\` is special.
pub const VERY_NOMAGIC: &str = r"\V";

/// Source grammar of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// Plain text, matched verbatim.
    Literal,
    /// PCRE-like syntax as accepted by the search tool.
    #[default]
    Pcre,
    /// PCRE plus Perl extensions: possessive quantifiers, inline comments,
    /// lookaround and atomic groups.
    PerlExtended,
}

/// One step of the pipeline.
pub struct Rule {
    pub name: &'static str,
    /// Only applied for [`Dialect::PerlExtended`].
    pub perl_only: bool,
    pub apply: fn(&str) -> String,
}

/// The pipeline, in application order.
pub const RULES: &[Rule] = &[
    Rule {
        name: "escape-vim-specials",
        perl_only: false,
        apply: escape_vim_specials,
    },
    Rule {
        name: "non-greedy-quantifiers",
        perl_only: false,
        apply: non_greedy_quantifiers,
    },
    Rule {
        name: "perl-extensions",
        perl_only: true,
        apply: perl_extensions,
    },
    Rule {
        name: "anchors",
        perl_only: false,
        apply: anchors,
    },
    Rule {
        name: "word-boundary",
        perl_only: false,
        apply: word_boundary,
    },
    Rule {
        name: "case-toggles",
        perl_only: false,
        apply: case_toggles,
    },
    Rule {
        name: "named-groups",
        perl_only: false,
        apply: named_groups,
    },
    Rule {
        name: "non-capturing-groups",
        perl_only: false,
        apply: non_capturing_groups,
    },
    Rule {
        name: "character-escapes",
        perl_only: false,
        apply: character_escapes,
    },
    Rule {
        name: "posix-classes",
        perl_only: false,
        apply: posix_classes,
    },
];

/// Translate `pattern` from `dialect` into a Vim pattern.
///
/// Pure: the same input always yields the same output.
pub fn translate(pattern: &str, dialect: Dialect) -> String {
    if dialect == Dialect::Literal {
        return format!("{}{}", VERY_NOMAGIC, escape_literal(pattern));
    }

    let perl = dialect == Dialect::PerlExtended;
    let translated = RULES
        .iter()
        .filter(|rule| perl || !rule.perl_only)
        .fold(pattern.to_string(), |acc, rule| (rule.apply)(&acc));
    format!("{}{}", VERY_MAGIC, translated)
}

/// Escape text for use after [`VERY_NOMAGIC`].
pub fn escape_literal(text: &str) -> String {
    text.replace('\\', r"\\")
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("translation rule regex must compile")
}

/// Replace matches of `re` that are not preceded by a backslash.
///
/// `replacement` may reference capture groups as `${1}`. A match rejected
/// for being escaped is retried one character further on, the same as a
/// negative lookbehind would behave.
fn replace_unescaped(haystack: &str, re: &Regex, replacement: &str) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut copied = 0;
    let mut start = 0;

    while start <= haystack.len() {
        let Some(caps) = re.captures_at(haystack, start) else {
            break;
        };
        let Some(m) = caps.get(0) else {
            break;
        };
        let next = next_char(haystack, m.start());

        if haystack[..m.start()].ends_with('\\') {
            start = next;
            continue;
        }

        out.push_str(&haystack[copied..m.start()]);
        caps.expand(replacement, &mut out);
        copied = m.end();
        start = if m.is_empty() { next } else { m.end() };
    }

    out.push_str(&haystack[copied..]);
    out
}

fn next_char(haystack: &str, at: usize) -> usize {
    at + haystack[at..].chars().next().map_or(1, char::len_utf8)
}

/// `%`, `@` and `&` are operators in very-magic mode: `50%` becomes `50\%`.
fn escape_vim_specials(pattern: &str) -> String {
    static SPECIALS: LazyLock<Regex> = LazyLock::new(|| compile(r"[%@&]"));
    SPECIALS.replace_all(pattern, r"\$0").into_owned()
}

/// `*?` → `{-}`, `+?` → `{-1,}`, `??` → `{-0,1}`, `{m,n}?` → `{-m,n}`.
fn non_greedy_quantifiers(pattern: &str) -> String {
    static STAR: LazyLock<Regex> = LazyLock::new(|| compile(r"\*\?"));
    static PLUS: LazyLock<Regex> = LazyLock::new(|| compile(r"\+\?"));
    static OPTIONAL: LazyLock<Regex> = LazyLock::new(|| compile(r"\?\?"));
    static BOUNDED: LazyLock<Regex> = LazyLock::new(|| compile(r"\{(.*?)\}\?"));

    let pattern = replace_unescaped(pattern, &STAR, "{-}");
    let pattern = replace_unescaped(&pattern, &PLUS, "{-1,}");
    let pattern = replace_unescaped(&pattern, &OPTIONAL, "{-0,1}");
    replace_unescaped(&pattern, &BOUNDED, "{-${1}}")
}

/// Perl-only constructs.
///
/// - possessive `*+` `++` `?+` `{m,n}+` → plain quantifier
/// - `(?#comment)` → removed
/// - `(?=x)` → `(x)@=`, `(?!x)` → `(x)@!`
/// - `(?<=x)` → `(x)@<=`, `(?<!x)` → `(x)@<!`
/// - `(?>x)` → `(x)@>`
fn perl_extensions(pattern: &str) -> String {
    static POSSESSIVE: LazyLock<Regex> = LazyLock::new(|| compile(r"([*+?}])\+"));
    static COMMENT: LazyLock<Regex> = LazyLock::new(|| compile(r"\(\?#.*?\)"));
    static LOOKAROUND: LazyLock<[(Regex, &'static str); 5]> = LazyLock::new(|| {
        [
            (compile(r"\(\?=(.+?)\)"), "(${1})@="),
            (compile(r"\(\?!(.+?)\)"), "(${1})@!"),
            (compile(r"\(\?<=(.+?)\)"), "(${1})@<="),
            (compile(r"\(\?<!(.+?)\)"), "(${1})@<!"),
            (compile(r"\(\?>(.+?)\)"), "(${1})@>"),
        ]
    });

    let pattern = replace_unescaped(pattern, &POSSESSIVE, "${1}");
    let mut pattern = COMMENT.replace_all(&pattern, "").into_owned();
    for (re, replacement) in LOOKAROUND.iter() {
        pattern = re.replace_all(&pattern, *replacement).into_owned();
    }
    pattern
}

/// `\A` → `^` and `\z` → `$` (line anchors stand in for buffer anchors);
/// `\B` has no Vim counterpart and is dropped.
fn anchors(pattern: &str) -> String {
    pattern
        .replace(r"\A", "^")
        .replace(r"\z", "$")
        .replace(r"\B", "")
}

/// `\b` → `(<|>)`: start or end of a keyword.
fn word_boundary(pattern: &str) -> String {
    pattern.replace(r"\b", "(<|>)")
}

/// `(?i)` → `\c`, `(?-i)` → `\C`.
fn case_toggles(pattern: &str) -> String {
    pattern.replace("(?i)", r"\c").replace("(?-i)", r"\C")
}

/// `(?P<name>x)` and `(?<name>x)` → `(x)`; the name is dropped.
fn named_groups(pattern: &str) -> String {
    static NAMED: LazyLock<Regex> = LazyLock::new(|| compile(r"\(\?P?<\w+>"));
    NAMED.replace_all(pattern, "(").into_owned()
}

/// `(?:x)` → `%(x)`.
fn non_capturing_groups(pattern: &str) -> String {
    static NON_CAPTURING: LazyLock<Regex> = LazyLock::new(|| compile(r"\(\?:(.+?)\)"));
    NON_CAPTURING.replace_all(pattern, "%(${1})").into_owned()
}

/// Control and code point escapes to Vim's `%x` / `%u` / `%U` forms.
///
/// `\a` `\f` `\v` → `%x07` `%x0C` `%x0B`; `\x7F` → `%x7F`;
/// `\x{1F600}` and `\u{7F}` → `%U1F600` / `%U7F`; `\u` / `\U` → `%u` / `%U`.
fn character_escapes(pattern: &str) -> String {
    static HEX_BRACED: LazyLock<Regex> =
        LazyLock::new(|| compile(r"\\[xuU]\{([0-9A-Fa-f]{1,8})\}"));
    static HEX_BYTE: LazyLock<Regex> = LazyLock::new(|| compile(r"\\(x[0-9A-Fa-f]{2})"));
    static UNICODE: LazyLock<Regex> = LazyLock::new(|| compile(r"\\([uU])"));

    let pattern = pattern
        .replace(r"\a", "%x07")
        .replace(r"\f", "%x0C")
        .replace(r"\v", "%x0B");
    let pattern = HEX_BRACED.replace_all(&pattern, "%U${1}");
    let pattern = HEX_BYTE.replace_all(&pattern, "%${1}");
    UNICODE.replace_all(&pattern, "%${1}").into_owned()
}

/// Named POSIX classes Vim lacks, expanded to explicit ranges.
const POSIX_CLASSES: &[(&str, &str)] = &[
    ("[[:ascii:]]", r"[\x00-\x7F]"),
    ("[[:word:]]", "[0-9A-Za-z_]"),
    ("[[:^alnum:]]", "[^0-9A-Za-z]"),
    ("[[:^alpha:]]", "[^A-Za-z]"),
    ("[[:^ascii:]]", r"[^\x00-\x7F]"),
    ("[[:^blank:]]", "[^\\t ]"),
    ("[[:^cntrl:]]", r"[^\x00-\x1F\x7F]"),
    ("[[:^digit:]]", "[^0-9]"),
    ("[[:^graph:]]", "[^!-~]"),
    ("[[:^lower:]]", "[^a-z]"),
    ("[[:^print:]]", "[^ -~]"),
    ("[[:^punct:]]", r"[^!-/:-@\[-`{-~]"),
    ("[[:^space:]]", r"[^\t\n\r ]"),
    ("[[:^upper:]]", "[^A-Z]"),
    ("[[:^word:]]", "[^0-9A-Za-z_]"),
    ("[[:^xdigit:]]", "[^0-9A-Fa-f]"),
];

fn posix_classes(pattern: &str) -> String {
    POSIX_CLASSES
        .iter()
        .fold(pattern.to_string(), |acc, (from, to)| acc.replace(from, to))
}
