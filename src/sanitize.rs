//! Export identifier derivation.
//!
//! Human-readable story names become camelCase identifiers. A leading digit gets
//! an underscore prefix; a reserved word gets a `Story` suffix. Anonymous stories
//! fall back to `story<N>` using the document counter.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RESERVED_RE: Regex = Regex::new(
        r"^(?:do|if|in|for|let|new|try|var|case|else|enum|eval|false|null|this|true|void|with|await|break|catch|class|const|super|throw|while|yield|delete|export|import|public|return|static|switch|typeof|default|extends|finally|package|private|continue|debugger|function|arguments|interface|protected|implements|instanceof)$"
    )
    .unwrap();
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[\p{L}_$][\p{L}\p{N}_$]*$").unwrap();
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_RE.is_match(name)
}

/// Identifier syntax only; reserved words pass.
pub fn is_identifier_name(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// True if `name` can be used as a binding name in generated code.
pub fn is_valid_identifier(name: &str) -> bool {
    is_identifier_name(name) && !is_reserved(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Upper,
    Lower,
    Digit,
    Break,
}

fn classify(c: char) -> CharClass {
    if c.is_ascii_digit() {
        CharClass::Digit
    } else if c.is_uppercase() {
        CharClass::Upper
    } else if c.is_alphabetic() {
        CharClass::Lower
    } else {
        CharClass::Break
    }
}

fn is_ordinal_suffix(chars: &[char], at: usize) -> bool {
    let suffix: String = chars.iter().skip(at).take(2).collect();
    if !matches!(suffix.as_str(), "st" | "nd" | "rd" | "th") {
        return false;
    }
    chars
        .get(at + 2)
        .map(|c| classify(*c) != CharClass::Lower)
        .unwrap_or(true)
}

/// Split a label into words: punctuation and whitespace separate words, case
/// changes start a new word (`fooBar`, `XMLHttp`), digit runs are words of their
/// own except for ordinals like `1st`.
pub fn split_words(input: &str) -> Vec<String> {
    let chars: Vec<char> = input
        .chars()
        .filter(|c| *c != '\'' && *c != '\u{2019}')
        .collect();
    let mut words = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match classify(chars[i]) {
            CharClass::Break => {
                i += 1;
            }
            CharClass::Digit => {
                let start = i;
                while i < chars.len() && classify(chars[i]) == CharClass::Digit {
                    i += 1;
                }
                if is_ordinal_suffix(&chars, i) {
                    i += 2;
                }
                words.push(chars[start..i].iter().collect());
            }
            CharClass::Upper => {
                let start = i;
                while i < chars.len() && classify(chars[i]) == CharClass::Upper {
                    i += 1;
                }
                let upper_run = i - start;
                if i < chars.len() && classify(chars[i]) == CharClass::Lower {
                    // `XMLHttp`: the last capital starts the next word
                    if upper_run > 1 {
                        words.push(chars[start..i - 1].iter().collect());
                    }
                    let word_start = i - 1;
                    while i < chars.len() && classify(chars[i]) == CharClass::Lower {
                        i += 1;
                    }
                    words.push(chars[word_start..i].iter().collect());
                } else {
                    words.push(chars[start..i].iter().collect());
                }
            }
            CharClass::Lower => {
                let start = i;
                while i < chars.len() && classify(chars[i]) == CharClass::Lower {
                    i += 1;
                }
                words.push(chars[start..i].iter().collect());
            }
        }
    }

    words
}

/// Case-mapped `c`, or `c` itself when the mapping is not a single character
/// (`ß` uppercases to `SS`). Keeps sanitizing idempotent.
fn recase(c: char, mut mapped: impl Iterator<Item = char>) -> char {
    match (mapped.next(), mapped.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}

fn lowercase(word: &str) -> String {
    word.chars().map(|c| recase(c, c.to_lowercase())).collect()
}

fn capitalize(word: &str) -> String {
    let lower = lowercase(word);
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => std::iter::once(recase(first, first.to_uppercase()))
            .chain(chars)
            .collect(),
        None => String::new(),
    }
}

pub fn camel_case(input: &str) -> String {
    split_words(input)
        .iter()
        .enumerate()
        .map(|(index, word)| {
            if index == 0 {
                lowercase(word)
            } else {
                capitalize(word)
            }
        })
        .collect()
}

pub fn sanitize_name(name: &str) -> String {
    let key = camel_case(name);
    if key.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{}", key)
    } else if is_reserved(&key) {
        format!("{}Story", key)
    } else {
        key
    }
}

/// Export key for a story. Missing names, and names with no word characters at
/// all, use the document counter.
pub fn story_key(name: Option<&str>, counter: usize) -> String {
    match name.map(sanitize_name) {
        Some(key) if !key.is_empty() => key,
        _ => format!("story{}", counter),
    }
}
