//! Property tests for identifier derivation and source-literal escaping.

use proptest::prelude::*;

use crate::parse::classify_expression;
use crate::sanitize::{is_valid_identifier, sanitize_name, story_key};
use crate::transform::{escape_js_string, single_quoted};
use crate::validate::ExpressionShape;

/// Inverse of `escape_js_string`.
fn unescape(escaped: &str) -> String {
    let mut out = String::new();
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                if let Some(decoded) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(decoded);
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

proptest! {
    #[test]
    fn sanitize_is_idempotent(label in "[a-zA-Z0-9 _./ßéÉ-]{0,24}") {
        let once = sanitize_name(&label);
        prop_assert_eq!(sanitize_name(&once), once);
    }

    #[test]
    fn worded_names_give_valid_identifiers(name in "[a-zA-Z][a-zA-Z /_,.!?-]{0,24}") {
        let key = story_key(Some(&name), 0);
        prop_assert!(is_valid_identifier(&key), "{:?} -> {:?}", name, key);
    }

    #[test]
    fn escaping_round_trips(text in any::<String>()) {
        let escaped = escape_js_string(&text);
        prop_assert!(!escaped.contains('\n'));
        prop_assert!(!escaped.contains('\r'));
        prop_assert_eq!(unescape(&escaped), text);
    }

    #[test]
    fn snapshot_literal_parses_back(text in "[a-zA-Z0-9 '\"\\\\\n\r{}<>/()=.]{0,40}") {
        let literal = single_quoted(&text);
        prop_assert_eq!(
            classify_expression(&literal).unwrap(),
            ExpressionShape::StringLiteral { value: text }
        );
    }
}
