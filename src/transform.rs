use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::validate::{DocumentNode, ExpressionShape, TemplateNode, TopLevelStatement};

// ═══════════════════════════════════════════════════════════════════════════════
// NAMED EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

/// `export const name = init` bindings of one document, by name.
#[derive(Debug, Clone, Default)]
pub struct NamedExports {
    initializers: HashMap<String, String>,
}

impl NamedExports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: &DocumentNode) -> Self {
        let mut exports = Self::new();
        for stmt in &doc.statements {
            if let TopLevelStatement::NamedExport(export) = stmt {
                if let Some(init) = &export.init {
                    exports.insert(&export.name, &init.code);
                }
            }
        }
        exports
    }

    pub fn insert(&mut self, name: &str, init: &str) {
        self.initializers.insert(name.to_string(), init.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.initializers.get(name).map(|s| s.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORY NAME TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Display name → export key, in registration order. Re-registering a name
/// replaces its key in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryNameTable {
    entries: Vec<(String, String)>,
}

impl StoryNameTable {
    pub fn register(&mut self, name: &str, key: &str) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = key.to_string(),
            None => self.entries.push((name.to_string(), key.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, key)| key.as_str())
    }

    pub fn to_json(&self) -> String {
        let fields: Vec<String> = self
            .entries
            .iter()
            .map(|(name, key)| format!("{}:{}", json_string(name), json_string(key)))
            .collect();
        format!("{{{}}}", fields.join(","))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTRACTION CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Document-scoped state shared by the extractors. Created per compile.
#[derive(Debug, Clone, Default)]
pub struct ExtractionContext {
    pub counter: usize,
    pub story_name_to_key: StoryNameTable,
    pub named_exports: NamedExports,
    pub file_path: String,
}

impl ExtractionContext {
    pub fn new(named_exports: NamedExports, file_path: &str) -> Self {
        ExtractionContext {
            counter: 0,
            story_name_to_key: StoryNameTable::default(),
            named_exports,
            file_path: file_path.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORY BODY CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref BIND_RE: Regex = Regex::new(r"\.bind\(\s*(?:\{\s*\})?\s*\)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryValueKind {
    EmptyRecord,
    Text,
    BoundFunction,
    FunctionReference,
    ArrowFunction,
    Thunk,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedBody {
    pub kind: StoryValueKind,
    /// Initializer of the story export
    pub value: String,
    /// Unescaped display source
    pub source: String,
}

struct BodyPart {
    story_code: String,
    /// Form used as a child of the synthetic grouping fragment
    child_code: String,
    source_code: String,
    shape: ExpressionShape,
}

fn body_part(node: &TemplateNode, named_exports: &NamedExports) -> BodyPart {
    let (story_code, shape) = match node {
        TemplateNode::Expression(expr) => (expr.code.clone(), expr.shape.clone()),
        other => (other.source(), ExpressionShape::Other),
    };

    let source_code = match &shape {
        ExpressionShape::BindCall { receiver } => named_exports
            .get(receiver)
            .map(|init| init.to_string())
            .unwrap_or_else(|| story_code.clone()),
        _ => story_code.clone(),
    };

    BodyPart {
        story_code,
        child_code: node.source(),
        source_code,
        shape,
    }
}

fn thunk(code: &str) -> String {
    format!("() => (\n  {}\n)", code)
}

/// JSX text as React sees it: lines are trimmed, blank lines dropped, the rest
/// joined with single spaces.
pub fn jsx_text_value(raw: &str) -> String {
    raw.lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decide how a Story's children become its exported value, and what the
/// display source is. Text children only count when nothing else is present.
pub fn classify_story_body(children: &[TemplateNode], named_exports: &NamedExports) -> ClassifiedBody {
    let body_nodes: Vec<&TemplateNode> = children
        .iter()
        .filter(|child| !matches!(child, TemplateNode::Text(_)))
        .collect();

    if body_nodes.is_empty() {
        let text: String = children
            .iter()
            .filter_map(|child| match child {
                TemplateNode::Text(text) => Some(jsx_text_value(&text.value)),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ");

        if text.is_empty() {
            return ClassifiedBody {
                kind: StoryValueKind::EmptyRecord,
                value: "{}".to_string(),
                source: "{}".to_string(),
            };
        }

        let literal = json_string(&text);
        return ClassifiedBody {
            kind: StoryValueKind::Text,
            value: thunk(&literal),
            source: literal,
        };
    }

    let parts: Vec<BodyPart> = body_nodes
        .iter()
        .map(|node| body_part(node, named_exports))
        .collect();
    let source = parts
        .iter()
        .map(|part| part.source_code.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if parts.len() > 1 {
        let grouped = parts
            .iter()
            .map(|part| part.child_code.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        return ClassifiedBody {
            kind: StoryValueKind::Thunk,
            value: thunk(&format!("<>\n{}\n</>", grouped)),
            source,
        };
    }

    let part = &parts[0];
    let (kind, value) = if BIND_RE.is_match(&part.story_code) {
        (StoryValueKind::BoundFunction, part.story_code.clone())
    } else if part.shape == ExpressionShape::Identifier {
        (
            StoryValueKind::FunctionReference,
            format!("assertIsFn({})", part.story_code),
        )
    } else if part.shape == ExpressionShape::ArrowFunction {
        (StoryValueKind::ArrowFunction, format!("({})", part.story_code))
    } else {
        (StoryValueKind::Thunk, thunk(&part.story_code))
    };

    ClassifiedBody {
        kind,
        value,
        source,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRING LITERALS
// ═══════════════════════════════════════════════════════════════════════════════

/// Escape text for a quoted JavaScript string literal (either quote style).
pub fn escape_js_string(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' | '\'' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `'…'` literal holding `s`.
pub fn single_quoted(s: &str) -> String {
    format!("'{}'", escape_js_string(s))
}

/// `"…"` literal holding `s`.
pub fn json_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", escape_js_string(s)))
}

/// Percent-encode like JavaScript's `encodeURI`.
pub fn encode_uri(s: &str) -> String {
    const KEEP: &[u8] = b";,/?:@&=+$-_.!~*'()#";
    let mut encoded = String::with_capacity(s.len());
    for byte in s.bytes() {
        if byte.is_ascii_alphanumeric() || KEEP.contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
