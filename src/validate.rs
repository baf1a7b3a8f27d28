#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_DUPLICATE_CONTENTS: &str = "MDX-ERR-DUPLICATE-CONTENTS";
pub const ERR_DUPLICATE_META: &str = "MDX-ERR-DUPLICATE-META";
pub const ERR_UNEXPECTED_CHILD: &str = "MDX-ERR-UNEXPECTED-CHILD";
pub const ERR_STORY_ADDRESS: &str = "MDX-ERR-STORY-ADDRESS";
pub const ERR_PARSE: &str = "MDX-ERR-PARSE";
pub const ERR_IO: &str = "MDX-ERR-IO";

pub const STRUCTURAL_VIOLATION: &str = "STRUCTURAL_VIOLATION";
pub const COLLABORATOR_FAILURE: &str = "COLLABORATOR_FAILURE";
pub const IO_FAILURE: &str = "IO_FAILURE";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_DUPLICATE_CONTENTS => "A document has exactly one contents fragment.",
        ERR_DUPLICATE_META => "A document declares at most one Meta.",
        ERR_UNEXPECTED_CHILD => {
            "Top-level document children are tags, text or embedded expressions."
        }
        ERR_STORY_ADDRESS => "Every Story is addressable by name, id or story reference.",
        ERR_PARSE => "Every expression in a document parses as JavaScript with JSX.",
        ERR_IO => "Every discovered document is readable.",
        _ => "Unknown invariant.",
    }
}

fn get_error_type(code: &str) -> &'static str {
    match code {
        ERR_PARSE => COLLABORATOR_FAILURE,
        ERR_IO => IO_FAILURE,
        _ => STRUCTURAL_VIOLATION,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Fatal error for one document compile. No partial output survives it.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message}")]
pub struct CompilerError {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, file, line, column, None, vec![])
    }

    pub fn at(code: &str, message: &str, file: &str, location: &SourceLocation) -> Self {
        Self::new(code, message, file, location.line, location.column)
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            error_type: get_error_type(code).to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            context,
            hints,
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.hints.push(hint.to_string());
        self
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IR TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// Root of one compiled document, in source order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DocumentNode {
    pub statements: Vec<TopLevelStatement>,
}

impl DocumentNode {
    /// All contents fragments, in order. A valid document has at most one.
    pub fn contents(&self) -> impl Iterator<Item = &FragmentNode> {
        self.statements.iter().filter_map(|stmt| match stmt {
            TopLevelStatement::Contents(fragment) => Some(fragment),
            _ => None,
        })
    }

    /// ESM and other non-contents statements, verbatim.
    pub fn module_statements(&self) -> impl Iterator<Item = &str> {
        self.statements.iter().filter_map(|stmt| match stmt {
            TopLevelStatement::Contents(_) => None,
            TopLevelStatement::NamedExport(export) => Some(export.code.as_str()),
            TopLevelStatement::Other(code) => Some(code.as_str()),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TopLevelStatement {
    /// `<>…</>;` holding the human-visible document body
    Contents(FragmentNode),
    /// `export const name = init;` with a single plain-identifier declarator
    NamedExport(NamedExportIR),
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedExportIR {
    pub name: String,
    pub init: Option<ExpressionIR>,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentNode {
    pub children: Vec<TemplateNode>,
    pub source: String,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Tag(TagNode),
    Text(TextNode),
    Expression(ExpressionIR),
    Fragment(FragmentNode),
    Spread(ExpressionIR),
}

impl TemplateNode {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TemplateNode::Tag(_) => "JSXElement",
            TemplateNode::Text(_) => "JSXText",
            TemplateNode::Expression(_) => "JSXExpressionContainer",
            TemplateNode::Fragment(_) => "JSXFragment",
            TemplateNode::Spread(_) => "JSXSpreadChild",
        }
    }

    /// Source text of the node as it appears in the module.
    pub fn source(&self) -> String {
        match self {
            TemplateNode::Tag(tag) => tag.source.clone(),
            TemplateNode::Text(text) => text.value.clone(),
            TemplateNode::Expression(expr) => format!("{{{}}}", expr.code),
            TemplateNode::Fragment(fragment) => fragment.source.clone(),
            TemplateNode::Spread(expr) => format!("{{...{}}}", expr.code),
        }
    }

    pub fn is_blank_text(&self) -> bool {
        matches!(self, TemplateNode::Text(text) if text.value.trim().is_empty())
    }
}

/// Tag vocabulary recognized by the extractors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TagKind {
    Meta,
    Story,
    Canvas,
    Preview,
    Other,
}

impl TagKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "Meta" => TagKind::Meta,
            "Story" => TagKind::Story,
            "Canvas" => TagKind::Canvas,
            "Preview" => TagKind::Preview,
            _ => TagKind::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagNode {
    /// Byte offset of the tag in its module; stable identity for patches.
    pub id: u32,
    pub kind: TagKind,
    pub name: String,
    pub attributes: Vec<AttributeIR>,
    pub children: Vec<TemplateNode>,
    pub self_closing: bool,
    pub source: String,
    #[serde(default)]
    pub location: SourceLocation,
}

impl TagNode {
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| &attr.value)
    }

    /// Non-empty string literal value of an attribute.
    pub fn literal(&self, name: &str) -> Option<&str> {
        match self.attribute(name) {
            Some(AttributeValue::Static(value)) if !value.is_empty() => Some(value.as_str()),
            _ => None,
        }
    }

    /// Expression container value of an attribute.
    pub fn expression(&self, name: &str) -> Option<&ExpressionIR> {
        match self.attribute(name) {
            Some(AttributeValue::Dynamic(expr)) => Some(expr),
            _ => None,
        }
    }

    /// True if this tag, or any tag below it, is a Story.
    pub fn has_story(&self) -> bool {
        self.kind == TagKind::Story || contains_story(&self.children)
    }
}

pub fn contains_story(nodes: &[TemplateNode]) -> bool {
    nodes.iter().any(|node| match node {
        TemplateNode::Tag(tag) => tag.has_story(),
        TemplateNode::Fragment(fragment) => contains_story(&fragment.children),
        _ => false,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeIR {
    pub name: String,
    pub value: AttributeValue,
    /// Attribute text as written, used when re-printing the tag.
    pub source: String,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum AttributeValue {
    Static(String),
    Dynamic(ExpressionIR),
    /// `attr={}` or `attr={/* comment */}`
    EmptyExpression,
    /// `attr=<Element />`
    Markup(String),
    /// `attr` without a value
    Implicit,
    /// `{...expr}`; the attribute name is empty
    Spread(ExpressionIR),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub value: String,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionIR {
    pub code: String,
    pub shape: ExpressionShape,
    #[serde(default)]
    pub location: SourceLocation,
}

/// Structural shape of an expression, as far as story classification cares.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExpressionShape {
    Identifier,
    ArrowFunction,
    /// `receiver.bind()` or `receiver.bind({})`
    BindCall { receiver: String },
    StringLiteral { value: String },
    /// `object.property` or `object['property']`
    Member { property: String },
    Other,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(kind: TagKind, children: Vec<TemplateNode>) -> TemplateNode {
        TemplateNode::Tag(TagNode {
            id: 0,
            kind,
            name: format!("{:?}", kind),
            attributes: vec![],
            children,
            self_closing: false,
            source: String::new(),
            location: SourceLocation::default(),
        })
    }

    #[test]
    fn test_error_type_follows_code() {
        let err = CompilerError::new(ERR_DUPLICATE_META, "Meta can only be declared once", "a.mdx", 3, 1);
        assert_eq!(err.error_type, STRUCTURAL_VIOLATION);
        assert_eq!(err.to_string(), "[MDX-ERR-DUPLICATE-META] Meta can only be declared once");

        let err = CompilerError::new(ERR_PARSE, "Unexpected token", "a.mdx", 1, 1);
        assert_eq!(err.error_type, COLLABORATOR_FAILURE);
        assert!(err.guarantee.contains("parses"));
    }

    #[test]
    fn test_tag_kind_from_name() {
        assert_eq!(TagKind::from_name("Story"), TagKind::Story);
        assert_eq!(TagKind::from_name("Preview"), TagKind::Preview);
        assert_eq!(TagKind::from_name("story"), TagKind::Other);
        assert_eq!(TagKind::from_name("Button"), TagKind::Other);
    }

    #[test]
    fn test_nested_story_detection() {
        let nested = tag(
            TagKind::Other,
            vec![TemplateNode::Fragment(FragmentNode {
                children: vec![tag(TagKind::Story, vec![])],
                source: String::new(),
                location: SourceLocation::default(),
            })],
        );
        assert!(contains_story(&[nested]));
        assert!(!contains_story(&[tag(TagKind::Other, vec![])]));
    }

    #[test]
    fn test_empty_literal_is_absent() {
        let node = TagNode {
            id: 0,
            kind: TagKind::Story,
            name: "Story".to_string(),
            attributes: vec![AttributeIR {
                name: "name".to_string(),
                value: AttributeValue::Static(String::new()),
                source: "name=\"\"".to_string(),
                location: SourceLocation::default(),
            }],
            children: vec![],
            self_closing: true,
            source: "<Story name=\"\" />".to_string(),
            location: SourceLocation::default(),
        };
        assert!(node.attribute("name").is_some());
        assert_eq!(node.literal("name"), None);
    }
}
