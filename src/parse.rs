//! Parse Module for the MDX story compiler
//!
//! Parses a JSX module (ESM statements plus one `<>…</>` contents fragment) with
//! oxc and lowers the AST into the owned document IR in `validate.rs`.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};

use crate::validate::{
    AttributeIR, AttributeValue, CompilerError, DocumentNode, ExpressionIR, ExpressionShape,
    FragmentNode, NamedExportIR, SourceLocation, TagKind, TagNode, TemplateNode, TextNode,
    TopLevelStatement, ERR_PARSE,
};

// ═══════════════════════════════════════════════════════════════════════════════
// SOURCE LOCATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Offset → line/column lookup for one module, with an optional map from module
/// lines back to the lines of the document it was lowered from.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    line_map: Option<Vec<u32>>,
}

impl LineIndex {
    pub fn new(source: &str, line_map: Option<&[u32]>) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineIndex {
            line_starts,
            line_map: line_map.map(|m| m.to_vec()),
        }
    }

    pub fn location(&self, offset: u32) -> SourceLocation {
        let offset = offset as usize;
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let column = offset - self.line_starts[line] + 1;
        let line = match &self.line_map {
            Some(map) => map.get(line).copied().unwrap_or(line as u32 + 1),
            None => line as u32 + 1,
        };
        SourceLocation {
            line,
            column: column as u32,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

struct Lowerer<'s> {
    source: &'s str,
    lines: LineIndex,
}

impl<'s> Lowerer<'s> {
    fn slice(&self, span: Span) -> String {
        self.source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default()
            .to_string()
    }

    fn loc(&self, span: Span) -> SourceLocation {
        self.lines.location(span.start)
    }

    fn lower_statement(&self, stmt: &Statement) -> TopLevelStatement {
        match stmt {
            Statement::ExpressionStatement(expr_stmt) => {
                if let Expression::JSXFragment(fragment) = &expr_stmt.expression {
                    return TopLevelStatement::Contents(self.lower_fragment(fragment));
                }
            }
            Statement::ExportNamedDeclaration(export) => {
                if let Some(Declaration::VariableDeclaration(var_decl)) = &export.declaration {
                    if var_decl.declarations.len() == 1 {
                        let declarator = &var_decl.declarations[0];
                        if let BindingPattern::BindingIdentifier(id) = &declarator.id {
                            return TopLevelStatement::NamedExport(NamedExportIR {
                                name: id.name.to_string(),
                                init: declarator.init.as_ref().map(|init| self.lower_expression(init)),
                                code: self.slice(stmt.span()),
                            });
                        }
                    }
                }
            }
            _ => {}
        }
        TopLevelStatement::Other(self.slice(stmt.span()))
    }

    fn lower_fragment(&self, fragment: &JSXFragment) -> FragmentNode {
        FragmentNode {
            children: self.lower_children(&fragment.children),
            source: self.slice(fragment.span),
            location: self.loc(fragment.span),
        }
    }

    fn lower_children(&self, children: &[JSXChild]) -> Vec<TemplateNode> {
        children
            .iter()
            .filter_map(|child| self.lower_child(child))
            .collect()
    }

    fn lower_child(&self, child: &JSXChild) -> Option<TemplateNode> {
        match child {
            JSXChild::Text(text) => Some(TemplateNode::Text(TextNode {
                value: text.value.to_string(),
                location: self.loc(text.span),
            })),
            JSXChild::Element(element) => Some(TemplateNode::Tag(self.lower_element(element))),
            JSXChild::Fragment(fragment) => {
                Some(TemplateNode::Fragment(self.lower_fragment(fragment)))
            }
            // `{}` and `{/* comment */}` carry nothing
            JSXChild::ExpressionContainer(container) => container
                .expression
                .as_expression()
                .map(|expr| TemplateNode::Expression(self.lower_expression(expr))),
            JSXChild::Spread(spread) => {
                Some(TemplateNode::Spread(self.lower_expression(&spread.expression)))
            }
        }
    }

    fn element_name(&self, name: &JSXElementName) -> String {
        match name {
            JSXElementName::Identifier(id) => id.name.to_string(),
            JSXElementName::IdentifierReference(id) => id.name.to_string(),
            other => self.slice(other.span()),
        }
    }

    fn lower_element(&self, element: &JSXElement) -> TagNode {
        let opening = &element.opening_element;
        let name = self.element_name(&opening.name);
        let attributes = opening
            .attributes
            .iter()
            .map(|item| self.lower_attribute(item))
            .collect();

        TagNode {
            id: element.span.start,
            kind: TagKind::from_name(&name),
            name,
            attributes,
            children: self.lower_children(&element.children),
            self_closing: element.closing_element.is_none(),
            source: self.slice(element.span),
            location: self.loc(element.span),
        }
    }

    fn lower_attribute(&self, item: &JSXAttributeItem) -> AttributeIR {
        match item {
            JSXAttributeItem::Attribute(attr) => {
                let name = match &attr.name {
                    JSXAttributeName::Identifier(id) => id.name.to_string(),
                    other => self.slice(other.span()),
                };
                let value = match &attr.value {
                    None => AttributeValue::Implicit,
                    Some(JSXAttributeValue::StringLiteral(lit)) => {
                        AttributeValue::Static(lit.value.to_string())
                    }
                    Some(JSXAttributeValue::ExpressionContainer(container)) => {
                        match container.expression.as_expression() {
                            Some(expr) => AttributeValue::Dynamic(self.lower_expression(expr)),
                            None => AttributeValue::EmptyExpression,
                        }
                    }
                    Some(other) => AttributeValue::Markup(self.slice(other.span())),
                };
                AttributeIR {
                    name,
                    value,
                    source: self.slice(attr.span),
                    location: self.loc(attr.span),
                }
            }
            JSXAttributeItem::SpreadAttribute(spread) => AttributeIR {
                name: String::new(),
                value: AttributeValue::Spread(self.lower_expression(&spread.argument)),
                source: self.slice(spread.span),
                location: self.loc(spread.span),
            },
        }
    }

    fn lower_expression(&self, expr: &Expression) -> ExpressionIR {
        ExpressionIR {
            code: self.slice(expr.span()),
            shape: expression_shape(expr),
            location: self.loc(expr.span()),
        }
    }
}

/// Classify an expression for story-body handling. Parentheses are transparent.
pub fn expression_shape(expr: &Expression) -> ExpressionShape {
    match expr {
        Expression::ParenthesizedExpression(paren) => expression_shape(&paren.expression),
        Expression::Identifier(_) => ExpressionShape::Identifier,
        Expression::ArrowFunctionExpression(_) => ExpressionShape::ArrowFunction,
        Expression::StringLiteral(lit) => ExpressionShape::StringLiteral {
            value: lit.value.to_string(),
        },
        Expression::StaticMemberExpression(member) => ExpressionShape::Member {
            property: member.property.name.to_string(),
        },
        Expression::ComputedMemberExpression(member) => match &member.expression {
            Expression::StringLiteral(lit) => ExpressionShape::Member {
                property: lit.value.to_string(),
            },
            _ => ExpressionShape::Other,
        },
        Expression::CallExpression(call) => match bind_receiver(call) {
            Some(receiver) => ExpressionShape::BindCall { receiver },
            None => ExpressionShape::Other,
        },
        _ => ExpressionShape::Other,
    }
}

/// `receiver.bind()` / `receiver.bind({})` → `receiver`
fn bind_receiver(call: &CallExpression) -> Option<String> {
    let Expression::StaticMemberExpression(member) = &call.callee else {
        return None;
    };
    let Expression::Identifier(object) = &member.object else {
        return None;
    };
    if member.property.name != "bind" {
        return None;
    }
    let no_args = match call.arguments.len() {
        0 => true,
        1 => matches!(&call.arguments[0], Argument::ObjectExpression(obj) if obj.properties.is_empty()),
        _ => false,
    };
    no_args.then(|| object.name.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAIN PARSING FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn module_source_type() -> SourceType {
    SourceType::default().with_module(true).with_jsx(true)
}

/// Parse a JSX module into the document IR.
///
/// `line_map` translates module lines (index) to document lines (value) so
/// errors point at the original document.
pub fn parse_module(
    module: &str,
    line_map: Option<&[u32]>,
    file_path: &str,
) -> Result<DocumentNode, CompilerError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, module, module_source_type()).parse();
    let lines = LineIndex::new(module, line_map);

    if let Some(first) = ret.errors.first() {
        let location = first
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| lines.location(label.offset() as u32))
            .unwrap_or_default();
        return Err(CompilerError::at(ERR_PARSE, &first.to_string(), file_path, &location)
            .with_hint("Check the JSX and embedded expressions around this location."));
    }

    let lowerer = Lowerer {
        source: module,
        lines,
    };
    let statements = ret
        .program
        .body
        .iter()
        .map(|stmt| lowerer.lower_statement(stmt))
        .collect();

    Ok(DocumentNode { statements })
}

/// Parse a single expression and return its shape; used where the IR is built
/// from text rather than from a module.
pub fn classify_expression(code: &str) -> Result<ExpressionShape, CompilerError> {
    let allocator = Allocator::default();
    Parser::new(&allocator, code, module_source_type())
        .parse_expression()
        .map(|expr| expression_shape(&expr))
        .map_err(|errors| {
            let message = errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Invalid expression".to_string());
            CompilerError::new(ERR_PARSE, &message, "", 0, 0).with_context(code)
        })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
