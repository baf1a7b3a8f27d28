//! # MDX Document Lowering
//!
//! Parses an MDX document with `markdown` (mdast, MDX constructs) and lowers the
//! tree into a JSX module the parser understands: ESM is hoisted verbatim,
//! every other block becomes a child of a single `<>…</>` contents fragment.
//!
//! ## Lowering Rules
//!
//! - `import` / `export` blocks are validated with oxc and hoisted
//! - JSX elements and `{…}` expressions are printed back as written
//! - paragraphs holding only JSX and expressions are unwrapped
//! - text becomes JSON string containers, so `bar` is `{"bar"}`
//! - headings, paragraphs, lists and fences become plain HTML elements
//! - top-level blocks are separated by `{"\n"}` containers
//!
//! Every module line remembers the MDX line it came from, for error reports.

use markdown::mdast::{
    AttributeContent, AttributeValue, AttributeValueExpression, MdxJsxAttribute,
    MdxJsxExpressionAttribute, Node, Paragraph,
};
use markdown::message::{Message, Place};
use markdown::unist::Position;
use markdown::{to_mdast, Constructs, MdxSignal, ParseOptions};
use oxc_allocator::Allocator;
use oxc_ast::ast::Statement;
use oxc_parser::Parser;
use oxc_span::GetSpan;

use crate::parse::module_source_type;
use crate::validate::{CompilerError, ERR_PARSE};

/// Separator placed between top-level blocks.
const BLOCK_SEPARATOR: &str = "{\"\\n\"}";

/// JSX module produced from one MDX document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoweredDocument {
    pub module: String,
    /// `line_map[i]` is the 1-based MDX line that module line `i` came from.
    pub line_map: Vec<u32>,
}

/// Accumulates module lines together with their MDX origin.
#[derive(Default)]
struct ModuleWriter {
    lines: Vec<String>,
    origins: Vec<u32>,
}

impl ModuleWriter {
    /// Start a new line. Origin 0 (unknown) continues the previous origin.
    fn line(&mut self, origin: u32) {
        let origin = match origin {
            0 => self.origins.last().copied().unwrap_or(1),
            known => known,
        };
        self.lines.push(String::new());
        self.origins.push(origin);
    }

    /// Append to the current line; embedded newlines continue on the next MDX line.
    fn write(&mut self, text: &str) {
        if self.lines.is_empty() {
            self.line(1);
        }
        let mut parts = text.split('\n');
        if let (Some(first), Some(current)) = (parts.next(), self.lines.last_mut()) {
            current.push_str(first);
        }
        for part in parts {
            let origin = self.origins.last().copied().unwrap_or(1) + 1;
            self.lines.push(part.to_string());
            self.origins.push(origin);
        }
    }

    fn append(&mut self, other: ModuleWriter) {
        self.lines.extend(other.lines);
        self.origins.extend(other.origins);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// ESM blocks must parse as a module holding only imports and exports.
/// Incomplete code asks for more lines.
fn esm_signal(value: &str) -> MdxSignal {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, value, module_source_type()).parse();

    if let Some(error) = ret.errors.first() {
        let offset = error
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| label.offset())
            .unwrap_or(value.len());
        let reason = error.to_string();
        let source = Box::new("sb-mdx-compiler".to_string());
        let rule_id = Box::new("esm".to_string());
        return if offset >= value.len() {
            MdxSignal::Eof(reason, source, rule_id)
        } else {
            MdxSignal::Error(reason, offset, source, rule_id)
        };
    }

    let stray = ret.program.body.iter().find(|stmt| {
        !matches!(
            stmt,
            Statement::ImportDeclaration(_)
                | Statement::ExportAllDeclaration(_)
                | Statement::ExportDefaultDeclaration(_)
                | Statement::ExportNamedDeclaration(_)
        )
    });
    match stray {
        Some(stmt) => MdxSignal::Error(
            "Unexpected statement in code: only import/exports are supported".to_string(),
            stmt.span().start as usize,
            Box::new("sb-mdx-compiler".to_string()),
            Box::new("esm".to_string()),
        ),
        None => MdxSignal::Ok,
    }
}

fn parse_options() -> ParseOptions {
    ParseOptions {
        constructs: Constructs {
            frontmatter: true,
            ..Constructs::mdx()
        },
        mdx_esm_parse: Some(Box::new(esm_signal)),
        ..ParseOptions::mdx()
    }
}

fn message_error(message: &Message, file_path: &str) -> CompilerError {
    let (line, column) = match message.place.as_deref() {
        Some(Place::Point(point)) => (point.line, point.column),
        Some(Place::Position(position)) => (position.start.line, position.start.column),
        None => (0, 0),
    };
    CompilerError::new(ERR_PARSE, &message.reason, file_path, line as u32, column as u32)
        .with_hint("Check the MDX syntax around this location: unclosed tags, braces or ESM.")
}

// ═══════════════════════════════════════════════════════════════════════════════
// FLOW CONTENT
// ═══════════════════════════════════════════════════════════════════════════════

fn start_line(node: &Node) -> u32 {
    node.position().map(|p| p.start.line as u32).unwrap_or(0)
}

fn end_line(position: Option<&Position>) -> u32 {
    position.map(|p| p.end.line as u32).unwrap_or(0)
}

fn is_blank(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

/// A paragraph holding only JSX, expressions and whitespace.
fn is_unravelable(paragraph: &Paragraph) -> bool {
    let mut markup = false;
    for child in &paragraph.children {
        match child {
            Node::MdxJsxTextElement(_) | Node::MdxTextExpression(_) => markup = true,
            Node::Text(text) if is_blank(&text.value) => {}
            _ => return false,
        }
    }
    markup
}

/// Flow children as rendered: unravelable paragraphs are replaced by their
/// markup, front matter and definitions are dropped.
fn flow_children(children: &[Node]) -> Vec<&Node> {
    let mut flow = Vec::new();
    for child in children {
        match child {
            Node::Paragraph(paragraph) if is_unravelable(paragraph) => flow.extend(
                paragraph
                    .children
                    .iter()
                    .filter(|node| !matches!(node, Node::Text(_))),
            ),
            Node::Yaml(_) | Node::Toml(_) | Node::Definition(_) => {}
            other => flow.push(other),
        }
    }
    flow
}

fn flow(out: &mut ModuleWriter, node: &Node) {
    match node {
        Node::MdxJsxFlowElement(element) => jsx_element(
            out,
            element.name.as_deref(),
            &element.attributes,
            &element.children,
            element.position.as_ref(),
            true,
        ),
        Node::MdxFlowExpression(expression) => out.write(&format!("{{{}}}", expression.value)),
        Node::Heading(heading) => {
            out.write(&format!("<h{}>", heading.depth));
            inline_all(out, &heading.children);
            out.write(&format!("</h{}>", heading.depth));
        }
        Node::Paragraph(paragraph) => {
            out.write("<p>");
            inline_all(out, &paragraph.children);
            out.write("</p>");
        }
        Node::Code(code) => {
            let class = code
                .lang
                .as_deref()
                .map(|lang| format!(" className=\"language-{}\"", lang))
                .unwrap_or_default();
            out.write(&format!(
                "<pre><code{}>{}</code></pre>",
                class,
                text_container(&code.value)
            ));
        }
        Node::Blockquote(quote) => {
            out.write("<blockquote>");
            flow_lines(out, &quote.children, quote.position.as_ref());
            out.write("</blockquote>");
        }
        Node::List(list) => {
            let tag = if list.ordered { "ol" } else { "ul" };
            match list.start {
                Some(start) if list.ordered && start != 1 => {
                    out.write(&format!("<ol start={{{}}}>", start))
                }
                _ => out.write(&format!("<{}>", tag)),
            }
            flow_lines(out, &list.children, list.position.as_ref());
            out.write(&format!("</{}>", tag));
        }
        Node::ListItem(item) => {
            out.write("<li>");
            let children = flow_children(&item.children);
            let tight = !item.spread && children.iter().all(|c| matches!(c, Node::Paragraph(_)));
            if tight {
                for child in children {
                    if let Node::Paragraph(paragraph) = child {
                        inline_all(out, &paragraph.children);
                    }
                }
            } else {
                flow_lines(out, &item.children, item.position.as_ref());
            }
            out.write("</li>");
        }
        Node::ThematicBreak(_) => out.write("<hr />"),
        Node::Html(html) => out.write(&text_container(&html.value)),
        other => inline(out, other),
    }
}

/// Each flow child on its own line, then a fresh line for the closing tag.
fn flow_lines(out: &mut ModuleWriter, children: &[Node], position: Option<&Position>) {
    for child in flow_children(children) {
        out.line(start_line(child));
        flow(out, child);
    }
    out.line(end_line(position));
}

// ═══════════════════════════════════════════════════════════════════════════════
// INLINE CONTENT
// ═══════════════════════════════════════════════════════════════════════════════

fn text_container(text: &str) -> String {
    serde_json::to_string(text)
        .map(|literal| format!("{{{}}}", literal))
        .unwrap_or_default()
}

/// JSX attribute string for `text`; falls back to a container when both quote
/// styles occur.
fn jsx_string(text: &str) -> String {
    if !text.contains('"') {
        format!("\"{}\"", text)
    } else if !text.contains('\'') {
        format!("'{}'", text)
    } else {
        text_container(text)
    }
}

fn inline_all(out: &mut ModuleWriter, children: &[Node]) {
    for child in children {
        inline(out, child);
    }
}

fn wrap(out: &mut ModuleWriter, tag: &str, children: &[Node]) {
    out.write(&format!("<{}>", tag));
    inline_all(out, children);
    out.write(&format!("</{}>", tag));
}

fn inline(out: &mut ModuleWriter, node: &Node) {
    match node {
        // Whitespace across lines is insignificant JSX text; keep it raw so
        // module lines stay aligned with the document.
        Node::Text(text) if is_blank(&text.value) && text.value.contains('\n') => {
            out.write(&text.value)
        }
        Node::Text(text) => out.write(&text_container(&text.value)),
        Node::InlineCode(code) => {
            out.write(&format!("<code>{}</code>", text_container(&code.value)))
        }
        Node::Emphasis(emphasis) => wrap(out, "em", &emphasis.children),
        Node::Strong(strong) => wrap(out, "strong", &strong.children),
        Node::Delete(delete) => wrap(out, "del", &delete.children),
        Node::Break(_) => out.write("<br />"),
        Node::Link(link) => {
            let title = link
                .title
                .as_deref()
                .map(|title| format!(" title={}", jsx_string(title)))
                .unwrap_or_default();
            out.write(&format!("<a href={}{}>", jsx_string(&link.url), title));
            inline_all(out, &link.children);
            out.write("</a>");
        }
        Node::Image(image) => out.write(&format!(
            "<img src={} alt={} />",
            jsx_string(&image.url),
            jsx_string(&image.alt)
        )),
        Node::MdxTextExpression(expression) => out.write(&format!("{{{}}}", expression.value)),
        Node::MdxJsxTextElement(element) => jsx_element(
            out,
            element.name.as_deref(),
            &element.attributes,
            &element.children,
            element.position.as_ref(),
            false,
        ),
        Node::MdxJsxFlowElement(_) | Node::MdxFlowExpression(_) => flow(out, node),
        other => match other.children() {
            Some(children) => inline_all(out, children),
            None => {
                let text = other.to_string();
                if !text.is_empty() {
                    out.write(&text_container(&text));
                }
            }
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSX
// ═══════════════════════════════════════════════════════════════════════════════

fn jsx_attribute(attribute: &AttributeContent) -> String {
    match attribute {
        AttributeContent::Expression(MdxJsxExpressionAttribute { value, .. }) => {
            format!("{{{}}}", value)
        }
        AttributeContent::Property(MdxJsxAttribute { name, value }) => match value {
            None => name.clone(),
            Some(AttributeValue::Literal(text)) => format!("{}={}", name, jsx_string(text)),
            Some(AttributeValue::Expression(AttributeValueExpression { value, .. })) => {
                format!("{}={{{}}}", name, value)
            }
        },
    }
}

/// Print an element as written. Flow elements put each child on its own line;
/// text elements keep their children inline.
fn jsx_element(
    out: &mut ModuleWriter,
    name: Option<&str>,
    attributes: &[AttributeContent],
    children: &[Node],
    position: Option<&Position>,
    block: bool,
) {
    let name = name.unwrap_or_default();
    let mut open = format!("<{}", name);
    for attribute in attributes {
        open.push(' ');
        open.push_str(&jsx_attribute(attribute));
    }

    if children.is_empty() && !name.is_empty() {
        out.write(&format!("{} />", open));
        return;
    }

    out.write(&format!("{}>", open));
    if block {
        flow_lines(out, children, position);
    } else {
        inline_all(out, children);
    }
    out.write(&format!("</{}>", name));
}

// ═══════════════════════════════════════════════════════════════════════════════
// DOCUMENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Lower an MDX document into a JSX module. MDX syntax errors (unclosed tags,
/// invalid ESM) are parse failures located in the document.
pub fn lower_mdx(source: &str, file_path: &str) -> Result<LoweredDocument, CompilerError> {
    let tree = to_mdast(source, &parse_options()).map_err(|message| message_error(&message, file_path))?;
    let children = tree.children().map(|c| c.as_slice()).unwrap_or_default();

    let mut esm = ModuleWriter::default();
    let mut body = ModuleWriter::default();

    for node in flow_children(children) {
        let origin = start_line(node);
        if let Node::MdxjsEsm(statement) = node {
            esm.line(origin);
            esm.write(&statement.value);
            continue;
        }
        if !body.lines.is_empty() {
            body.line(origin);
            body.write(BLOCK_SEPARATOR);
        }
        body.line(origin);
        flow(&mut body, node);
    }

    let opening = body.origins.first().copied().unwrap_or(1);
    let closing = body.origins.last().copied().unwrap_or(opening);
    let mut module = esm;
    module.line(opening);
    module.write("<>");
    module.append(body);
    module.line(closing);
    module.write("</>;");

    Ok(LoweredDocument {
        module: module.lines.join("\n"),
        line_map: module.origins,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(source: &str) -> LoweredDocument {
        lower_mdx(source, "test.mdx").unwrap()
    }

    #[test]
    fn test_scenario_document() {
        let lowered = lower(
            "# hello\n\n<Meta title=\"foobar\" />\n\nworld {2 + 1}\n\n<Story name=\"foo\">bar</Story>",
        );
        assert_eq!(
            lowered.module,
            "<>\n<h1>{\"hello\"}</h1>\n{\"\\n\"}\n<Meta title=\"foobar\" />\n{\"\\n\"}\n<p>{\"world \"}{2 + 1}</p>\n{\"\\n\"}\n<Story name=\"foo\">{\"bar\"}</Story>\n</>;"
        );
        assert_eq!(lowered.line_map, vec![1, 1, 3, 3, 5, 5, 7, 7, 7]);
    }

    #[test]
    fn test_esm_is_hoisted() {
        let lowered = lower(
            "import { Meta } from '@storybook/addon-docs';\nimport { Button } from './Button';\n\n<Meta title=\"Button\" />\n\nexport const Template = (args) => <Button {...args} />;\n",
        );
        let lines: Vec<&str> = lowered.module.lines().collect();
        assert_eq!(lines[0], "import { Meta } from '@storybook/addon-docs';");
        assert_eq!(lines[2], "export const Template = (args) => <Button {...args} />;");
        assert_eq!(lines[3], "<>");
        assert_eq!(lowered.line_map[2], 6);
        assert_eq!(lowered.line_map[4], 4);
    }

    #[test]
    fn test_apostrophes_in_expressions_do_not_swallow_blocks() {
        let lowered = lower(
            "<Story name=\"a\">{() => <p>Don't</p>}</Story>\n\nexport const Template = (args) => <Button {...args} />;\n\n<Story name=\"b\">{Template.bind({})}</Story>\n",
        );
        let lines: Vec<&str> = lowered.module.lines().collect();
        assert_eq!(lines[0], "export const Template = (args) => <Button {...args} />;");
        assert_eq!(lines[2], "<Story name=\"a\">{() => <p>Don't</p>}</Story>");
        assert_eq!(lines[4], "<Story name=\"b\">{Template.bind({})}</Story>");
        assert_eq!(lowered.line_map[4], 5);
    }

    #[test]
    fn test_nested_flow_elements() {
        let lowered = lower(
            "<Canvas>\n  <Story name=\"a\">\n    <Button label=\"}{\" onClick={() => { go(); }} />\n  </Story>\n</Canvas>\n\ntail",
        );
        assert_eq!(
            lowered.module,
            "<>\n<Canvas>\n<Story name=\"a\">\n<Button label=\"}{\" onClick={() => { go(); }} />\n</Story>\n</Canvas>\n{\"\\n\"}\n<p>{\"tail\"}</p>\n</>;"
        );
        assert_eq!(lowered.line_map[3], 3);
    }

    #[test]
    fn test_text_children_become_string_containers() {
        let lowered = lower("<Story name=\"one\">\n  <Button>One</Button>\n</Story>");
        assert!(lowered
            .module
            .contains("<Story name=\"one\">\n<Button>{\"One\"}</Button>\n</Story>"));
    }

    #[test]
    fn test_unclosed_element_is_parse_error() {
        let err = lower_mdx("<Story name=\"x\">\n\nnever closed", "broken.mdx").unwrap_err();
        assert_eq!(err.code, ERR_PARSE);
        assert_eq!(err.file, "broken.mdx");
    }

    #[test]
    fn test_esm_must_hold_only_module_statements() {
        let err = lower_mdx("export const a = 1;\nconsole.log(a);", "test.mdx").unwrap_err();
        assert_eq!(err.code, ERR_PARSE);
        assert!(err.message.contains("only import/exports are supported"));
    }

    #[test]
    fn test_fenced_code_and_front_matter() {
        let lowered = lower("---\ntitle: x\n---\n\n```js\nconst a = \"<b>\";\n```\n");
        assert_eq!(
            lowered.module,
            "<>\n<pre><code className=\"language-js\">{\"const a = \\\"<b>\\\";\"}</code></pre>\n</>;"
        );
        assert_eq!(lowered.line_map[1], 5);
    }

    #[test]
    fn test_inline_markup() {
        let lowered = lower("a `b` *c* [d](e)");
        assert_eq!(
            lowered.module,
            "<>\n<p>{\"a \"}<code>{\"b\"}</code>{\" \"}<em>{\"c\"}</em>{\" \"}<a href=\"e\">{\"d\"}</a></p>\n</>;"
        );
    }

    #[test]
    fn test_tight_list() {
        let lowered = lower("- one\n- two");
        assert_eq!(
            lowered.module,
            "<>\n<ul>\n<li>{\"one\"}</li>\n<li>{\"two\"}</li>\n</ul>\n</>;"
        );
    }

    #[test]
    fn test_markup_only_paragraphs_are_unwrapped() {
        let lowered = lower("<A /> <B />");
        assert_eq!(lowered.module, "<>\n<A />\n{\"\\n\"}\n<B />\n</>;");
    }

    #[test]
    fn test_jsx_string_quoting() {
        assert_eq!(jsx_string("a"), "\"a\"");
        assert_eq!(jsx_string("say \"hi\""), "'say \"hi\"'");
        assert_eq!(jsx_string("it's \"x\""), "{\"it's \\\"x\\\"\"}");
    }

    #[test]
    fn test_empty_document() {
        let lowered = lower("");
        assert_eq!(lowered.module, "<>\n</>;");
    }
}
