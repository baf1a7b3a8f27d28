//! Story and Canvas extraction.
//!
//! A `Story` tag becomes one export plus property assignments. A `Canvas` (or
//! `Preview`) collects the stories directly inside it. Neither touches the IR:
//! attributes the rendered document needs are returned as [`TagPatch`]es.

use serde::{Deserialize, Serialize};

use crate::transform::{
    classify_story_body, encode_uri, json_string, single_quoted, ExtractionContext,
};
use crate::sanitize::{is_identifier_name, story_key};
use crate::validate::{
    contains_story, CompilerError, ExpressionIR, ExpressionShape, TagKind, TagNode, TemplateNode,
    ERR_STORY_ADDRESS,
};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// One story export: its key and the statements defining it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryExport {
    pub key: String,
    pub statements: Vec<String>,
}

impl StoryExport {
    pub fn code(&self) -> String {
        self.statements.join("\n")
    }
}

/// An attribute to add to a tag of the contents fragment before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagPatch {
    /// Module offset the attribute is inserted at (right after the tag name)
    pub insert_at: u32,
    pub name: String,
    /// Attribute value as written, e.g. `"_Primary_"`
    pub value: String,
}

impl TagPatch {
    pub fn for_tag(tag: &TagNode, name: &str, value: String) -> Self {
        TagPatch {
            insert_at: tag.id + 1 + tag.name.len() as u32,
            name: name.to_string(),
            value,
        }
    }

    pub fn attribute(&self) -> String {
        format!(" {}={}", self.name, self.value)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedStories {
    pub stories: Vec<StoryExport>,
    pub patches: Vec<TagPatch>,
}

impl ExtractedStories {
    fn merge(&mut self, other: ExtractedStories) {
        self.stories.extend(other.stories);
        self.patches.extend(other.patches);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract the export for one `Story` tag.
///
/// `id` references produce nothing. `story={Ref}` re-exports the reference.
/// Everything else compiles the tag's children into a story function.
pub fn extract_story(tag: &TagNode, ctx: &mut ExtractionContext) -> Result<ExtractedStories, CompilerError> {
    let name = tag.literal("name");
    let id = tag.literal("id");
    let reference = tag.expression("story");

    if name.is_none() && id.is_none() && reference.is_none() {
        return Err(CompilerError::at(
            ERR_STORY_ADDRESS,
            "Expected a Story name, id, or story attribute",
            &ctx.file_path,
            &tag.location,
        )
        .with_context(&tag.source)
        .with_hint("Add name=\"…\", id=\"…\" or story={…} to the Story."));
    }

    if id.is_some() {
        return Ok(ExtractedStories::default());
    }

    if let Some(reference) = reference {
        return Ok(reference_story(tag, reference, name, ctx));
    }

    let name = name.unwrap_or_default();
    let key = story_key(Some(name), ctx.counter);
    let body = classify_story_body(&tag.children, &ctx.named_exports);

    let mut statements = vec![
        format!("export const {} = {};", key, body.value),
        format!("{}.storyName = {};", key, single_quoted(name)),
    ];

    if let Some(arg_types) = tag.expression("argTypes") {
        statements.push(format!("{}.argTypes = {};", key, arg_types.code));
    }
    if let Some(args) = tag.expression("args") {
        statements.push(format!("{}.args = {};", key, args.code));
    }

    let source_param = format!("storySource: {{ source: {} }}", single_quoted(&body.source));
    match tag.expression("parameters") {
        Some(parameters) => statements.push(format!(
            "{}.parameters = {{ {}, ...{} }};",
            key, source_param, parameters.code
        )),
        None => statements.push(format!("{}.parameters = {{ {} }};", key, source_param)),
    }

    for field in ["decorators", "loaders", "play", "render"] {
        if let Some(expr) = tag.expression(field) {
            statements.push(format!("{}.{} = {};", key, field, expr.code));
        }
    }

    ctx.story_name_to_key.register(name, &key);

    Ok(ExtractedStories {
        stories: vec![StoryExport { key, statements }],
        patches: vec![],
    })
}

/// Trailing name of a story reference: `Basic` for `Basic`, `Primary` for
/// `Stories.Primary` and `Stories['Primary']`. Anything that is not an
/// identifier name goes through the sanitizer.
fn reference_name(reference: &ExpressionIR, counter: usize) -> String {
    let name = match &reference.shape {
        ExpressionShape::Member { property } => property.as_str(),
        _ => reference.code.trim(),
    };
    if is_identifier_name(name) {
        name.to_string()
    } else {
        story_key(Some(name), counter)
    }
}

/// `story={Stories.Primary}` → `export const _Primary_ = Stories.Primary;`
fn reference_story(
    tag: &TagNode,
    reference: &ExpressionIR,
    name: Option<&str>,
    ctx: &mut ExtractionContext,
) -> ExtractedStories {
    let key = format!("_{}_", reference_name(reference, ctx.counter));
    let mut statements = vec![format!("export const {} = {};", key, reference.code)];
    let mut patches = vec![];

    match name {
        Some(name) => {
            ctx.story_name_to_key.register(name, &key);
            statements.push(format!("{}.storyName = {};", key, single_quoted(name)));
        }
        None => {
            ctx.story_name_to_key.register(&key, &key);
            patches.push(TagPatch::for_tag(tag, "name", json_string(&key)));
        }
    }

    ExtractedStories {
        stories: vec![StoryExport { key, statements }],
        patches,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CANVAS
// ═══════════════════════════════════════════════════════════════════════════════

/// Extract the stories directly inside a `Canvas`/`Preview`. A canvas with no
/// story anywhere below it gets an `mdxSource` attribute with its children's
/// source, URI-encoded.
pub fn extract_canvas(tag: &TagNode, ctx: &mut ExtractionContext) -> Result<ExtractedStories, CompilerError> {
    let mut extracted = ExtractedStories::default();

    for child in &tag.children {
        if let TemplateNode::Tag(story) = child {
            if story.kind != TagKind::Story {
                continue;
            }
            let produced = extract_story(story, ctx)?;
            if !produced.stories.is_empty() {
                ctx.counter += 1;
            }
            extracted.merge(produced);
        }
    }

    if !contains_story(&tag.children) {
        let source = tag
            .children
            .iter()
            .filter(|child| !child.is_blank_text())
            .map(|child| child.source())
            .collect::<Vec<_>>()
            .join("\n");
        extracted
            .patches
            .push(TagPatch::for_tag(tag, "mdxSource", format!("\"{}\"", encode_uri(&source))));
    }

    Ok(extracted)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_module;
    use crate::transform::NamedExports;
    use crate::validate::{DocumentNode, ERR_STORY_ADDRESS};

    fn first_tag(module: &str) -> (TagNode, DocumentNode) {
        let doc = parse_module(module, None, "test.mdx").unwrap();
        let tag = doc
            .contents()
            .next()
            .and_then(|fragment| {
                fragment.children.iter().find_map(|child| match child {
                    TemplateNode::Tag(tag) => Some(tag.clone()),
                    _ => None,
                })
            })
            .expect("a tag");
        (tag, doc)
    }

    fn context(doc: &DocumentNode) -> ExtractionContext {
        ExtractionContext::new(NamedExports::from_document(doc), "test.mdx")
    }

    #[test]
    fn test_inline_story() {
        let (tag, doc) = first_tag(
            r#"<><Story name="component notes" args={{ a: 1 }} argTypes={{ a: { control: 'text' } }} parameters={{ foo: 'bar' }} decorators={[withKnobs]}>
  <Button>Component notes</Button>
</Story></>;"#,
        );
        let mut ctx = context(&doc);
        let extracted = extract_story(&tag, &mut ctx).unwrap();
        assert!(extracted.patches.is_empty());
        let story = &extracted.stories[0];
        assert_eq!(story.key, "componentNotes");
        assert_eq!(
            story.statements,
            vec![
                "export const componentNotes = () => (\n  <Button>Component notes</Button>\n);".to_string(),
                "componentNotes.storyName = 'component notes';".to_string(),
                "componentNotes.argTypes = { a: { control: 'text' } };".to_string(),
                "componentNotes.args = { a: 1 };".to_string(),
                "componentNotes.parameters = { storySource: { source: '<Button>Component notes</Button>' }, ...{ foo: 'bar' } };".to_string(),
                "componentNotes.decorators = [withKnobs];".to_string(),
            ]
        );
        assert_eq!(ctx.story_name_to_key.get("component notes"), Some("componentNotes"));
        assert_eq!(ctx.counter, 0);
    }

    #[test]
    fn test_play_and_render_follow_parameters() {
        let (tag, doc) = first_tag(
            r#"<><Story name="p" render={(args) => <B {...args} />} play={async () => {}} loaders={[load]} /></>;"#,
        );
        let mut ctx = context(&doc);
        let story = extract_story(&tag, &mut ctx).unwrap().stories.remove(0);
        assert_eq!(story.statements[0], "export const p = {};");
        assert_eq!(story.statements[2], "p.parameters = { storySource: { source: '{}' } };");
        assert_eq!(
            &story.statements[3..],
            &[
                "p.loaders = [load];".to_string(),
                "p.play = async () => {};".to_string(),
                "p.render = (args) => <B {...args} />;".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_address_is_fatal() {
        let (tag, doc) = first_tag("<>\n<Story>x</Story></>;");
        let err = extract_story(&tag, &mut context(&doc)).unwrap_err();
        assert_eq!(err.code, ERR_STORY_ADDRESS);
        assert_eq!(err.message, "Expected a Story name, id, or story attribute");
        assert_eq!(err.line, 2);

        let (tag, doc) = first_tag(r#"<><Story name="" /></>;"#);
        assert!(extract_story(&tag, &mut context(&doc)).is_err());
    }

    #[test]
    fn test_id_reference_produces_nothing() {
        let (tag, doc) = first_tag(r#"<><Story id="button--primary" /></>;"#);
        let extracted = extract_story(&tag, &mut context(&doc)).unwrap();
        assert_eq!(extracted, ExtractedStories::default());
    }

    #[test]
    fn test_story_reference_with_name() {
        let (tag, doc) = first_tag(r#"<><Story name="Other" story={Stories.Primary} /></>;"#);
        let mut ctx = context(&doc);
        let extracted = extract_story(&tag, &mut ctx).unwrap();
        assert_eq!(
            extracted.stories[0].code(),
            "export const _Primary_ = Stories.Primary;\n_Primary_.storyName = 'Other';"
        );
        assert!(extracted.patches.is_empty());
        assert_eq!(ctx.story_name_to_key.get("Other"), Some("_Primary_"));
    }

    #[test]
    fn test_story_reference_without_name_is_patched() {
        let module = r#"<><Story story={Basic} /></>;"#;
        let (tag, doc) = first_tag(module);
        let mut ctx = context(&doc);
        let extracted = extract_story(&tag, &mut ctx).unwrap();
        assert_eq!(extracted.stories[0].code(), "export const _Basic_ = Basic;");
        let patch = &extracted.patches[0];
        assert_eq!(patch.attribute(), " name=\"_Basic_\"");
        assert_eq!(&module[..patch.insert_at as usize], "<><Story");
        assert_eq!(ctx.story_name_to_key.get("_Basic_"), Some("_Basic_"));
    }

    #[test]
    fn test_story_reference_keys_use_the_trailing_member() {
        let cases = [
            (r#"<><Story story={Stories['Primary']} /></>;"#, "_Primary_"),
            (r#"<><Story story={Stories["With space"]} /></>;"#, "_withSpace_"),
            (r#"<><Story story={(Stories.Nested.Deep)} /></>;"#, "_Deep_"),
        ];
        for (module, expected) in cases {
            let (tag, doc) = first_tag(module);
            let extracted = extract_story(&tag, &mut context(&doc)).unwrap();
            assert_eq!(extracted.stories[0].key, expected);
            assert!(crate::sanitize::is_valid_identifier(&extracted.stories[0].key));
        }
    }

    #[test]
    fn test_canvas_counts_produced_stories() {
        let (tag, doc) = first_tag(
            r#"<><Canvas>
  <Story name="one">{1}</Story>
  <Story id="external--story" />
  <Story name="two">{2}</Story>
</Canvas></>;"#,
        );
        let mut ctx = context(&doc);
        let extracted = extract_canvas(&tag, &mut ctx).unwrap();
        let keys: Vec<&str> = extracted.stories.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["one", "two"]);
        assert_eq!(ctx.counter, 2);
        assert!(extracted.patches.is_empty());
    }

    #[test]
    fn test_canvas_without_story_gets_source() {
        let module = "<><Preview>\n  <h2>Some here</h2>\n  <Button />\n</Preview></>;";
        let (tag, doc) = first_tag(module);
        let extracted = extract_canvas(&tag, &mut context(&doc)).unwrap();
        assert!(extracted.stories.is_empty());
        let patch = &extracted.patches[0];
        assert_eq!(patch.name, "mdxSource");
        assert_eq!(patch.value, "\"%3Ch2%3ESome%20here%3C/h2%3E%0A%3CButton%20/%3E\"");
        assert_eq!(&module[..patch.insert_at as usize], "<><Preview");
    }

    #[test]
    fn test_canvas_with_nested_story_has_no_source() {
        let (tag, doc) = first_tag(
            r#"<><Canvas><div><Story name="deep" /></div></Canvas></>;"#,
        );
        let extracted = extract_canvas(&tag, &mut context(&doc)).unwrap();
        // Only direct children are extracted; nesting still suppresses mdxSource.
        assert!(extracted.stories.is_empty());
        assert!(extracted.patches.is_empty());
    }

    #[test]
    fn test_canvas_errors_propagate() {
        let (tag, doc) = first_tag("<><Canvas><Story /></Canvas></>;");
        assert!(extract_canvas(&tag, &mut context(&doc)).is_err());
    }
}
