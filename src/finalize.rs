//! Finalize Module for the MDX story compiler
//!
//! Walks the contents fragment once, dispatches each recognized tag to its
//! extractor and assembles the text appended after the rendering module.

use tracing::debug;

use crate::meta::{extract_meta, MetaRecord};
use crate::story::{extract_canvas, extract_story, ExtractedStories, StoryExport, TagPatch};
use crate::transform::{ExtractionContext, NamedExports, StoryNameTable};
use crate::validate::{
    CompilerError, DocumentNode, FragmentNode, TagKind, TemplateNode, ERR_DUPLICATE_CONTENTS,
    ERR_DUPLICATE_META, ERR_UNEXPECTED_CHILD,
};
use crate::CompileOptions;

/// Hooks the rendered document into the meta's docs parameters.
pub const WRAPPER_JS: &str = "componentMeta.parameters = componentMeta.parameters || {};
componentMeta.parameters.docs = {
  ...(componentMeta.parameters.docs || {}),
  page: MDXContent,
};";

pub const DOCS_ONLY_KEY: &str = "__page";

fn docs_only_story() -> StoryExport {
    StoryExport {
        key: DOCS_ONLY_KEY.to_string(),
        statements: vec![
            format!(
                "export const {} = () => {{ throw new Error(\"Docs-only story\"); }};",
                DOCS_ONLY_KEY
            ),
            format!("{}.parameters = {{ docsOnly: true }};", DOCS_ONLY_KEY),
        ],
    }
}

/// Everything extracted from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub stories: Vec<StoryExport>,
    /// `None` when the document declares no `Meta`
    pub meta: Option<MetaRecord>,
    pub story_name_to_key: StoryNameTable,
    pub patches: Vec<TagPatch>,
}

impl Extraction {
    pub fn include_stories(&self) -> Vec<String> {
        self.stories.iter().map(|story| story.key.clone()).collect()
    }

    /// Story blocks, `componentMeta`, the name table, the docs wiring and the
    /// default export, separated by blank lines.
    pub fn to_code(&self) -> String {
        let meta = self.meta.clone().unwrap_or_default();
        let mut blocks: Vec<String> = self.stories.iter().map(|story| story.code()).collect();
        blocks.push(format!(
            "const componentMeta = {};",
            meta.to_object_literal(&self.include_stories())
        ));
        blocks.push(format!(
            "const mdxStoryNameToKey = {};",
            self.story_name_to_key.to_json()
        ));
        blocks.push(WRAPPER_JS.to_string());
        blocks.push("export default componentMeta;".to_string());
        blocks.join("\n\n")
    }
}

fn single_contents<'a>(doc: &'a DocumentNode, file_path: &str) -> Result<Option<&'a FragmentNode>, CompilerError> {
    let mut contents = doc.contents();
    let first = contents.next();
    if let Some(duplicate) = contents.next() {
        return Err(CompilerError::at(
            ERR_DUPLICATE_CONTENTS,
            "duplicate contents",
            file_path,
            &duplicate.location,
        ));
    }
    Ok(first)
}

/// Extract story exports and meta from a parsed document.
pub fn extract_exports(doc: &DocumentNode, options: &CompileOptions) -> Result<Extraction, CompilerError> {
    let file_path = options.filepath.clone().unwrap_or_default();
    let contents = single_contents(doc, &file_path)?;
    let mut ctx = ExtractionContext::new(NamedExports::from_document(doc), &file_path);

    let mut extracted = ExtractedStories::default();
    let mut meta: Option<MetaRecord> = None;

    for child in contents.map(|c| c.children.as_slice()).unwrap_or_default() {
        match child {
            TemplateNode::Tag(tag) => match tag.kind {
                TagKind::Canvas | TagKind::Preview => {
                    let produced = extract_canvas(tag, &mut ctx)?;
                    extracted.stories.extend(produced.stories);
                    extracted.patches.extend(produced.patches);
                }
                TagKind::Story => {
                    let produced = extract_story(tag, &mut ctx)?;
                    extracted.stories.extend(produced.stories);
                    extracted.patches.extend(produced.patches);
                }
                TagKind::Meta => {
                    if meta.is_some() {
                        return Err(CompilerError::at(
                            ERR_DUPLICATE_META,
                            "Meta can only be declared once",
                            &file_path,
                            &tag.location,
                        )
                        .with_context(&tag.source));
                    }
                    meta = Some(extract_meta(tag, &file_path));
                }
                TagKind::Other => {}
            },
            TemplateNode::Text(_) | TemplateNode::Expression(_) => {}
            other => {
                let location = match other {
                    TemplateNode::Fragment(fragment) => fragment.location,
                    TemplateNode::Spread(expr) => expr.location,
                    _ => Default::default(),
                };
                return Err(CompilerError::at(
                    ERR_UNEXPECTED_CHILD,
                    &format!("Unexpected JSX child: {}", other.kind_name()),
                    &file_path,
                    &location,
                ));
            }
        }
    }

    if meta.is_some() && extracted.stories.is_empty() {
        extracted.stories.push(docs_only_story());
    }

    debug!(
        file = %file_path,
        stories = extracted.stories.len(),
        has_meta = meta.is_some(),
        patches = extracted.patches.len(),
        "extracted story exports"
    );

    Ok(Extraction {
        stories: extracted.stories,
        meta,
        story_name_to_key: ctx.story_name_to_key,
        patches: extracted.patches,
    })
}
