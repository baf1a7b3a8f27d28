//! Meta extraction and the `componentMeta` object literal.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::transform::single_quoted;
use crate::validate::{AttributeValue, TagNode};

/// Marker every MDX-declared meta carries.
pub const MDX_TAGS: &str = "['mdx']";

/// Document-level defaults, each held as code to insert verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaRecord {
    pub title: Option<String>,
    pub id: Option<String>,
    pub parameters: Option<String>,
    pub decorators: Option<String>,
    pub loaders: Option<String>,
    pub component: Option<String>,
    pub subcomponents: Option<String>,
    pub args: Option<String>,
    pub arg_types: Option<String>,
    pub render: Option<String>,
    pub tags: Option<String>,
}

impl MetaRecord {
    /// `{ title: 'x', tags: ['mdx'], includeStories: ["a"] }`
    pub fn to_object_literal(&self, include_stories: &[String]) -> String {
        let include =
            serde_json::to_string(include_stories).unwrap_or_else(|_| "[]".to_string());
        let fields = [
            ("title", self.title.as_deref()),
            ("id", self.id.as_deref()),
            ("parameters", self.parameters.as_deref()),
            ("decorators", self.decorators.as_deref()),
            ("loaders", self.loaders.as_deref()),
            ("component", self.component.as_deref()),
            ("subcomponents", self.subcomponents.as_deref()),
            ("args", self.args.as_deref()),
            ("argTypes", self.arg_types.as_deref()),
            ("render", self.render.as_deref()),
            ("tags", self.tags.as_deref()),
            ("includeStories", Some(include.as_str())),
        ];

        let entries: Vec<String> = fields
            .iter()
            .filter_map(|(key, value)| match value {
                Some(value) if !value.is_empty() => Some(format!("{}: {}", key, value)),
                _ => None,
            })
            .collect();
        format!("{{ {} }}", entries.join(", "))
    }
}

fn title(tag: &TagNode, file_path: &str) -> Option<String> {
    match tag.attribute("title")? {
        AttributeValue::Static(value) => Some(single_quoted(value)),
        AttributeValue::Dynamic(expr) => Some(expr.code.clone()),
        AttributeValue::EmptyExpression => {
            warn!(file = file_path, "Invalid title");
            None
        }
        other => {
            warn!(file = file_path, attr = ?other, "Unknown title attr");
            None
        }
    }
}

/// Build the meta record for a `Meta` tag. A title that cannot be used is
/// dropped with a warning.
pub fn extract_meta(tag: &TagNode, file_path: &str) -> MetaRecord {
    let code = |name: &str| tag.expression(name).map(|expr| expr.code.clone());

    MetaRecord {
        title: title(tag, file_path),
        id: match tag.attribute("id") {
            Some(AttributeValue::Static(id)) => Some(single_quoted(id)),
            _ => None,
        },
        parameters: code("parameters"),
        decorators: code("decorators"),
        loaders: code("loaders"),
        component: code("component"),
        subcomponents: code("subcomponents"),
        args: code("args"),
        arg_types: code("argTypes"),
        render: code("render"),
        tags: Some(MDX_TAGS.to_string()),
    }
}
