//! # Storybook MDX Compiler
//!
//! Compiles MDX documentation files into modules that render the document and
//! also export every story declared in it.
//!
//! ## Pipeline
//!
//! 1. **Lowering** (`document`): `markdown` parses the MDX; the tree becomes a
//!    JSX module, ESM hoisted and the body wrapped in one `<>…</>` fragment.
//! 2. **Parsing** (`parse`): oxc parses the module; the AST is lowered into an
//!    owned IR.
//! 3. **Extraction** (`finalize`, `story`, `meta`): `Meta`, `Story` and
//!    `Canvas`/`Preview` tags become `componentMeta` and story exports.
//! 4. **Rendering** (`codegen`): the contents fragment becomes `MDXContent`,
//!    and the extracted exports are appended after a separator line.
//!
//! ## Output Invariants
//!
//! 1. `includeStories` lists exactly the emitted story keys, in document order.
//! 2. A document with a `Meta` and no stories exports the docs-only `__page` story.
//! 3. Each compile owns its extraction state; documents can compile in parallel.
//! 4. Any structural error aborts the whole document.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod codegen;
mod discovery;
mod document;
mod finalize;
mod meta;
mod parse;
mod sanitize;
mod story;
mod transform;
mod validate;

#[cfg(test)]
mod property_tests;

pub use codegen::{generate_mdx_content, postprocess, SEPARATOR};
pub use discovery::{compile_dir, compile_file, compile_files, find_mdx_files, FileOutput};
pub use document::{lower_mdx, LoweredDocument};
pub use finalize::{extract_exports, Extraction, WRAPPER_JS};
pub use meta::MetaRecord;
pub use parse::parse_module;
pub use sanitize::{is_valid_identifier, sanitize_name, story_key};
pub use story::{StoryExport, TagPatch};
pub use transform::{escape_js_string, StoryNameTable};
pub use validate::*;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Used in error reports and warnings
    pub filepath: Option<String>,
    /// Only produce the rendering module
    pub skip_csf: bool,
    /// Module providing `useMDXComponents`
    pub provider_import_source: Option<String>,
    pub jsx_import_source: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            filepath: None,
            skip_csf: false,
            provider_import_source: None,
            jsx_import_source: "react".to_string(),
        }
    }
}

impl CompileOptions {
    /// Options from a JSON object; an empty string gives the defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(json)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILATION
// ═══════════════════════════════════════════════════════════════════════════════

fn compile_lowered(
    module: &str,
    line_map: Option<&[u32]>,
    options: &CompileOptions,
) -> Result<String, CompilerError> {
    let file_path = options.filepath.clone().unwrap_or_default();
    let doc = parse_module(module, line_map, &file_path)?;

    if options.skip_csf {
        return generate_mdx_content(module, &[], options);
    }

    let extraction = extract_exports(&doc, options)?;
    let code = generate_mdx_content(module, &extraction.patches, options)?;
    debug!(file = %file_path, stories = extraction.stories.len(), "compiled document");
    Ok(postprocess(&code, &extraction.to_code()))
}

/// Compile an MDX document into a module exporting its stories.
pub fn compile(source: &str, options: &CompileOptions) -> Result<String, CompilerError> {
    let lowered = lower_mdx(source, options.filepath.as_deref().unwrap_or_default())?;
    compile_lowered(&lowered.module, Some(&lowered.line_map), options)
}

/// Compile an already-lowered JSX module (ESM statements plus one contents
/// fragment).
pub fn compile_module(module: &str, options: &CompileOptions) -> Result<String, CompilerError> {
    compile_lowered(module, None, options)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
fn napi_error(error: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(error.to_string())
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_native(source: String, options_json: Option<String>) -> napi::Result<String> {
    let options = CompileOptions::from_json(options_json.as_deref().unwrap_or("")).map_err(napi_error)?;
    compile(&source, &options).map_err(napi_error)
}

#[cfg(feature = "napi")]
#[napi]
pub fn extract_exports_native(module: String, options_json: Option<String>) -> napi::Result<String> {
    let options = CompileOptions::from_json(options_json.as_deref().unwrap_or("")).map_err(napi_error)?;
    let doc = parse_module(&module, None, options.filepath.as_deref().unwrap_or("")).map_err(napi_error)?;
    extract_exports(&doc, &options)
        .map(|extraction| extraction.to_code())
        .map_err(napi_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_json() {
        let options = CompileOptions::from_json(r#"{"filepath":"a.mdx","skipCsf":true}"#).unwrap();
        assert_eq!(options.filepath.as_deref(), Some("a.mdx"));
        assert!(options.skip_csf);
        assert_eq!(options.jsx_import_source, "react");
        assert_eq!(CompileOptions::from_json("").unwrap(), CompileOptions::default());
        assert!(CompileOptions::from_json("{").is_err());
    }

    #[test]
    fn test_skip_csf_returns_rendering_module_only() {
        let options = CompileOptions {
            skip_csf: true,
            ..Default::default()
        };
        let code = compile("<Meta title=\"x\" />", &options).unwrap();
        assert!(!code.contains(SEPARATOR));
        assert!(code.contains("export default MDXContent"));
    }

    #[test]
    fn test_parse_errors_point_at_mdx_lines() {
        let options = CompileOptions {
            filepath: Some("broken.mdx".to_string()),
            ..Default::default()
        };
        let err = compile("# Title\n\n<Story name=\"a\">\n\n{(}\n</Story>", &options).unwrap_err();
        assert_eq!(err.code, ERR_PARSE);
        assert_eq!(err.file, "broken.mdx");
        assert_eq!(err.line, 5);
    }
}
