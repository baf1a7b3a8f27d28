//! Codegen module for the MDX story compiler
//!
//! Builds the document-rendering module (`MDXContent`) from the lowered JSX
//! module and splices the extracted story exports after it.

use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_parser::Parser;

use crate::parse::{module_source_type, parse_module};
use crate::story::TagPatch;
use crate::validate::{CompilerError, ERR_PARSE};
use crate::CompileOptions;

/// Line separating the rendering module from the extracted exports.
pub const SEPARATOR: &str = "// =========";

/// Runtime helpers the extracted exports reference.
pub const ADDON_DOCS_IMPORT: &str = "import { assertIsFn, AddContext } from \"@storybook/addon-docs\";";

pub fn jsx_pragma(jsx_import_source: &str) -> String {
    format!("/*@jsxRuntime automatic @jsxImportSource {}*/", jsx_import_source)
}

/// Insert patched attributes into the module text. Later offsets go first so
/// earlier offsets stay valid.
pub fn apply_patches(module: &str, patches: &[TagPatch]) -> String {
    let mut ordered: Vec<&TagPatch> = patches.iter().collect();
    ordered.sort_by(|a, b| b.insert_at.cmp(&a.insert_at));

    let mut patched = module.to_string();
    for patch in ordered {
        let at = patch.insert_at as usize;
        if at <= patched.len() && patched.is_char_boundary(at) {
            patched.insert_str(at, &patch.attribute());
        }
    }
    patched
}

fn components_expr(options: &CompileOptions) -> &'static str {
    if options.provider_import_source.is_some() {
        "Object.assign({}, _provideComponents(), props.components)"
    } else {
        "props.components || {}"
    }
}

/// Generate the rendering module for a lowered document.
///
/// ESM statements are hoisted; the (patched) contents fragment is returned by
/// `_createMdxContent`, and `MDXContent` wraps it in the layout component when
/// one is provided. The result is re-parsed and printed by oxc.
pub fn generate_mdx_content(
    module: &str,
    patches: &[TagPatch],
    options: &CompileOptions,
) -> Result<String, CompilerError> {
    let file_path = options.filepath.clone().unwrap_or_default();
    let patched = apply_patches(module, patches);
    let doc = parse_module(&patched, None, &file_path)?;

    let mut source = String::new();
    if let Some(provider) = &options.provider_import_source {
        source.push_str(&format!(
            "import {{ useMDXComponents as _provideComponents }} from {};\n",
            serde_json::to_string(provider).unwrap_or_default()
        ));
    }
    for stmt in doc.module_statements() {
        source.push_str(stmt);
        source.push('\n');
    }

    let contents = doc
        .contents()
        .next()
        .map(|fragment| fragment.source.as_str())
        .unwrap_or("<></>");
    source.push_str(&format!(
        "function _createMdxContent(props) {{\n  return {};\n}}\n",
        contents
    ));
    source.push_str(&format!(
        "function MDXContent(props = {{}}) {{\n  const {{ wrapper: MDXLayout }} = {};\n  return MDXLayout ? <MDXLayout {{...props}}><_createMdxContent {{...props}} /></MDXLayout> : _createMdxContent(props);\n}}\n",
        components_expr(options)
    ));
    source.push_str("export default MDXContent;\n");

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, &source, module_source_type()).parse();
    if let Some(error) = ret.errors.first() {
        return Err(CompilerError::new(ERR_PARSE, &error.to_string(), &file_path, 0, 0)
            .with_context(&source));
    }
    let code = Codegen::new().build(&ret.program).code;

    Ok(format!("{}\n{}", jsx_pragma(&options.jsx_import_source), code))
}

/// Splice extracted exports after the rendering module.
///
/// Keeps the pragma line first, adds the addon-docs import, drops the module's
/// own `export default` and appends the separator and the exports.
pub fn postprocess(code: &str, extracted: &str) -> String {
    let mut lines = code.trim().split('\n');
    let first = lines.next().unwrap_or_default();

    let mut output = vec![first, ADDON_DOCS_IMPORT];
    output.extend(lines.filter(|line| !line.starts_with("export default")));
    output.push(SEPARATOR);
    output.push(extracted);
    output.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(insert_at: u32, name: &str, value: &str) -> TagPatch {
        TagPatch {
            insert_at,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_apply_patches() {
        let module = "<><Story story={A} /><Canvas>x</Canvas></>;";
        let patched = apply_patches(
            module,
            &[patch(8, "name", "\"_A_\""), patch(28, "mdxSource", "\"x\"")],
        );
        assert_eq!(
            patched,
            "<><Story name=\"_A_\" story={A} /><Canvas mdxSource=\"x\">x</Canvas></>;"
        );
        assert_eq!(apply_patches(module, &[patch(999, "a", "b")]), module);
    }

    #[test]
    fn test_postprocess() {
        let code = "/*@jsxRuntime automatic @jsxImportSource react*/\nfunction MDXContent() {}\nexport default MDXContent;\n";
        assert_eq!(
            postprocess(code, "export const a = 1;"),
            "/*@jsxRuntime automatic @jsxImportSource react*/\nimport { assertIsFn, AddContext } from \"@storybook/addon-docs\";\nfunction MDXContent() {}\n// =========\nexport const a = 1;"
        );
    }

    #[test]
    fn test_rendering_module() {
        let module = "import { Meta } from '@storybook/addon-docs';\n<>\n<Meta title=\"x\" />\n</>;";
        let code = generate_mdx_content(module, &[], &CompileOptions::default()).unwrap();
        let first = code.lines().next().unwrap();
        assert_eq!(first, "/*@jsxRuntime automatic @jsxImportSource react*/");
        assert!(code.contains("@storybook/addon-docs"));
        assert!(code.contains("function _createMdxContent(props)"));
        assert!(code.contains("function MDXContent(props = {})"));
        assert!(code.contains("export default MDXContent"));
        assert!(!code.contains("_provideComponents"));
    }

    #[test]
    fn test_rendering_module_with_provider_and_patch() {
        let module = "<><Story story={Basic} /></>;";
        let options = CompileOptions {
            provider_import_source: Some("@mdx-js/react".to_string()),
            jsx_import_source: "preact".to_string(),
            ..Default::default()
        };
        let code =
            generate_mdx_content(module, &[patch(8, "name", "\"_Basic_\"")], &options).unwrap();
        assert!(code.starts_with("/*@jsxRuntime automatic @jsxImportSource preact*/\n"));
        assert!(code.contains("useMDXComponents as _provideComponents"));
        assert!(code.contains("_Basic_"));
    }

    #[test]
    fn test_empty_document_renders_empty_fragment() {
        let code = generate_mdx_content("", &[], &CompileOptions::default()).unwrap();
        assert!(code.contains("_createMdxContent"));
    }
}
