//! Discovery Module for the MDX story compiler
//!
//! Recursively scans directories for `.mdx` documents and compiles them in
//! parallel. Every compile owns its own extraction state.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::validate::{CompilerError, ERR_IO};
use crate::{compile, CompileOptions};

/// Result of compiling one discovered document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileOutput {
    pub path: String,
    pub code: Option<String>,
    pub error: Option<CompilerError>,
}

impl FileOutput {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// All `.mdx` files below `dir`, sorted by path.
pub fn find_mdx_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && path.extension().map(|ext| ext == "mdx").unwrap_or(false))
        .collect();
    files.sort();
    debug!(dir = %dir.display(), count = files.len(), "discovered mdx files");
    files
}

/// Read and compile one document. `options.filepath` is set to `path`.
pub fn compile_file(path: &Path, options: &CompileOptions) -> Result<String, CompilerError> {
    let path_str = path.to_string_lossy().to_string();
    let source = fs::read_to_string(path).map_err(|e| {
        CompilerError::new(ERR_IO, &format!("Failed to read file: {}", e), &path_str, 0, 0)
    })?;

    let options = CompileOptions {
        filepath: Some(path_str),
        ..options.clone()
    };
    compile(&source, &options)
}

/// Compile many documents in parallel. Output order follows `paths`.
pub fn compile_files(paths: &[PathBuf], options: &CompileOptions) -> Vec<FileOutput> {
    paths
        .par_iter()
        .map(|path| {
            let (code, error) = match compile_file(path, options) {
                Ok(code) => (Some(code), None),
                Err(error) => (None, Some(error)),
            };
            FileOutput {
                path: path.to_string_lossy().to_string(),
                code,
                error,
            }
        })
        .collect()
}

/// Discover and compile every document below `dir`.
pub fn compile_dir(dir: &Path, options: &CompileOptions) -> Vec<FileOutput> {
    compile_files(&find_mdx_files(dir), options)
}
