//! JSON program files.
//!
//! A program file is a serialized `DeclTree`, the form a frontend hands to this backend.
//! Loading always validates, so everything past this point can rely on a well-formed tree.

use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::declarations::decl_nodes::DeclTree;
use std::fs;
use std::path::Path;

pub fn load_program_file(path: &Path) -> Result<DeclTree, CompilerError> {
    let source = fs::read_to_string(path)
        .map_err(|e| CompilerError::file_error(path, format!("Could not read file: {e}")))?;

    parse_program(&source).map_err(|e| e.with_file_path(path.to_path_buf()))
}

pub fn parse_program(source: &str) -> Result<DeclTree, CompilerError> {
    let tree: DeclTree = serde_json::from_str(source).map_err(|e| {
        CompilerError::program_error(format!(
            "Invalid program JSON at line {}, column {}: {}",
            e.line(),
            e.column(),
            e
        ))
    })?;

    tree.validate()?;
    Ok(tree)
}

pub fn write_program_file(path: &Path, tree: &DeclTree) -> Result<(), CompilerError> {
    let json = serde_json::to_string_pretty(tree)
        .map_err(|e| CompilerError::compiler_error(format!("Could not serialize tree: {e}")))?;

    fs::write(path, json)
        .map_err(|e| CompilerError::file_error(path, format!("Could not write file: {e}")))
}
