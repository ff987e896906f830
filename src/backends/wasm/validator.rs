//! WASM Module Validation
//!
//! Every encoded module goes through wasmparser before it leaves the backend.
//! A failure here is a compiler bug, never a problem with the user's program.

use crate::compiler_frontend::compiler_messages::compiler_errors::{CompilerError, ErrorMetaDataKey};
use wasmparser::{ExternalKind, Parser, Payload};

pub fn validate_wasm(wasm_bytes: &[u8]) -> Result<(), CompilerError> {
    match wasmparser::validate(wasm_bytes) {
        Ok(_) => Ok(()),
        Err(error) => Err(CompilerError::wasm_generation(format!(
            "Generated module failed validation at offset {}: {}",
            error.offset(),
            error.message()
        ))
        .with_metadata(ErrorMetaDataKey::CompilationStage, "Wasm validation")),
    }
}

/// What a validated module exposes to its host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleSummary {
    /// Defined functions, the allocator included
    pub function_count: u32,
    pub function_exports: Vec<String>,
    pub memory_exports: Vec<String>,
}

pub fn summarize_module(wasm_bytes: &[u8]) -> Result<ModuleSummary, CompilerError> {
    let mut summary = ModuleSummary::default();

    for payload in Parser::new(0).parse_all(wasm_bytes) {
        let payload = payload.map_err(|error| {
            CompilerError::wasm_generation(format!("Could not parse module: {error}"))
        })?;

        match payload {
            Payload::FunctionSection(reader) => {
                summary.function_count = reader.count();
            }
            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.map_err(|error| {
                        CompilerError::wasm_generation(format!("Could not read export: {error}"))
                    })?;
                    match export.kind {
                        ExternalKind::Func => summary.function_exports.push(export.name.to_string()),
                        ExternalKind::Memory => summary.memory_exports.push(export.name.to_string()),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Ok(summary)
}
