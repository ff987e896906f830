use crate::compiler_frontend::declarations::decl_nodes::DeclId;
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::PathBuf;

// The final set of errors emitted for a compilation unit
#[derive(Debug, Default)]
pub struct CompilerMessages {
    pub errors: Vec<CompilerError>,
}

impl CompilerMessages {
    pub fn new() -> Self {
        CompilerMessages { errors: Vec::new() }
    }

    pub fn from_error(error: CompilerError) -> Self {
        CompilerMessages {
            errors: vec![error],
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn extend(&mut self, other: CompilerMessages) {
        self.errors.extend(other.errors);
    }
}

impl From<CompilerError> for CompilerMessages {
    fn from(error: CompilerError) -> Self {
        CompilerMessages::from_error(error)
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ErrorMetaDataKey {
    CompilationStage,
    Declaration,
    UseSite,
    Variable,
    Invariant,
    PrimarySuggestion,
}

/// Where an error came from.
/// The backend has no source text, so locations point at the declaration being processed
/// and the file the declaration tree was loaded from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorLocation {
    pub file: Option<PathBuf>,
    pub declaration: Option<DeclId>,
    pub declaration_path: Option<String>,
}

impl ErrorLocation {
    pub fn in_declaration(declaration: DeclId) -> Self {
        ErrorLocation {
            file: None,
            declaration: Some(declaration),
            declaration_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompilerError {
    pub msg: String,
    pub location: ErrorLocation,
    pub error_type: ErrorType,

    // Structured details for the formatted output
    pub metadata: FxHashMap<ErrorMetaDataKey, String>,
}

impl CompilerError {
    pub fn new(msg: impl Into<String>, location: ErrorLocation, error_type: ErrorType) -> Self {
        CompilerError {
            msg: msg.into(),
            location,
            error_type,
            metadata: FxHashMap::default(),
        }
    }

    /// Create a compiler error (internal bug, not the program's fault)
    pub fn compiler_error(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::default(), ErrorType::Compiler)
    }

    /// Malformed declaration tree handed over by the frontend or a program file
    pub fn program_error(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::default(), ErrorType::Program)
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::default(), ErrorType::Config)
    }

    pub fn file_error(path: &std::path::Path, msg: impl Into<String>) -> Self {
        CompilerError {
            msg: msg.into(),
            location: ErrorLocation {
                file: Some(path.to_path_buf()),
                declaration: None,
                declaration_path: None,
            },
            error_type: ErrorType::File,
            metadata: FxHashMap::default(),
        }
    }

    pub fn wasm_generation(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::default(), ErrorType::WasmGeneration)
    }

    pub fn runtime_error(msg: impl Into<String>) -> Self {
        CompilerError::new(msg, ErrorLocation::default(), ErrorType::Runtime)
    }

    pub fn with_file_path(mut self, file_path: PathBuf) -> Self {
        self.location.file = Some(file_path);
        self
    }

    pub fn with_declaration(mut self, declaration: DeclId) -> Self {
        self.location.declaration = Some(declaration);
        self
    }

    pub fn with_declaration_path(mut self, path: impl Into<String>) -> Self {
        self.location.declaration_path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, key: ErrorMetaDataKey, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value.into());
        self
    }

    pub fn is_internal(&self) -> bool {
        self.error_type == ErrorType::Compiler
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", error_type_to_str(&self.error_type), self.msg)
    }
}

impl std::error::Error for CompilerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Compiler,
    Program,
    Config,
    File,
    LirTransformation,
    WasmGeneration,
    Runtime,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::Compiler => "Compiler Bug",
        ErrorType::Program => "Malformed Declaration Tree",
        ErrorType::Config => "Malformed Config",
        ErrorType::File => "File Error",
        ErrorType::LirTransformation => "LIR Transformation",
        ErrorType::WasmGeneration => "WASM Generation",
        ErrorType::Runtime => "Runtime Fault",
    }
}

/// Creates an internal compiler error (invariant violation inside the backend).
///
/// Usage:
/// `compiler_error!("Variable {} is not captured", name)`
#[macro_export]
macro_rules! compiler_error {
    ($msg:expr) => {
        $crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError::compiler_error(
            $msg,
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError::compiler_error(
            format!($fmt, $($arg)*),
        )
    };
}

/// Returns early with an internal compiler error.
///
/// These are never the fault of the program being compiled.
/// The frontend already rejected malformed source before the backend runs.
#[macro_export]
macro_rules! return_compiler_error {
    ($($arg:tt)*) => {
        return Err($crate::compiler_error!($($arg)*))
    };
}

/// Returns early with an error about a malformed declaration tree.
#[macro_export]
macro_rules! return_program_error {
    ($msg:expr) => {
        return Err(
            $crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError::program_error(
                $msg,
            ),
        )
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err(
            $crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError::program_error(
                format!($fmt, $($arg)*),
            ),
        )
    };
}
