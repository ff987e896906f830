//! Build settings.
//!
//! Read from `thicket.toml` next to the inputs when present. Every field has a default,
//! so an empty or partial file is fine. Command line flags are applied on top.

use crate::backends::nested_context::allocation::FrameAllocation;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::runtime::interpreter::DEFAULT_MAX_STEPS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "thicket.toml";
pub const PROGRAM_FILE_EXTENSION: &str = "json";
pub const LIR_FILE_EXTENSION: &str = "lir";
pub const WASM_FILE_EXTENSION: &str = "wasm";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub frame_allocation: FrameAllocation,
    pub emit_wasm: bool,

    /// Outputs go next to each input when unset
    pub output_dir: Option<PathBuf>,
    pub max_interpreter_steps: u64,
    pub dumps: DumpOptions,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    pub analysis: bool,
    pub layouts: bool,
    pub lir: bool,
}

impl DumpOptions {
    pub fn set_all(&mut self, value: bool) {
        self.analysis = value;
        self.layouts = value;
        self.lir = value;
    }

    pub fn any(&self) -> bool {
        self.analysis || self.layouts || self.lir
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            frame_allocation: FrameAllocation::EscapeAnalysis,
            emit_wasm: false,
            output_dir: None,
            max_interpreter_steps: DEFAULT_MAX_STEPS,
            dumps: DumpOptions::default(),
        }
    }
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, CompilerError> {
        let mut config: Config = toml::from_str(source)
            .map_err(|e| CompilerError::config_error(format!("Invalid {CONFIG_FILE_NAME}: {e}")))?;

        if let Some(dir) = &config.output_dir {
            config.output_dir = Some(normalize_path(&dir.to_string_lossy())?);
        }
        if config.max_interpreter_steps == 0 {
            return Err(CompilerError::config_error(
                "max_interpreter_steps must be greater than zero",
            ));
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CompilerError> {
        let source = fs::read_to_string(path)
            .map_err(|e| CompilerError::file_error(path, format!("Could not read config: {e}")))?;
        Config::from_toml(&source).map_err(|e| e.with_file_path(path.to_path_buf()))
    }

    /// Loads `thicket.toml` from `dir`, or the defaults if there is none.
    pub fn find_in(dir: &Path) -> Result<Self, CompilerError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Config::load(&path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn to_toml(&self) -> Result<String, CompilerError> {
        toml::to_string_pretty(self)
            .map_err(|e| CompilerError::compiler_error(format!("Could not serialize config: {e}")))
    }
}

/// Turns a user supplied path into one using the platform separator.
/// An option given with nothing after it is an error, not the current directory.
pub fn normalize_path(raw: &str) -> Result<PathBuf, CompilerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CompilerError::config_error("Path option was given an empty value"));
    }

    let normalized: String = trimmed
        .chars()
        .map(|c| if c == '/' || c == '\\' { MAIN_SEPARATOR } else { c })
        .collect();

    Ok(PathBuf::from(normalized))
}

/// Adds an input file to the list. Inputs accumulate across the command line.
pub fn add_input(inputs: &mut Vec<PathBuf>, raw: &str) -> Result<(), CompilerError> {
    if raw.trim().is_empty() {
        return Err(CompilerError::config_error("Input file names can't be empty"));
    }
    inputs.push(normalize_path(raw)?);
    Ok(())
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
