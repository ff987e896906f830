use crate::build_system::core_build::{CompiledUnit, compile_unit};
use crate::compiler_frontend::Flag;
use crate::compiler_frontend::compiler_messages::compiler_errors::{CompilerError, CompilerMessages};
use crate::compiler_frontend::declarations::program_file::load_program_file;
use crate::projects::settings::{Config, LIR_FILE_EXTENSION, WASM_FILE_EXTENSION};
use rayon::prelude::*;
use saying::say;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub struct OutputFile {
    pub full_file_path: PathBuf,
    file_kind: FileKind,
}

pub enum FileKind {
    Lir(String),
    Wasm(Vec<u8>),

    // Analysis and layout reports
    Text(String),
}

impl OutputFile {
    pub fn new(full_file_path: PathBuf, file_kind: FileKind) -> Self {
        Self {
            full_file_path,
            file_kind,
        }
    }

    pub(crate) fn file_kind(&self) -> &FileKind {
        &self.file_kind
    }
}

/// Compiles every input unit in parallel, then writes the outputs the config asks for.
///
/// Units are independent, so one bad unit doesn't stop the others from compiling,
/// but nothing is written unless every unit succeeded.
pub fn build_files(inputs: &[PathBuf], config: &Config, flags: &[Flag]) -> CompilerMessages {
    let time = Instant::now();
    let mut messages = CompilerMessages::new();

    if inputs.is_empty() {
        messages
            .errors
            .push(CompilerError::config_error("No input files were given to build"));
        return messages;
    }

    let results: Vec<Result<Vec<OutputFile>, CompilerMessages>> = inputs
        .par_iter()
        .map(|path| build_unit(path, config))
        .collect();

    let mut output_files = Vec::new();
    for result in results {
        match result {
            Ok(files) => output_files.extend(files),
            Err(unit_messages) => messages.extend(unit_messages),
        }
    }

    if messages.has_errors() {
        return messages;
    }

    if !flags.contains(&Flag::DisableTimers) {
        say!(
            "\nBuilt ",
            Blue inputs.len(),
            Reset " units in: ",
            Green Bold #time.elapsed()
        );
    }

    if flags.contains(&Flag::NoOutputFiles) {
        return messages;
    }

    for output_file in output_files {
        match write_output_file(&output_file) {
            Ok(()) => {
                if flags.contains(&Flag::Verbose) {
                    say!(Dark White "  wrote ", {output_file.full_file_path.display().to_string()});
                }
            }
            Err(e) => messages.errors.push(e),
        }
    }

    messages
}

fn build_unit(path: &Path, config: &Config) -> Result<Vec<OutputFile>, CompilerMessages> {
    let tree = load_program_file(path)?;
    let unit = compile_unit(&tree, config).map_err(|unit_messages| CompilerMessages {
        errors: unit_messages
            .errors
            .into_iter()
            .map(|e| e.with_file_path(path.to_path_buf()))
            .collect(),
    })?;

    Ok(output_files_for(path, config, unit))
}

pub fn output_files_for(input: &Path, config: &Config, unit: CompiledUnit) -> Vec<OutputFile> {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| String::from("unit"));

    let dir = match &config.output_dir {
        Some(dir) => dir.to_owned(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    let mut files = Vec::new();
    if let Some(analysis) = unit.dumps.analysis {
        files.push(OutputFile::new(
            dir.join(format!("{stem}.analysis.txt")),
            FileKind::Text(analysis),
        ));
    }
    if let Some(layouts) = unit.dumps.layouts {
        files.push(OutputFile::new(
            dir.join(format!("{stem}.layouts.txt")),
            FileKind::Text(layouts),
        ));
    }
    if let Some(lir) = unit.dumps.lir {
        files.push(OutputFile::new(
            dir.join(format!("{stem}.{LIR_FILE_EXTENSION}")),
            FileKind::Lir(lir),
        ));
    }
    if let Some(wasm) = unit.wasm {
        files.push(OutputFile::new(
            dir.join(format!("{stem}.{WASM_FILE_EXTENSION}")),
            FileKind::Wasm(wasm),
        ));
    }
    files
}

fn write_output_file(output_file: &OutputFile) -> Result<(), CompilerError> {
    let path = &output_file.full_file_path;

    // Guards against overwriting something by accident when the name was never set
    if path.file_name().is_none() {
        return Err(CompilerError::compiler_error("Output file did not have a name set"));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                CompilerError::file_error(parent, format!("Could not create output directory: {e}"))
            })?;
        }
    }

    let result = match output_file.file_kind() {
        FileKind::Lir(content) | FileKind::Text(content) => fs::write(path, content),
        FileKind::Wasm(content) => fs::write(path, content),
    };

    result.map_err(|e| CompilerError::file_error(path, format!("Error writing file: {e}")))
}
