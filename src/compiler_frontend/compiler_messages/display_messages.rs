use crate::compiler_frontend::compiler_messages::compiler_errors::{
    CompilerError, CompilerMessages, ErrorMetaDataKey, ErrorType,
};
use saying::say;
use std::env;
use std::path::{Path, PathBuf};

fn normalize_display_path(path: &Path) -> PathBuf {
    let path_string = path.to_string_lossy();
    if let Some(stripped) = path_string.strip_prefix(r"\\?\") {
        return PathBuf::from(stripped);
    }

    path.to_path_buf()
}

fn relative_display_path(file: &Path) -> String {
    let normalized_file = normalize_display_path(file);

    match env::current_dir() {
        Ok(dir) => {
            let normalized_dir = normalize_display_path(&dir);
            normalized_file
                .strip_prefix(&normalized_dir)
                .unwrap_or(&normalized_file)
                .to_string_lossy()
                .to_string()
        }
        Err(err) => {
            say!(Red "Could not read the current directory to shorten the file path: ", err);
            normalized_file.to_string_lossy().to_string()
        }
    }
}

pub fn print_compiler_messages(messages: CompilerMessages) {
    for err in messages.errors {
        print_formatted_error(err);
    }
}

pub fn print_formatted_error(e: CompilerError) {
    let relative_dir = match &e.location.file {
        Some(file) => relative_display_path(file),
        None => String::new(),
    };

    match e.error_type {
        ErrorType::Compiler => {
            if !relative_dir.is_empty() {
                say!("\nヽ༼☉ ‿ ⚆༽ﾉ  🔥🔥🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥🔥🔥  ╰(° _ o╰) ");
            }
            say!(Yellow "COMPILER BUG - ");
            say!(Dark Yellow "backend developer skill issue (not your fault)");
        }

        ErrorType::Program => {
            if !relative_dir.is_empty() {
                say!("\n(ಠ_ಠ) ", Dark Magenta relative_dir);
            }
            say!(Red "Malformed declaration tree");
        }

        ErrorType::Config => {
            if !relative_dir.is_empty() {
                say!("\n (-_-)  🔥🔥🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥🔥🔥  <(^~^)/ ");
            }
            say!(Yellow "CONFIG ISSUE - ");
            say!(Dark Yellow "an option or config value doesn't make sense");
        }

        ErrorType::File => {
            say!(Yellow "🏚 Can't find/read/write file or directory: ", relative_dir);
            say!(e.msg);
            return;
        }

        ErrorType::LirTransformation => {
            if !relative_dir.is_empty() {
                say!("\nヽ༼☉ ‿ ⚆༽ﾉ  🔥🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥🔥  ╰(° _ o╰) ");
            }
            say!(Yellow "LIR TRANSFORMATION BUG - ");
            say!(Dark Yellow "backend developer skill issue (not your fault)");
        }

        ErrorType::WasmGeneration => {
            if !relative_dir.is_empty() {
                say!("\nヽ༼☉ ‿ ⚆༽ﾉ  🔥🔥🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥🔥🔥  ╰(° O °)╯ ");
            }
            say!(Yellow "WASM GENERATION BUG - ", Dark "backend developer skill issue (not your fault)");
        }

        ErrorType::Runtime => {
            if !relative_dir.is_empty() {
                say!("\n(╯°Д°)╯  🔥🔥 ", Dark Magenta relative_dir, " 🔥🔥  ╰(°□°╰) ");
            }
            say!(Red "Runtime fault");
        }
    }

    if let Some(path) = &e.location.declaration_path {
        say!(Dark Magenta "In ", Bright {path});
    } else if let Some(declaration) = e.location.declaration {
        say!(Dark Magenta "In ", Bright {declaration.to_string()});
    }

    say!(Red e.msg);

    for key in [
        ErrorMetaDataKey::CompilationStage,
        ErrorMetaDataKey::Declaration,
        ErrorMetaDataKey::UseSite,
        ErrorMetaDataKey::Variable,
        ErrorMetaDataKey::Invariant,
    ] {
        if let Some(value) = e.metadata.get(&key) {
            say!(Dark "  ", #key, ": ", value);
        }
    }

    if let Some(suggestion) = e.metadata.get(&ErrorMetaDataKey::PrimarySuggestion) {
        say!(Green "Suggestion: ", suggestion);
    }
}
