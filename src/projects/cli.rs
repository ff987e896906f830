//! Command-line entrypoints for thicket.
//!
//! Parses commands and flags by hand and dispatches into the build driver,
//! the interpreter and the layout report.

use crate::backends::nested_context::NestedContext;
use crate::backends::nested_context::allocation::FrameAllocation;
use crate::build_system::build::build_files;
use crate::build_system::core_build::compile_unit;
use crate::compiler_frontend::Flag;
use crate::compiler_frontend::compiler_messages::compiler_errors::{CompilerError, CompilerMessages};
use crate::compiler_frontend::declarations::program_file::load_program_file;
use crate::compiler_frontend::display_messages::{print_compiler_messages, print_formatted_error};
use crate::projects::settings::{Config, add_input, normalize_path};
use crate::runtime::interpreter::Interpreter;
use saying::say;
use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    pub inputs: Vec<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub heap_frames: bool,
    pub emit_wasm: bool,
    pub show_analysis: bool,
    pub show_layouts: bool,
    pub show_lir: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Build(BuildOptions),

    // Interprets one function of a unit with integer arguments
    Run {
        path: PathBuf,
        function: String,
        args: Vec<i64>,
        heap_frames: bool,
    },

    // Prints the capture analysis and frame layouts of a unit
    Layouts(PathBuf),

    Help,
}

pub fn start_cli() -> ExitCode {
    let compiler_args: Vec<String> = env::args().collect();

    if compiler_args.len() < 2 {
        print_help(false);
        return ExitCode::SUCCESS;
    }

    let command = match get_command(&compiler_args[1..]) {
        Ok(command) => command,
        Err(e) => {
            say!(Red e);
            print_help(true);
            return ExitCode::FAILURE;
        }
    };

    let flags = get_flags(&compiler_args);

    match command {
        Command::Help => {
            print_help(false);
            ExitCode::SUCCESS
        }

        Command::Build(options) => {
            let config = match build_config(&options) {
                Ok(config) => config,
                Err(e) => {
                    print_formatted_error(e);
                    return ExitCode::FAILURE;
                }
            };

            let messages = build_files(&options.inputs, &config, &flags);
            report(messages)
        }

        Command::Run {
            path,
            function,
            args,
            heap_frames,
        } => match run_function(&path, &function, &args, heap_frames) {
            Ok(result) => {
                say!(Green Bold function, Reset " returned ", Bright {result});
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_formatted_error(e);
                ExitCode::FAILURE
            }
        },

        Command::Layouts(path) => match layout_report(&path) {
            Ok(text) => {
                say!(text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_formatted_error(e);
                ExitCode::FAILURE
            }
        },
    }
}

fn report(messages: CompilerMessages) -> ExitCode {
    if messages.has_errors() {
        print_compiler_messages(messages);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn get_command(args: &[String]) -> Result<Command, String> {
    let command = args.first().map(String::as_str);

    match command {
        Some("help") | Some("--help") => Ok(Command::Help),

        Some("build") => parse_build_command(args),

        Some("run") => parse_run_command(args),

        Some("layouts") => match args.get(1) {
            Some(path) if !path.starts_with("--") => normalize_path(path)
                .map(Command::Layouts)
                .map_err(|e| e.msg),
            _ => Err(String::from("The layouts command needs a program file")),
        },

        Some(other) => Err(format!("Invalid command: '{other}'")),
        None => Ok(Command::Help),
    }
}

fn get_flags(args: &[String]) -> Vec<Flag> {
    let mut flags = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--verbose" => flags.push(Flag::Verbose),
            "--hide-timers" => flags.push(Flag::DisableTimers),
            "--check" => flags.push(Flag::NoOutputFiles),
            _ => {}
        }
    }

    flags
}

fn parse_build_command(args: &[String]) -> Result<Command, String> {
    let mut options = BuildOptions::default();
    let mut index = 1usize;

    while let Some(arg) = args.get(index) {
        match arg.as_str() {
            "--out" | "--config" => {
                let Some(value) = args.get(index + 1) else {
                    return Err(format!("Missing value for {arg}"));
                };
                if value.starts_with("--") {
                    return Err(format!("Missing value for {arg}"));
                }
                let path = normalize_path(value).map_err(|e| format!("{arg}: {}", e.msg))?;
                if arg == "--out" {
                    options.output_dir = Some(path);
                } else {
                    options.config_path = Some(path);
                }
                index += 2;
            }
            "--heap-frames" => {
                options.heap_frames = true;
                index += 1;
            }
            "--wasm" => {
                options.emit_wasm = true;
                index += 1;
            }
            "--show-analysis" => {
                options.show_analysis = true;
                index += 1;
            }
            "--show-layouts" => {
                options.show_layouts = true;
                index += 1;
            }
            "--show-lir" => {
                options.show_lir = true;
                index += 1;
            }
            "--show-all" => {
                options.show_analysis = true;
                options.show_layouts = true;
                options.show_lir = true;
                index += 1;
            }
            "--verbose" | "--hide-timers" | "--check" => {
                index += 1;
            }
            _ if arg.starts_with("--") => {
                return Err(format!("Unknown build flag: '{arg}'"));
            }
            _ => {
                add_input(&mut options.inputs, arg).map_err(|e| e.msg)?;
                index += 1;
            }
        }
    }

    if options.inputs.is_empty() {
        return Err(String::from("The build command needs at least one program file"));
    }

    Ok(Command::Build(options))
}

fn parse_run_command(args: &[String]) -> Result<Command, String> {
    let mut positional = Vec::new();
    let mut heap_frames = false;

    for arg in &args[1..] {
        match arg.as_str() {
            "--heap-frames" => heap_frames = true,
            "--verbose" | "--hide-timers" => {}

            // Negative integers are arguments, not flags
            _ if arg.starts_with("--") => return Err(format!("Unknown run flag: '{arg}'")),
            _ => positional.push(arg.as_str()),
        }
    }

    let [path, function, rest @ ..] = positional.as_slice() else {
        return Err(String::from("Usage: run <file> <function> [integer arguments]"));
    };

    let path = normalize_path(path).map_err(|e| e.msg)?;
    if function.is_empty() {
        return Err(String::from("The run command needs a function name"));
    }

    let mut run_args = Vec::with_capacity(rest.len());
    for value in rest {
        match value.parse::<i64>() {
            Ok(value) => run_args.push(value),
            Err(_) => {
                return Err(format!(
                    "Invalid argument '{value}'. Entry points only take integers."
                ));
            }
        }
    }

    Ok(Command::Run {
        path,
        function: function.to_string(),
        args: run_args,
        heap_frames,
    })
}

/// `thicket.toml` from `--config` or next to the first input, then command line overrides.
pub fn build_config(options: &BuildOptions) -> Result<Config, CompilerError> {
    let mut config = match &options.config_path {
        Some(path) => Config::load(path)?,
        None => {
            let dir = options
                .inputs
                .first()
                .and_then(|input| input.parent())
                .unwrap_or(Path::new(""));
            Config::find_in(dir)?
        }
    };

    if options.heap_frames {
        config.frame_allocation = FrameAllocation::AlwaysHeap;
    }
    if options.emit_wasm {
        config.emit_wasm = true;
    }
    if let Some(dir) = &options.output_dir {
        config.output_dir = Some(dir.to_owned());
    }
    config.dumps.analysis |= options.show_analysis;
    config.dumps.layouts |= options.show_layouts;
    config.dumps.lir |= options.show_lir;

    Ok(config)
}

fn run_function(
    path: &Path,
    function: &str,
    args: &[i64],
    heap_frames: bool,
) -> Result<String, CompilerError> {
    let tree = load_program_file(path)?;
    let dir = path.parent().unwrap_or(Path::new(""));
    let mut config = Config::find_in(dir)?;
    config.emit_wasm = false;
    config.dumps.set_all(false);
    if heap_frames {
        config.frame_allocation = FrameAllocation::AlwaysHeap;
    }

    let unit = compile_unit(&tree, &config).map_err(first_error)?;
    let mut interpreter = Interpreter::new(&unit.lir, config.max_interpreter_steps);
    let result = interpreter.call_by_name(function, args)?;

    Ok(match result {
        Some(value) => value.to_string(),
        None => String::from("nothing"),
    })
}

fn layout_report(path: &Path) -> Result<String, CompilerError> {
    let tree = load_program_file(path)?;
    let config = Config::find_in(path.parent().unwrap_or(Path::new("")))?;
    let nested = NestedContext::build(&tree, config.frame_allocation)?;

    let mut text = nested.analysis.report(&tree);
    if text.is_empty() {
        text.push_str("Nothing is captured\n");
    }
    text.push('\n');
    text.push_str(&nested.layouts.to_string());
    Ok(text)
}

fn first_error(messages: CompilerMessages) -> CompilerError {
    messages
        .errors
        .into_iter()
        .next()
        .unwrap_or_else(|| CompilerError::compiler_error("Compilation failed without an error"))
}

fn print_help(commands_only: bool) {
    if !commands_only {
        say!(Bright Black "------------------------------------");
        say!(Green Bold "thicket - static chain lowering for nested functions and aggregates");
        say!("Usage: ", Bold "<command> ", Italic "<args>");
    }
    say!(Green Bold "\nCommands:");
    say!("  build <files...>                 - Compiles declaration trees");
    say!("  run <file> <function> [ints...]  - Interprets a top-level function");
    say!("  layouts <file>                   - Prints captures and frame layouts");
    say!("  help                             - Shows this message");

    say!(Green Bold "\nBuild flags:");
    say!("  --heap-frames      Allocate every frame on the heap");
    say!("  --wasm             Emit a .wasm module per unit");
    say!("  --out <dir>        Output directory");
    say!("  --config <file>    Config file (default: thicket.toml next to the first input)");
    say!("  --show-analysis");
    say!("  --show-layouts");
    say!("  --show-lir");
    say!("  --show-all");
    say!("  --check            Compile without writing anything");
    say!("  --verbose");
    say!("  --hide-timers");
}

#[cfg(test)]
#[path = "tests/cli_tests.rs"]
mod tests;
