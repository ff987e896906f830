use std::process::ExitCode;

fn main() -> ExitCode {
    thicket::projects::cli::start_cli()
}
