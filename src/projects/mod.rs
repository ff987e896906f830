/// The command line and the settings it builds with
pub mod cli;
pub mod settings;
