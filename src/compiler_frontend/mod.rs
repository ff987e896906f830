pub mod compiler_messages {
    pub mod compiler_dev_logging;
    pub mod compiler_errors;
    pub mod display_messages;
}
pub use compiler_messages::compiler_errors;
pub use compiler_messages::display_messages;

pub mod declarations;

/// Settings that only apply to a single invocation and never come from `thicket.toml`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Verbose,
    DisableTimers,
    NoOutputFiles, // Compile and report errors only
}
