// CAPTURE ANALYSIS LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_analysis")]
macro_rules! analysis_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_analysis"))]
macro_rules! analysis_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// Extra timer logging
#[macro_export]
#[cfg(feature = "detailed_timers")]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        saying::say!($msg, Green #$time.elapsed());
    };
}

#[macro_export]
#[cfg(not(feature = "detailed_timers"))]
macro_rules! timer_log {
    ($time:expr, $msg:expr) => {
        // Nothing
    };
}

// FRAME LAYOUT LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_layouts")]
macro_rules! layout_log {
    ($layout:expr) => {
        saying::say!("\n", $layout.to_string());
    };
}

#[macro_export]
#[cfg(not(feature = "show_layouts"))]
macro_rules! layout_log {
    ($layout:expr) => {
        // Nothing
    };
}

// CODEGEN LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_codegen")]
macro_rules! codegen_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_codegen"))]
macro_rules! codegen_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}

// LIR LOGGING MACROS
#[macro_export]
#[cfg(feature = "show_lir")]
macro_rules! lir_log {
    ($($arg:tt)*) => {
        saying::say!($($arg)*);
    };
}

#[macro_export]
#[cfg(not(feature = "show_lir"))]
macro_rules! lir_log {
    ($($arg:tt)*) => {
        // Nothing
    };
}
