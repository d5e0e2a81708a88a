//! Debugging helpers for development of the crate itself.
//!
//! Enabled with the `debug_prints` feature. Debug prints cost performance;
//! the feature exists for working on the scanner and parser, not for
//! consumers of the crate.

/// If the `debug_prints` feature is enabled, print the given arguments to
/// stderr. Otherwise, compile to nothing.
#[cfg(feature = "debug_prints")]
#[macro_export]
macro_rules! debug_print {
    ($($arg:tt)*) => {{
        eprintln!($($arg)*)
    }};
}

/// If the `debug_prints` feature is enabled, print the given arguments to
/// stderr. Otherwise, compile to nothing.
#[cfg(not(feature = "debug_prints"))]
#[macro_export]
macro_rules! debug_print {
    ($($arg:tt)*) => {{}};
}
