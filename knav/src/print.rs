// SPDX-License-Identifier: MIT
use core::fmt;
use crate::console;

#[doc(hidden)]
pub fn kprint(args: fmt::Arguments) {
    // a broken console must not take the driver down with it
    let _ = console::console().write_fmt(args);
}

/// Prints without a newline.
///
/// Carbon copy from <https://doc.rust-lang.org/src/std/macros.rs.html>
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::print::kprint(format_args!($($arg)*)));
}

/// Prints with a newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($string:expr) => ($crate::print::kprint(format_args!(concat!($string, "\n"))));
    ($format_string:expr, $($arg:tt)*) => ({
        $crate::print::kprint(format_args!(concat!($format_string, "\n"), $($arg)*));
    })
}

/// Prints an info, with a newline.
#[macro_export]
macro_rules! info {
    ($string:expr) => ({
        let timestamp = $crate::time::time_manager().uptime();

        $crate::print::kprint(format_args!(
            concat!("[  {:>3}.{:06}] ", $string, "\n"),
            timestamp.as_secs(),
            timestamp.subsec_micros(),
        ));
    });
    ($format_string:expr, $($arg:tt)*) => ({
        let timestamp = $crate::time::time_manager().uptime();

        $crate::print::kprint(format_args!(
            concat!("[  {:>3}.{:06}] ", $format_string, "\n"),
            timestamp.as_secs(),
            timestamp.subsec_micros(),
            $($arg)*
        ));
    })
}

/// Prints a warning, with a newline.
#[macro_export]
macro_rules! warn {
    ($string:expr) => ({
        let timestamp = $crate::time::time_manager().uptime();

        $crate::print::kprint(format_args!(
            concat!("[W {:>3}.{:06}] ", $string, "\n"),
            timestamp.as_secs(),
            timestamp.subsec_micros(),
        ));
    });
    ($format_string:expr, $($arg:tt)*) => ({
        let timestamp = $crate::time::time_manager().uptime();

        $crate::print::kprint(format_args!(
            concat!("[W {:>3}.{:06}] ", $format_string, "\n"),
            timestamp.as_secs(),
            timestamp.subsec_micros(),
            $($arg)*
        ));
    })
}

/// Register level tracing. Only printed with the `debug-log` feature.
#[macro_export]
macro_rules! debug {
    ($string:expr) => ({
        if cfg!(feature = "debug-log") {
            let timestamp = $crate::time::time_manager().uptime();

            $crate::print::kprint(format_args!(
                concat!("[D {:>3}.{:06}] ", $string, "\n"),
                timestamp.as_secs(),
                timestamp.subsec_micros(),
            ));
        }
    });
    ($format_string:expr, $($arg:tt)*) => ({
        if cfg!(feature = "debug-log") {
            let timestamp = $crate::time::time_manager().uptime();

            $crate::print::kprint(format_args!(
                concat!("[D {:>3}.{:06}] ", $format_string, "\n"),
                timestamp.as_secs(),
                timestamp.subsec_micros(),
                $($arg)*
            ));
        }
    })
}
