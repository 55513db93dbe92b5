//! Kernel print utilities.

use crate::spinlock::SpinLock;
use std::io::Write;

static CONSOLE: SpinLock<()> = SpinLock::new(());

#[doc(hidden)]
pub fn _print(fmt: std::fmt::Arguments<'_>) {
    let guard = CONSOLE.lock();
    {
        let mut out = std::io::stdout().lock();
        let _ = out.write_fmt(fmt);
        let _ = out.flush();
    }
    guard.unlock();
}

/// Prints out the message.
///
/// Use the format! syntax to write data to the standard output.
/// This first holds the lock for console device.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::kprint::_print(format_args!($($arg)*)));
}

/// Prints out the message with a newline.
#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}

/// Display an information message.
///
/// Silenced by [`QUIET`](crate::QUIET).
#[macro_export]
macro_rules! info {
    () => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO]\n") });
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[INFO] {}\n", format_args!($($arg)*)) });
}

/// Display a warning message.
///
/// Silenced by [`QUIET`](crate::QUIET).
#[macro_export]
macro_rules! warning {
    () => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN]\n") });
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[WARN] {}\n", format_args!($($arg)*)) });
}

/// Display a debug message.
///
/// Silenced by [`QUIET`](crate::QUIET).
#[macro_export]
macro_rules! debug {
    () => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG]\n") });
    ($($arg:tt)*) => (if !$crate::QUIET.load(core::sync::atomic::Ordering::SeqCst) { $crate::print!("[DEBUG] {}\n", format_args!($($arg)*))} );
}
