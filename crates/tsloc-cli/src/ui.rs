// Status line macros for human-readable output.

use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};

static COLOR: AtomicBool = AtomicBool::new(false);

pub fn set_color(enabled: bool) {
    COLOR.store(enabled, Ordering::Relaxed);
}

#[derive(Clone, Copy)]
pub enum Tone {
    Ok,
    Info,
    Warn,
    Err,
}

pub fn decorate(tone: Tone, msg: std::fmt::Arguments<'_>) -> String {
    let icon = match tone {
        Tone::Ok => "✔",
        Tone::Info => "ℹ",
        Tone::Warn => "⚠",
        Tone::Err => "✖",
    };
    let msg = msg.to_string();
    if !COLOR.load(Ordering::Relaxed) {
        return format!("{icon} {msg}");
    }
    match tone {
        Tone::Ok => format!("{} {msg}", icon.green()),
        Tone::Info => format!("{} {msg}", icon.cyan()),
        Tone::Warn => format!("{} {}", icon.yellow(), msg.yellow()),
        Tone::Err => format!("{} {}", icon.red(), msg.red()),
    }
}

#[macro_export]
macro_rules! ui_ok {
    ($($arg:tt)*) => {{
        println!("{}", $crate::ui::decorate($crate::ui::Tone::Ok, format_args!($($arg)*)));
    }};
}

#[macro_export]
macro_rules! ui_info {
    ($($arg:tt)*) => {{
        eprintln!("{}", $crate::ui::decorate($crate::ui::Tone::Info, format_args!($($arg)*)));
    }};
}

#[macro_export]
macro_rules! ui_warn {
    ($($arg:tt)*) => {{
        eprintln!("{}", $crate::ui::decorate($crate::ui::Tone::Warn, format_args!($($arg)*)));
    }};
}

#[macro_export]
macro_rules! ui_err {
    ($($arg:tt)*) => {{
        eprintln!("{}", $crate::ui::decorate($crate::ui::Tone::Err, format_args!($($arg)*)));
    }};
}
