//! Terminal colors for the run summary
//!
//! 256-color palette. Coloring can be switched off globally, e.g. when
//! stdout is not a terminal.

use std::sync::atomic::{AtomicBool, Ordering};

pub mod colors {
    pub const GREY: u8 = 102;      // #7D7D7D - Punctuation, secondary
    pub const AQUA: u8 = 109;      // #7A9EB5 - Numbers, info
    pub const ORANGE: u8 = 208;    // #F2913D - Warnings, PUT/PATCH
    pub const RED: u8 = 167;       // #E34F45 - Errors, DELETE
    pub const BLUE: u8 = 68;       // #426BD1 - Names, labels
    pub const PINK: u8 = 176;      // #DE85DE - Keys
    pub const GREEN: u8 = 71;      // #63C27A - Success, GET
    pub const YELLOW: u8 = 185;    // #CCCC3D - POST, redirects
}

/// ANSI escape code constants
pub const RESET: &str = "\x1b[0m";

static COLOR_ENABLED: AtomicBool = AtomicBool::new(true);

pub fn set_color_enabled(enabled: bool) {
    COLOR_ENABLED.store(enabled, Ordering::Relaxed);
}

#[inline]
pub fn color_enabled() -> bool {
    COLOR_ENABLED.load(Ordering::Relaxed)
}

/// Generate foreground color escape code
#[inline]
pub fn fg(color: u8) -> String {
    format!("\x1b[38;5;{}m", color)
}

/// Generate bold foreground color escape code
#[inline]
pub fn bold_fg(color: u8) -> String {
    format!("\x1b[1;38;5;{}m", color)
}

/// Colorize text with a foreground color
pub fn colorize(text: &str, color: u8) -> String {
    if !color_enabled() {
        return text.to_string();
    }
    format!("{}{}{}", fg(color), text, RESET)
}

/// Colorize text with bold foreground color
pub fn bold(text: &str, color: u8) -> String {
    if !color_enabled() {
        return text.to_string();
    }
    format!("{}{}{}", bold_fg(color), text, RESET)
}

/// Success message (green)
#[inline]
pub fn success(text: &str) -> String {
    bold(text, colors::GREEN)
}

/// Error message (red)
#[inline]
pub fn error(text: &str) -> String {
    bold(text, colors::RED)
}

/// Warning message (orange)
#[inline]
pub fn warning(text: &str) -> String {
    bold(text, colors::ORANGE)
}

/// Label/name (blue)
#[inline]
pub fn label(text: &str) -> String {
    colorize(text, colors::BLUE)
}

/// Variable key (pink)
#[inline]
pub fn key(text: &str) -> String {
    colorize(text, colors::PINK)
}

/// Secondary/muted text (grey)
#[inline]
pub fn muted(text: &str) -> String {
    colorize(text, colors::GREY)
}

/// HTTP status code, colored by class
pub fn http_status(code: u16) -> String {
    let color = match code / 100 {
        1 => colors::AQUA,   // Informational
        2 => colors::GREEN,  // Success
        3 => colors::YELLOW, // Redirect
        4 => colors::ORANGE, // Client error
        5 => colors::RED,    // Server error
        _ => colors::GREY,
    };
    bold(&code.to_string(), color)
}

/// HTTP method, colored by verb
pub fn http_method(method: &str) -> String {
    let color = match method.to_uppercase().as_str() {
        "GET" | "HEAD" | "OPTIONS" => colors::GREEN,
        "POST" => colors::YELLOW,
        "PUT" | "PATCH" => colors::ORANGE,
        "DELETE" => colors::RED,
        _ => colors::GREY,
    };
    bold(method, color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fg_color() {
        assert_eq!(fg(71), "\x1b[38;5;71m");
        assert_eq!(bold_fg(71), "\x1b[1;38;5;71m");
    }

    #[test]
    fn test_colorize() {
        let result = colorize("test", colors::GREEN);
        if color_enabled() {
            assert!(result.contains("38;5;71m"));
            assert!(result.ends_with(RESET));
        }
        assert!(result.contains("test"));
    }

    #[test]
    fn test_status_colors() {
        if color_enabled() {
            assert!(http_status(200).contains("1;38;5;71m"));
            assert!(http_status(503).contains("1;38;5;167m"));
            assert!(http_method("delete").contains("1;38;5;167m"));
        }
    }
}
