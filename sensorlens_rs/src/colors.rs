//! Terminal color utilities for CLI output.
//!
//! ANSI codes plus a [`Painter`] that knows whether colors are wanted, and a
//! heat scale for measurement values.

use std::io::IsTerminal;

use crate::types::ColorMode;

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[34m";
pub const MAGENTA: &str = "\x1b[35m";
pub const CYAN: &str = "\x1b[36m";

pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const RESET: &str = "\x1b[0m";

pub const BRIGHT_RED: &str = "\x1b[91m";

/// Determines if colors should be used based on ColorMode and terminal detection.
pub fn is_enabled(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    }
}

/// Colorizer that can be passed around to format functions.
#[derive(Clone, Copy, Debug)]
pub struct Painter {
    enabled: bool,
}

impl Painter {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            enabled: is_enabled(mode),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn error(&self, s: &str) -> String {
        self.wrap(s, RED)
    }

    pub fn ok(&self, s: &str) -> String {
        self.wrap(s, GREEN)
    }

    /// Directory and file names
    pub fn path(&self, s: &str) -> String {
        self.wrap(s, CYAN)
    }

    /// Dependency modules
    pub fn module(&self, s: &str) -> String {
        self.wrap(s, MAGENTA)
    }

    pub fn header(&self, s: &str) -> String {
        self.wrap(s, BOLD)
    }

    /// Tree guides, units, hints
    pub fn dim(&self, s: &str) -> String {
        self.wrap(s, DIM)
    }

    pub fn info(&self, s: &str) -> String {
        self.wrap(s, BLUE)
    }

    /// Color a value by its share of the hottest value: dim below 10%,
    /// yellow up to 50%, red up to 90%, bright red above.
    pub fn heat(&self, s: &str, weight: f64) -> String {
        let code = if weight >= 0.9 {
            BRIGHT_RED
        } else if weight >= 0.5 {
            RED
        } else if weight >= 0.1 {
            YELLOW
        } else {
            DIM
        };
        self.wrap(s, code)
    }

    pub fn status_ok(&self, msg: &str) -> String {
        format!("{} {}", self.ok("[OK]"), msg)
    }

    pub fn status_error(&self, msg: &str) -> String {
        format!("{} {}", self.error("[ERROR]"), msg)
    }

    pub fn wrap(&self, s: &str, code: &str) -> String {
        if self.enabled {
            format!("{code}{s}{RESET}")
        } else {
            s.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_painter_disabled() {
        let p = Painter { enabled: false };
        assert_eq!(p.error("test"), "test");
        assert_eq!(p.heat("test", 1.0), "test");
        assert_eq!(p.path("test"), "test");
    }

    #[test]
    fn test_painter_enabled() {
        let p = Painter { enabled: true };
        assert_eq!(p.error("test"), "\x1b[31mtest\x1b[0m");
        assert_eq!(p.module("dep"), "\x1b[35mdep\x1b[0m");
        assert_eq!(p.path("test"), "\x1b[36mtest\x1b[0m");
    }

    #[test]
    fn test_heat_scale() {
        let p = Painter { enabled: true };
        assert!(p.heat("v", 0.95).starts_with(BRIGHT_RED));
        assert!(p.heat("v", 0.6).starts_with(RED));
        assert!(p.heat("v", 0.2).starts_with(YELLOW));
        assert!(p.heat("v", 0.0).starts_with(DIM));
    }

    #[test]
    fn test_status_prefixes() {
        let p = Painter { enabled: true };
        assert!(p.status_ok("done").contains("[OK]"));
        assert!(p.status_error("failed").contains("[ERROR]"));
    }

    #[test]
    fn test_color_mode_detection() {
        assert!(is_enabled(ColorMode::Always));
        assert!(!is_enabled(ColorMode::Never));
    }
}
