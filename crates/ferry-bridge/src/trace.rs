//! Diagnostic tracing on stderr
//!
//! Debug lines are written only when the session was opened with `debug`
//! set; they are indented by conversion depth. Warnings are always written.
//! Tracing never changes control flow.

/// Line prefix for bridge diagnostics
pub const TRACE_PREFIX: &str = "[ferry]";

/// Stderr tracer
#[derive(Debug, Clone, Copy, Default)]
pub struct Tracer {
    enabled: bool,
}

impl Tracer {
    /// Create a tracer
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Check if debug output is on
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Debug line, indented two spaces per `depth`
    pub fn debug(&self, depth: usize, message: &str) {
        if self.enabled {
            eprintln!("{} {}", TRACE_PREFIX, format_line(depth, message));
        }
    }

    /// Warning line (written regardless of the debug flag)
    pub fn warn(&self, message: &str) {
        eprintln!("{} warning: {}", TRACE_PREFIX, message);
    }
}

fn format_line(depth: usize, message: &str) -> String {
    format!("{}{}", "  ".repeat(depth), message)
}
