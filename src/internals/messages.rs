//! Leveled diagnostics (C9).
//!
//! Every component that needs to report a non-fatal condition goes through a `Msg`
//! sink instead of calling `eprintln!` directly, so the core stays embeddable in
//! hosts that have no terminal at all. `Msg` never panics and never aborts; it is
//! purely observational.

use crate::internals::io::IoSurface;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Error,
    Warning,
    Info,
    Debug,
}

impl DebugLevel {
    pub fn from_str(s: &str) -> Option<DebugLevel> {
        match s {
            "error" => Some(DebugLevel::Error),
            "warning" => Some(DebugLevel::Warning),
            "info" => Some(DebugLevel::Info),
            "debug" => Some(DebugLevel::Debug),
            _ => None,
        }
    }
}

/// A leveled message sink. Holds no I/O of its own; every line is routed through
/// whichever `IoSurface` the caller hands in, so tests can capture diagnostics the
/// same way they capture ordinary output.
#[derive(Debug, Clone)]
pub struct Msg {
    level: DebugLevel,
}

impl Msg {
    pub fn new() -> Msg {
        Msg {
            level: DebugLevel::Error,
        }
    }

    pub fn set_level(&mut self, level: DebugLevel) {
        self.level = level;
    }

    pub fn get_level(&self) -> DebugLevel {
        self.level
    }

    /// error is always shown, regardless of the configured level.
    pub fn error<T: std::fmt::Debug>(&self, io: &mut dyn IoSurface, caller: &str, text: &str, detail: Option<T>) {
        self.emit(io, "error", caller, text, detail);
    }

    pub fn warning<T: std::fmt::Debug>(&self, io: &mut dyn IoSurface, caller: &str, text: &str, detail: Option<T>) {
        if self.level >= DebugLevel::Warning {
            self.emit(io, "warning", caller, text, detail);
        }
    }

    pub fn info<T: std::fmt::Debug>(&self, io: &mut dyn IoSurface, caller: &str, text: &str, detail: Option<T>) {
        if self.level >= DebugLevel::Info {
            self.emit(io, "info", caller, text, detail);
        }
    }

    pub fn debug<T: std::fmt::Debug>(&self, io: &mut dyn IoSurface, caller: &str, text: &str, detail: Option<T>) {
        if self.level >= DebugLevel::Debug {
            self.emit(io, "debug", caller, text, detail);
        }
    }

    fn emit<T: std::fmt::Debug>(&self, io: &mut dyn IoSurface, kind: &str, caller: &str, text: &str, detail: Option<T>) {
        let line = match detail {
            Some(d) => format!("{kind}: {caller}: {text}: {d:?}"),
            None => format!("{kind}: {caller}: {text}"),
        };
        io.write_error_line(&line);
    }
}

impl Default for Msg {
    fn default() -> Msg {
        Msg::new()
    }
}
