//! System configuration and command-line processing (C10, §4.9/§6.4).

use crate::internals::messages::DebugLevel;
use clap::{arg, Command};

pub const VERSION: &str = "0.1.0";

pub struct Config {
    pub debug_level: DebugLevel,
    /// A filename ending (case-insensitively) in `.fbc` names a binary image;
    /// anything else is read as source.
    pub filename: Option<String>,
    /// Arguments after the filename: one-shot source lines executed in
    /// sequence, after which the process exits instead of entering the
    /// interactive loop.
    pub one_shot_lines: Vec<String>,
}

impl Config {
    pub fn new() -> Config {
        Config {
            debug_level: DebugLevel::Error,
            filename: None,
            one_shot_lines: Vec::new(),
        }
    }

    pub fn parse_args() -> Config {
        let mut config = Config::new();

        let matches = Command::new("ftth")
            .version(VERSION)
            .about("A small stack-based, concatenative language core")
            .arg(
                arg!(--"debug-level" <VALUE>)
                    .required(false)
                    .value_parser(["error", "warning", "info", "debug"]),
            )
            .arg(arg!([filename] "image (.fbc) or source file to load"))
            .arg(arg!([rest] ... "one-shot source lines, executed after loading"))
            .get_matches();

        if let Some(level) = matches.get_one::<String>("debug-level") {
            if let Some(parsed) = DebugLevel::from_str(level) {
                config.debug_level = parsed;
            }
        }
        config.filename = matches.get_one::<String>("filename").cloned();
        if let Some(rest) = matches.get_many::<String>("rest") {
            config.one_shot_lines = rest.cloned().collect();
        }

        config
    }

    pub fn is_image_file(&self) -> bool {
        self.filename
            .as_deref()
            .map(|f| f.to_ascii_lowercase().ends_with(".fbc"))
            .unwrap_or(false)
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_filename() {
        let config = Config::new();
        assert!(config.filename.is_none());
        assert!(config.one_shot_lines.is_empty());
        assert_eq!(config.debug_level, DebugLevel::Error);
    }

    #[test]
    fn recognizes_fbc_extension_case_insensitively() {
        let mut config = Config::new();
        config.filename = Some("saved.FBC".to_string());
        assert!(config.is_image_file());
        config.filename = Some("program.fs".to_string());
        assert!(!config.is_image_file());
    }
}
