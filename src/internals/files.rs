//! Host filesystem access for `LOAD`, `SAVE`, `SAVEB`, and `LOADB`.
//!
//! Kept deliberately thin: the outer interpreter owns all Forth-level
//! semantics, this module only turns paths into bytes and back.

use crate::error::{CoreError, CoreResult};
use std::fs;

pub fn read_source_file(path: &str) -> CoreResult<String> {
    fs::read_to_string(path).map_err(|e| CoreError::Io(e.to_string()))
}

pub fn write_text_file(path: &str, contents: &str) -> CoreResult<()> {
    fs::write(path, contents).map_err(|e| CoreError::Io(e.to_string()))
}

pub fn read_binary_file(path: &str) -> CoreResult<Vec<u8>> {
    fs::read(path).map_err(|e| CoreError::Io(e.to_string()))
}

pub fn write_binary_file(path: &str, bytes: &[u8]) -> CoreResult<()> {
    fs::write(path, bytes).map_err(|e| CoreError::Io(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("ftth-test-{}-{name}", std::process::id()))
    }

    #[test]
    fn text_round_trips() {
        let path = scratch_path("text.fs");
        write_text_file(path.to_str().unwrap(), ": SQ DUP * ;").unwrap();
        let back = read_source_file(path.to_str().unwrap()).unwrap();
        assert_eq!(back, ": SQ DUP * ;");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn binary_round_trips() {
        let path = scratch_path("image.fb");
        write_binary_file(path.to_str().unwrap(), &[1, 2, 3, 4]).unwrap();
        let back = read_binary_file(path.to_str().unwrap()).unwrap();
        assert_eq!(back, vec![1, 2, 3, 4]);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = read_source_file("/nonexistent/path/does-not-exist.fs");
        assert!(matches!(err, Err(CoreError::Io(_))));
    }
}
