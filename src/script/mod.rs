//! Script loading.
//!
//! A script is a plain text file with one command per line. It is read in
//! full before a run starts; the executor never re-opens the file.

pub mod classify;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

pub use classify::{Classification, DelayTier, classify};

const UTF8_BOM: char = '\u{feff}';

/// Failures that prevent a batch from starting.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The name did not resolve in any search location.
    #[error("script not found: {name}")]
    NotFound { name: String },
    /// The file resolved but could not be read.
    #[error("failed to read script {}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An ordered, immutable sequence of raw script lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    path: PathBuf,
    lines: Vec<String>,
}

impl Script {
    /// Read the whole file and split it into lines.
    ///
    /// Invalid UTF-8 is replaced rather than rejected, and a leading byte
    /// order mark is dropped.
    pub fn load(path: &Path) -> Result<Self, ExecError> {
        let bytes = std::fs::read(path).map_err(|source| ExecError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = String::from_utf8_lossy(&bytes);
        let text = decoded.strip_prefix(UTF8_BOM).unwrap_or(&*decoded);

        let script = Self::from_text(path, text);
        debug!(
            path = %path.display(),
            lines = script.lines.len(),
            "script loaded"
        );
        Ok(script)
    }

    /// Build a script from in-memory text.
    ///
    /// `\n`, `\r\n` and a lone `\r` all end a line; a final line break does
    /// not add an empty line.
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: split_lines(text),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used in notices and logs.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn split_lines(text: &str) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let mut lines: Vec<String> = normalized
        .split(['\n', '\r'])
        .map(str::to_string)
        .collect();
    if normalized.is_empty() || normalized.ends_with(['\n', '\r']) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn load_preserves_line_order_and_raw_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wolves.txt");
        fs::write(&path, "# pack\n\n  spawn Wolf  \r\necho done\n").unwrap();

        let script = Script::load(&path).unwrap();
        assert_eq!(
            script.lines(),
            ["# pack", "", "  spawn Wolf  ", "echo done"]
        );
        assert_eq!(script.name(), "wolves.txt");
        assert_eq!(script.path(), path.as_path());
    }

    #[test]
    fn load_without_trailing_newline_keeps_last_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("one.txt");
        fs::write(&path, "spawn Boar").unwrap();

        let script = Script::load(&path).unwrap();
        assert_eq!(script.lines(), ["spawn Boar"]);
    }

    #[test]
    fn load_strips_byte_order_mark() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bom.txt");
        fs::write(&path, "\u{feff}spawn Neck\n").unwrap();

        let script = Script::load(&path).unwrap();
        assert_eq!(script.lines(), ["spawn Neck"]);
    }

    #[test]
    fn load_replaces_invalid_utf8() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("latin1.txt");
        fs::write(&path, b"echo caf\xe9\nspawn Troll\n").unwrap();

        let script = Script::load(&path).unwrap();
        assert_eq!(script.len(), 2);
        assert_eq!(script.lines()[1], "spawn Troll");
    }

    #[test]
    fn load_missing_file_is_a_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vanished.txt");

        let err = Script::load(&path).unwrap_err();
        match err {
            ExecError::Load { path: failed, source } => {
                assert_eq!(failed, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected load error, got {other:?}"),
        }
    }

    #[test]
    fn lone_carriage_returns_end_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("classic-mac.txt");
        fs::write(&path, "echo hi\rspawn Wolf\r").unwrap();

        let script = Script::load(&path).unwrap();
        assert_eq!(script.lines(), ["echo hi", "spawn Wolf"]);
    }

    #[test]
    fn mixed_line_endings_keep_blank_lines() {
        let script = Script::from_text("mixed.txt", "a\r\n\rb\n\nc");
        assert_eq!(script.lines(), ["a", "", "b", "", "c"]);

        let script = Script::from_text("trailing.txt", "a\r\n\r\n");
        assert_eq!(script.lines(), ["a", ""]);
    }

    #[test]
    fn empty_file_is_an_empty_script() {
        let script = Script::from_text("empty.txt", "");
        assert!(script.is_empty());
    }
}
