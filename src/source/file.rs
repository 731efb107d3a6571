//! Source file access
//!
//! Line numbers are 1-based throughout.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A source file held in memory
#[derive(Debug, Clone)]
pub struct SourceFile {
    path: Option<PathBuf>,
    text: String,
    /// Byte offset of the start of each line
    line_starts: Vec<usize>,
}

impl SourceFile {
    /// Read a file from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::unavailable(path, e))?;
        let mut file = Self::from_string(text);
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Wrap in-memory source text
    pub fn from_string(text: impl Into<String>) -> Self {
        let text = text.into();
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .filter(|&start| start < text.len())
            .collect();

        Self {
            path: None,
            text,
            line_starts,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    fn unavailable(&self, reason: String) -> Error {
        Error::unavailable(self.path.clone().unwrap_or_default(), reason)
    }

    /// Text of one line, without its terminator
    pub fn line(&self, line: usize) -> Option<&str> {
        let start = *self.line_starts.get(line.checked_sub(1)?)?;
        let end = self
            .line_starts
            .get(line)
            .copied()
            .unwrap_or(self.text.len());
        Some(self.text[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Everything from the start of `line` to the end of the file
    pub fn from_line(&self, line: usize) -> Result<&str> {
        match line.checked_sub(1).and_then(|i| self.line_starts.get(i)) {
            Some(&start) => Ok(&self.text[start..]),
            None => Err(self.unavailable(format!(
                "line {line} is outside 1..={}",
                self.line_count()
            ))),
        }
    }

    /// First line of the comment block documenting `line`
    ///
    /// Comment lines directly above `line` are included, along with blank
    /// lines between them and `line`. Blank lines above the comment block
    /// are not.
    pub fn comment_start(&self, line: usize) -> usize {
        let mut start = 1;
        let mut in_comment = false;

        for number in 1..line.min(self.line_count() + 1) {
            let text = self.line(number).unwrap_or_default().trim();
            if text.starts_with('#') {
                in_comment = true;
            } else if text.is_empty() {
                if !in_comment {
                    start = number + 1;
                }
            } else {
                start = number + 1;
                in_comment = false;
            }
        }
        start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SOURCE: &str = "class Foo\n\n  # Adds.\n  #\n\n  def add(x)\n    x\n  end\nend\n";

    #[test]
    fn test_lines_are_one_based() {
        let file = SourceFile::from_string(SOURCE);
        assert_eq!(file.line_count(), 9);
        assert_eq!(file.line(1), Some("class Foo"));
        assert_eq!(file.line(6), Some("  def add(x)"));
        assert_eq!(file.line(0), None);
        assert_eq!(file.line(10), None);
    }

    #[test]
    fn test_from_line() {
        let file = SourceFile::from_string(SOURCE);
        assert_eq!(file.from_line(8).unwrap(), "  end\nend\n");
        assert!(matches!(
            file.from_line(10),
            Err(Error::SourceUnavailable { .. })
        ));
        assert!(file.from_line(0).is_err());
    }

    #[test]
    fn test_comment_start() {
        let file = SourceFile::from_string(SOURCE);
        // Comment block plus the blank line after it
        assert_eq!(file.comment_start(6), 3);
        assert_eq!(file.comment_start(1), 1);

        let file = SourceFile::from_string("x = 1\n\ndef a\nend\n");
        assert_eq!(file.comment_start(3), 3);
    }

    #[test]
    fn test_open() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "def a\nend\n").unwrap();
        let file = SourceFile::open(tmp.path()).unwrap();
        assert_eq!(file.line_count(), 2);
        assert_eq!(file.path(), Some(tmp.path()));

        let missing = SourceFile::open(tmp.path().join("missing.rb"));
        assert!(matches!(missing, Err(Error::SourceUnavailable { .. })));
    }

    #[test]
    fn test_no_trailing_newline() {
        let file = SourceFile::from_string("a\nb");
        assert_eq!(file.line_count(), 2);
        assert_eq!(file.line(2), Some("b"));
    }
}
