//! Output file descriptions and encodings.

use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::Result;

/// Destination the output thread writes to.
pub type Sink = Box<dyn Write + Send>;

/// Identity of a wire format, used as the key of an
/// [`OutputFactory`](crate::io::OutputFactory).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct Encoding(Cow<'static, str>);

impl Encoding {
    /// Line-oriented text records.
    pub const TEXT: Encoding = Encoding::from_static("text");

    /// Compact binary blocks with per-block string tables.
    pub const BLOCK: Encoding = Encoding::from_static("block");

    pub const fn from_static(name: &'static str) -> Self {
        Encoding(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Encoding(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file to write, together with the encoding to write it in.
///
/// Format detection is not done here; the encoding is always explicit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// `None` writes to stdout.
    path: Option<PathBuf>,
    encoding: Encoding,
    overwrite: bool,
}

impl OutputFile {
    /// A file at `path` in `encoding`. Existing files are not overwritten.
    pub fn new(path: impl Into<PathBuf>, encoding: Encoding) -> Self {
        Self {
            path: Some(path.into()),
            encoding,
            overwrite: false,
        }
    }

    /// Standard output in `encoding`.
    pub fn stdout(encoding: Encoding) -> Self {
        Self {
            path: None,
            encoding,
            overwrite: false,
        }
    }

    /// Allow replacing an existing file.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    /// Open the destination for writing.
    pub fn open_for_output(&self) -> Result<Sink> {
        let Some(path) = &self.path else {
            return Ok(Box::new(io::stdout()));
        };

        let file: File = if self.overwrite {
            File::create(path)?
        } else {
            OpenOptions::new().write(true).create_new(true).open(path)?
        };
        log::debug!("Opened {} for {} output", path.display(), self.encoding);
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_identity() {
        assert_eq!(Encoding::new("block"), Encoding::BLOCK);
        assert_ne!(Encoding::TEXT, Encoding::BLOCK);
        assert_eq!(Encoding::TEXT.to_string(), "text");
    }

    #[test]
    fn test_open_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        std::fs::write(&path, b"keep").unwrap();

        let file = OutputFile::new(&path, Encoding::TEXT);
        assert!(file.open_for_output().is_err());

        let file = file.with_overwrite(true);
        let mut sink = file.open_for_output().unwrap();
        sink.write_all(b"new").unwrap();
        drop(sink);
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}
