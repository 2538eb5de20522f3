//! Resource and source locations
//!
//! [`Location`] identifies where a schema document is loaded from (file path,
//! URL or in-memory text); [`SourceLocation`] points at a position inside a
//! loaded document and is used to describe schema components in errors.

use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Resource location - can be a URL, file path, or in-memory text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// File system path
    Path(PathBuf),
    /// Remote URL (http, https, ftp, etc.)
    Url(Url),
    /// In-memory schema text
    String(String),
}

impl Location {
    /// Resolve a `schemaLocation` attribute value relative to the directory of
    /// the document that contains it.
    ///
    /// `file:` URLs become paths; other URLs stay remote.
    pub fn resolve(schema_location: &str, base_dir: Option<&Path>) -> Self {
        if let Ok(url) = Url::parse(schema_location) {
            if url.scheme() == "file" {
                if let Ok(path) = url.to_file_path() {
                    return Location::Path(path);
                }
            } else if url.scheme().len() > 1 {
                // single-letter schemes are Windows drive letters
                return Location::Url(url);
            }
        }

        let path = Path::new(schema_location);
        if path.is_absolute() {
            return Location::Path(path.to_path_buf());
        }
        match base_dir {
            Some(base) => Location::Path(base.join(path)),
            None => Location::Path(path.to_path_buf()),
        }
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Url(u) => u.to_string(),
            Location::String(_) => "<string>".to_string(),
        }
    }

    /// Directory against which relative schema locations are resolved
    pub fn base_dir(&self) -> Option<&Path> {
        match self {
            Location::Path(p) => p.parent(),
            _ => None,
        }
    }

    /// Last path segment, used as the file part of source locations
    pub fn file_name(&self) -> Option<String> {
        match self {
            Location::Path(p) => p.file_name().map(|n| n.to_string_lossy().to_string()),
            Location::Url(u) => u
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(|s| s.to_string()),
            Location::String(_) => None,
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Url(_))
    }
}

/// Position of a schema component inside its document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// File name of the document, if it was loaded from a file
    pub file: Option<String>,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}:{}", file, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}
