//! Resource loading utilities
//!
//! This module handles loading of schema documents from their locations.

use crate::error::{Error, ParseError, Result};
use crate::limits::Limits;
use crate::locations::Location;
use std::fs;

/// Resource loader for schema documents
#[derive(Debug, Clone, Default)]
pub struct Loader {
    /// Resource limits
    limits: Limits,
}

impl Loader {
    /// Create a new loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Load a resource as a string
    pub fn load(&self, location: &Location) -> Result<String> {
        let content = match location {
            Location::Path(path) => fs::read_to_string(path).map_err(|e| {
                Error::SchemaLoad(
                    ParseError::new(format!("failed to read file: {}", e))
                        .with_location(path.display()),
                )
            })?,
            Location::Url(url) => {
                return Err(Error::SchemaLoad(
                    ParseError::new("remote schema locations are not supported").with_location(url),
                ))
            }
            Location::String(s) => s.clone(),
        };

        self.limits.check_schema_size(content.len())?;

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "<xs:schema/>").unwrap();

        let location = Location::Path(file.path().to_path_buf());
        let content = Loader::new().load(&location).unwrap();

        assert!(content.contains("<xs:schema/>"));
    }

    #[test]
    fn test_load_from_string() {
        let location = Location::String("<xs:schema/>".to_string());
        let content = Loader::new().load(&location).unwrap();

        assert_eq!(content, "<xs:schema/>");
    }

    #[test]
    fn test_missing_file_is_schema_load_error() {
        let location = Location::Path("/definitely/not/here.xsd".into());
        let err = Loader::new().load(&location).unwrap_err();
        assert!(matches!(err, Error::SchemaLoad(_)));
    }

    #[test]
    fn test_remote_location_refused() {
        let location = Location::resolve("https://example.com/schema.xsd", None);
        assert!(Loader::new().load(&location).is_err());
    }

    #[test]
    fn test_size_limit() {
        let limits = Limits {
            max_schema_size: 16,
            ..Limits::default()
        };
        let location = Location::String("x".repeat(17));
        let result = Loader::new().with_limits(limits).load(&location);

        assert!(result.is_err());
    }
}
