//! Error types for xsd2codemirror
//!
//! This module defines all error types used throughout the library.
//! Every failure aborts the whole conversion; there is no partial output.

use std::fmt;
use thiserror::Error;

/// Result type alias using xsd2codemirror Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xsd2codemirror operations
#[derive(Error, Debug)]
pub enum Error {
    /// The schema could not be read or compiled
    #[error("could not compile schema: {0}")]
    SchemaLoad(#[from] ParseError),

    /// A particle kind outside the supported set was found in a content model
    #[error("unsupported schema construct '{kind}': {particle}")]
    UnsupportedConstruct {
        /// Kind of the offending particle (e.g. `openContent`)
        kind: String,
        /// Description of the particle (location or internal identifier)
        particle: String,
    },

    /// Group dependencies could not be closed
    #[error("there is a cycle in the schema, can't figure it out: {}", .groups.join(", "))]
    Cycle {
        /// Descriptions of every group particle left unresolved
        groups: Vec<String>,
    },

    /// Group dependencies were still open when the closure round limit hit
    #[error("closure round limit {rounds} reached, can't figure it out: {}", .groups.join(", "))]
    ClosureLimit {
        /// Rounds run before giving up
        rounds: usize,
        /// Descriptions of every group particle left unresolved
        groups: Vec<String>,
    },

    /// Name error (invalid prefix or NCName)
    #[error("name error: {0}")]
    Name(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable name of the error kind, as printed by the command line tool
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::SchemaLoad(_) => "SchemaLoadError",
            Error::UnsupportedConstruct { .. } => "UnsupportedConstructError",
            Error::Cycle { .. } | Error::ClosureLimit { .. } => "CycleError",
            Error::Name(_) => "NameError",
            Error::Io(_) => "IoError",
            Error::Json(_) => "JsonError",
        }
    }

    /// Shorthand for a schema load error with only a message
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Error::SchemaLoad(ParseError::new(message))
    }
}

/// XML Schema loading/compilation error
#[derive(Debug, Clone)]
pub struct ParseError {
    /// Error message
    pub message: String,
    /// Location in the schema file (`file:line:column`)
    pub location: Option<String>,
    /// Start tag of the schema component that caused the error
    pub source: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            source: None,
        }
    }

    /// Set the location
    pub fn with_location(mut self, location: impl fmt::Display) -> Self {
        self.location = Some(location.to_string());
        self
    }

    /// Set the source
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref loc) = self.location {
            write!(f, " (at {})", loc)?;
        }

        if let Some(ref src) = self.source {
            write!(f, "\n\nSource:\n{}", src)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new("Invalid schema syntax")
            .with_location("schema.xsd:42:10")
            .with_source("<xs:element name='invalid'/>");

        let msg = format!("{}", err);
        assert!(msg.contains("Invalid schema syntax"));
        assert!(msg.contains("(at schema.xsd:42:10)"));
        assert!(msg.contains("Source:"));
    }

    #[test]
    fn test_error_conversion() {
        let parse_err = ParseError::new("test");
        let err: Error = parse_err.into();
        assert!(matches!(err, Error::SchemaLoad(_)));
        assert_eq!(err.kind_name(), "SchemaLoadError");
    }

    #[test]
    fn test_cycle_error_lists_groups() {
        let err = Error::Cycle {
            groups: vec![
                "a.xsd:Sequence:3:5".to_string(),
                "a.xsd:Choice:9:7".to_string(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "there is a cycle in the schema, can't figure it out: \
             a.xsd:Sequence:3:5, a.xsd:Choice:9:7"
        );
        assert_eq!(err.kind_name(), "CycleError");
    }

    #[test]
    fn test_closure_limit_names_the_limit() {
        let err = Error::ClosureLimit {
            rounds: 100,
            groups: vec!["Sequence:2:3".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "closure round limit 100 reached, can't figure it out: Sequence:2:3"
        );
        assert_eq!(err.kind_name(), "CycleError");
    }

    #[test]
    fn test_unsupported_construct_display() {
        let err = Error::UnsupportedConstruct {
            kind: "openContent".to_string(),
            particle: "a.xsd:openContent:4:9".to_string(),
        };
        assert!(err.to_string().contains("'openContent'"));
        assert_eq!(err.kind_name(), "UnsupportedConstructError");
    }
}
