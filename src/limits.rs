//! Limits and constraints for schema conversion
//!
//! This module defines limits that keep a conversion bounded: the size of
//! each schema document, how many documents an include/import graph may
//! pull in, and how many rounds the group dependency closure may run.

use crate::error::{Error, ParseError, Result};

/// Global limits configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum size of a single schema document in bytes
    pub max_schema_size: usize,

    /// Maximum number of XML nodes in a single schema document
    pub max_schema_nodes: u32,

    /// Maximum number of schema documents (root + includes + imports)
    pub max_schema_documents: usize,

    /// Maximum number of rounds for the group dependency closure
    pub max_closure_rounds: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_schema_size: 100 * 1024 * 1024, // 100 MB
            max_schema_nodes: u32::MAX,
            max_schema_documents: 1000,
            max_closure_rounds: 100,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_schema_size: 10 * 1024 * 1024, // 10 MB
            max_schema_nodes: 1_000_000,
            max_schema_documents: 100,
            max_closure_rounds: 100,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_schema_size: 1024 * 1024 * 1024, // 1 GB
            max_schema_nodes: u32::MAX,
            max_schema_documents: 100_000,
            max_closure_rounds: 10_000,
        }
    }

    /// Check if a schema document size is within limits
    pub fn check_schema_size(&self, size: usize) -> Result<()> {
        if size > self.max_schema_size {
            Err(Error::SchemaLoad(ParseError::new(format!(
                "schema size {} bytes exceeds maximum {} bytes",
                size, self.max_schema_size
            ))))
        } else {
            Ok(())
        }
    }

    /// Check if the number of loaded schema documents is within limits
    pub fn check_schema_documents(&self, count: usize) -> Result<()> {
        if count > self.max_schema_documents {
            Err(Error::SchemaLoad(ParseError::new(format!(
                "schema document count {} exceeds maximum {}",
                count, self.max_schema_documents
            ))))
        } else {
            Ok(())
        }
    }
}
