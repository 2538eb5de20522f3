//! Conversion settings

use indexmap::IndexMap;

use crate::limits::Limits;

/// Options for one schema conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Namespace the root schema is expected to declare (or adopt)
    pub target_namespace: Option<String>,
    /// Explicit namespace → prefix assignments, in registration order
    pub prefixes: IndexMap<String, String>,
    /// Pretty-print the JSON output
    pub pretty: bool,
    /// Resource limits
    pub limits: Limits,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_namespace: None,
            prefixes: IndexMap::new(),
            pretty: true,
            limits: Limits::default(),
        }
    }
}

impl Settings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target namespace
    pub fn with_target_namespace(mut self, namespace: Option<String>) -> Self {
        self.target_namespace = namespace;
        self
    }

    /// Assign a prefix to a namespace; a later assignment for the same
    /// namespace replaces the earlier one
    pub fn with_prefix(mut self, namespace: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.prefixes.insert(namespace.into(), prefix.into());
        self
    }

    /// Set pretty printing
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
