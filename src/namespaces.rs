//! XML namespace handling
//!
//! This module provides qualified names (QNames) and the namespace → prefix
//! mapping used when rendering element names for the editor.

use crate::error::{Error, Result};
use crate::names::validate_ncname;
use indexmap::IndexMap;
use std::fmt;

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName; an empty namespace is treated as no namespace
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()).filter(|ns| !ns.is_empty()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self::new(Some(namespace), local_name)
    }

    /// Namespace URI, if any
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.local_name),
            None => write!(f, "{}", self.local_name),
        }
    }
}

/// Namespace → prefix mapping for display names.
///
/// Explicit prefixes are registered with [`PrefixMap::set_prefix`]. Any other
/// namespace receives a generated prefix (`ns0`, `ns1`, ...) the first time
/// it is looked up, so numbering follows first-encounter order.
#[derive(Debug, Clone, Default)]
pub struct PrefixMap {
    /// Mapping from namespace URI to prefix
    prefixes: IndexMap<NamespaceUri, Prefix>,
    /// Counter for generated prefixes
    generated: usize,
}

impl PrefixMap {
    /// Create a new empty prefix map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an explicit prefix for a namespace.
    ///
    /// An empty prefix renders names of that namespace unprefixed.
    pub fn set_prefix(
        &mut self,
        namespace: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Result<()> {
        let namespace = namespace.into();
        let prefix = prefix.into();
        if namespace.is_empty() {
            return Err(Error::Name(format!(
                "cannot assign prefix '{}' to the empty namespace",
                prefix
            )));
        }
        if !prefix.is_empty() {
            validate_ncname(&prefix)?;
        }
        self.prefixes.insert(namespace, prefix);
        Ok(())
    }

    /// Get the prefix for a namespace, generating one on first encounter
    pub fn prefix_for(&mut self, namespace: &str) -> &str {
        if !self.prefixes.contains_key(namespace) {
            let prefix = self.next_generated();
            self.prefixes.insert(namespace.to_string(), prefix);
        }
        &self.prefixes[namespace]
    }

    /// Render a qualified name as `prefix:local`, or `local` when unprefixed
    pub fn display_name(&mut self, name: &QName) -> String {
        match name.namespace() {
            None => name.local_name.clone(),
            Some(ns) => {
                let prefix = self.prefix_for(ns);
                if prefix.is_empty() {
                    name.local_name.clone()
                } else {
                    format!("{}:{}", prefix, name.local_name)
                }
            }
        }
    }

    /// Iterate over the assigned (namespace, prefix) pairs in assignment order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(ns, p)| (ns.as_str(), p.as_str()))
    }

    fn next_generated(&mut self) -> Prefix {
        loop {
            let candidate = format!("ns{}", self.generated);
            self.generated += 1;
            if !self.prefixes.values().any(|p| *p == candidate) {
                return candidate;
            }
        }
    }
}
