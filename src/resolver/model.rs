//! Flattened element model produced by the resolver

use crate::namespaces::QName;

/// An attribute reduced to what an editor needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleAttribute {
    /// Local name
    pub name: String,
    /// Namespace URI (None for unqualified attributes)
    pub namespace: Option<String>,
    /// Allowed values in facet order; None means any text
    pub possible_values: Option<Vec<String>>,
}

impl SimpleAttribute {
    /// Whether the attribute accepts free-form text
    pub fn is_free_form(&self) -> bool {
        self.possible_values.is_none()
    }
}

/// An element with its attributes and possible children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleElement {
    /// Local name
    pub name: String,
    /// Namespace URI (None for no namespace)
    pub namespace: Option<String>,
    /// Whether the element is declared at the top level of the schema
    pub is_top_level: bool,
    /// Attributes in declaration order
    pub attributes: Vec<SimpleAttribute>,
    /// Possible child elements, in declaration order without duplicates
    pub children: Vec<QName>,
}

impl SimpleElement {
    /// Create an element without attributes or children
    pub fn new(name: &QName, is_top_level: bool) -> Self {
        Self {
            name: name.local_name.clone(),
            namespace: name.namespace.clone(),
            is_top_level,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Qualified name of the element
    pub fn qname(&self) -> QName {
        QName::new(self.namespace.as_deref(), self.name.as_str())
    }
}
