//! CodeMirror schema info serializer
//!
//! Renders resolved elements into the object consumed by CodeMirror's XML
//! hint addon:
//!
//! ```json
//! {
//!   "!top": ["top"],
//!   "top": { "attrs": { "lang": ["en", "de"], "note": null }, "children": ["animal"] },
//!   "animal": {}
//! }
//! ```
//!
//! Element names are rendered as `prefix:local` for namespaced elements.
//! Namespaces without an explicit prefix get `ns0`, `ns1`, ... in the order
//! they are first written.

use indexmap::{IndexMap, IndexSet};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::error::Result;
use crate::namespaces::PrefixMap;
use crate::resolver::SimpleElement;

/// Attributes and children of one rendered element
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ElementInfo {
    /// Attribute local name → allowed values (None for free-form)
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<String, Option<Vec<String>>>,
    /// Child display names
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub children: IndexSet<String>,
}

/// The complete hint object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaInfo {
    /// Display names of top-level elements
    pub top: IndexSet<String>,
    /// Elements by display name
    pub elements: IndexMap<String, ElementInfo>,
}

impl Serialize for SchemaInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let len = self.elements.len() + usize::from(!self.top.is_empty());
        let mut map = serializer.serialize_map(Some(len))?;
        if !self.top.is_empty() {
            map.serialize_entry("!top", &self.top)?;
        }
        for (name, info) in &self.elements {
            map.serialize_entry(name, info)?;
        }
        map.end()
    }
}

/// Serializer for resolved elements
#[derive(Debug, Clone)]
pub struct CodeMirrorSerializer<'e> {
    elements: &'e [SimpleElement],
    prefixes: PrefixMap,
    pretty: bool,
}

impl<'e> CodeMirrorSerializer<'e> {
    /// Create a serializer with pretty printing enabled
    pub fn new(elements: &'e [SimpleElement]) -> Self {
        Self {
            elements,
            prefixes: PrefixMap::new(),
            pretty: true,
        }
    }

    /// Assign a prefix to a namespace (empty prefix renders names unprefixed)
    pub fn set_prefix(&mut self, namespace: &str, prefix: &str) -> Result<()> {
        self.prefixes.set_prefix(namespace, prefix)
    }

    /// Set pretty printing
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Build the hint object. Elements rendering to the same display name
    /// are merged: first attribute declaration wins, children are unioned.
    pub fn schema_info(&mut self) -> SchemaInfo {
        let mut info = SchemaInfo::default();

        for element in self.elements.iter().filter(|e| e.is_top_level) {
            let name = self.prefixes.display_name(&element.qname());
            info.top.insert(name);
        }

        for element in self.elements {
            let name = self.prefixes.display_name(&element.qname());
            let children: Vec<String> = element
                .children
                .iter()
                .map(|child| self.prefixes.display_name(child))
                .collect();

            let entry = info.elements.entry(name).or_default();
            for attribute in &element.attributes {
                entry
                    .attrs
                    .entry(attribute.name.clone())
                    .or_insert_with(|| attribute.possible_values.clone());
            }
            entry.children.extend(children);
        }

        info
    }

    /// Render the hint object as JSON text
    pub fn to_json_string(&mut self) -> Result<String> {
        let info = self.schema_info();
        debug!(
            elements = info.elements.len(),
            top = info.top.len(),
            "serializing schema info"
        );
        let json = if self.pretty {
            serde_json::to_string_pretty(&info)?
        } else {
            serde_json::to_string(&info)?
        };
        Ok(json)
    }

    /// Prefixes in use after serialization, in assignment order
    pub fn prefixes(&self) -> &PrefixMap {
        &self.prefixes
    }
}
