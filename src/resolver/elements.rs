//! Element resolution and the element registry

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, debug_span, trace};

use super::attributes::resolve_attribute;
use super::groups::GroupCache;
use super::model::SimpleElement;
use super::SchemaResolver;
use crate::error::Result;
use crate::namespaces::QName;
use crate::schema::{ElementId, ElementType, GroupId, Particle};

/// Registry entry for one element particle
#[derive(Debug, Clone)]
struct RegistryEntry {
    element: SimpleElement,
    /// Child set of the content model's group, if any
    group: Option<GroupId>,
    /// Element particles used directly as content
    direct_children: Vec<QName>,
}

/// Elements visited during one pass, in first-visit order
#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    entries: IndexMap<ElementId, RegistryEntry>,
}

impl ElementRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the particle has been visited
    pub fn contains(&self, id: ElementId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of visited elements
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been visited
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, id: ElementId, element: SimpleElement) {
        self.entries.insert(
            id,
            RegistryEntry {
                element,
                group: None,
                direct_children: Vec::new(),
            },
        );
    }

    fn entry_mut(&mut self, id: ElementId) -> Option<&mut RegistryEntry> {
        self.entries.get_mut(&id)
    }

    /// Freeze the registry once the group cache is closed: each element's
    /// children are its direct children followed by its group's children.
    pub fn finish(self, groups: &GroupCache) -> Vec<SimpleElement> {
        self.entries
            .into_values()
            .map(|entry| {
                let group_children = entry
                    .group
                    .and_then(|g| groups.get(g))
                    .into_iter()
                    .flat_map(|s| s.children());
                let children: IndexSet<QName> =
                    entry.direct_children.iter().chain(group_children).cloned().collect();
                SimpleElement {
                    children: children.into_iter().collect(),
                    ..entry.element
                }
            })
            .collect()
    }
}

impl<'s> SchemaResolver<'s> {
    /// Resolve an element particle and return its qualified name.
    ///
    /// References return the referenced name without an entry; the target
    /// is resolved when its own global declaration is visited.
    pub(crate) fn resolve_element(&mut self, id: ElementId, is_top_level: bool) -> Result<QName> {
        let schema = self.schema;
        let particle = schema.element(id);

        if let Some(reference) = &particle.reference {
            trace!(element = %reference, "element reference");
            return Ok(reference.clone());
        }
        if self.registry.contains(id) {
            trace!(element = %particle.name, "element already visited");
            return Ok(particle.name.clone());
        }

        let _span = debug_span!("element", name = %particle.name).entered();
        debug!(top_level = is_top_level, "resolving element");

        let mut element = SimpleElement::new(&particle.name, is_top_level);
        let complex_type = match particle.element_type {
            Some(ElementType::Complex(type_id)) => schema.complex_type(type_id),
            Some(ElementType::Simple) | None => {
                self.registry.insert(id, element);
                return Ok(particle.name.clone());
            }
        };

        element.attributes = complex_type.attribute_uses.iter().map(resolve_attribute).collect();
        self.registry.insert(id, element);

        match &complex_type.content {
            Particle::GroupRef { name, group } => {
                let group = self.resolve_group_ref(name, *group)?;
                if let Some(entry) = self.registry.entry_mut(id) {
                    entry.group = Some(group);
                }
            }
            Particle::Group(group) => {
                let group = self.resolve_group(*group)?;
                if let Some(entry) = self.registry.entry_mut(id) {
                    entry.group = Some(group);
                }
            }
            Particle::Element(child) => {
                let child = self.resolve_element(*child, false)?;
                if let Some(entry) = self.registry.entry_mut(id) {
                    entry.direct_children.push(child);
                }
            }
            Particle::Any | Particle::Empty => {}
            unsupported @ Particle::Unsupported { .. } => return Err(self.unsupported(unsupported)),
        }

        Ok(particle.name.clone())
    }
}
