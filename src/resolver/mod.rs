//! Schema resolution
//!
//! Flattens a [`CompiledSchema`] into one [`SimpleElement`] per visited
//! element particle. Elements are visited depth-first starting from the
//! global elements. Element recursion stops at the registry (an element is
//! resolved once); group recursion is deferred as dependency edges between
//! [`GroupChildSet`]s and closed once every element has been visited.

mod attributes;
mod elements;
mod groups;
mod model;

pub use attributes::resolve_attribute;
pub use elements::ElementRegistry;
pub use groups::{GroupCache, GroupChildSet};
pub use model::{SimpleAttribute, SimpleElement};

use tracing::{debug, debug_span};

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::schema::{CompiledSchema, Particle};

/// One resolution pass over a compiled schema
#[derive(Debug)]
pub struct SchemaResolver<'s> {
    schema: &'s CompiledSchema,
    registry: ElementRegistry,
    groups: GroupCache,
    max_rounds: usize,
}

impl<'s> SchemaResolver<'s> {
    /// Create a resolver with default limits
    pub fn new(schema: &'s CompiledSchema) -> Self {
        Self {
            schema,
            registry: ElementRegistry::new(),
            groups: GroupCache::new(),
            max_rounds: Limits::default().max_closure_rounds,
        }
    }

    /// Set the limits
    pub fn with_limits(mut self, limits: &Limits) -> Self {
        self.max_rounds = limits.max_closure_rounds;
        self
    }

    /// Resolve every global element and return the flattened elements in
    /// first-visit order.
    pub fn resolve(mut self) -> Result<Vec<SimpleElement>> {
        let schema = self.schema;
        let _span = debug_span!("resolve").entered();

        for id in schema.global_elements() {
            self.resolve_element(*id, true)?;
        }

        debug!(
            elements = self.registry.len(),
            groups = self.groups.len(),
            "visited schema, closing group dependencies"
        );
        self.groups
            .close(self.max_rounds, |group| schema.describe_group(group))?;

        Ok(self.registry.finish(&self.groups))
    }

    pub(crate) fn unsupported(&self, particle: &Particle) -> Error {
        Error::UnsupportedConstruct {
            kind: particle.kind_name().to_string(),
            particle: self.schema.describe_particle(particle),
        }
    }
}

/// Resolve all elements of a compiled schema
pub fn resolve_elements(schema: &CompiledSchema, limits: &Limits) -> Result<Vec<SimpleElement>> {
    SchemaResolver::new(schema).with_limits(limits).resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces::QName;

    fn resolve(body: &str) -> Result<Vec<SimpleElement>> {
        let schema = CompiledSchema::from_string(&format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">{}</xs:schema>"#,
            body
        ))?;
        resolve_elements(&schema, &Limits::default())
    }

    fn find<'a>(elements: &'a [SimpleElement], name: &str) -> &'a SimpleElement {
        elements.iter().find(|e| e.name == name).unwrap()
    }

    fn child_names(element: &SimpleElement) -> Vec<&str> {
        element.children.iter().map(|c| c.local_name.as_str()).collect()
    }

    #[test]
    fn test_first_visit_order() {
        let elements = resolve(
            r#"<xs:element name="top"><xs:complexType><xs:sequence>
                 <xs:element name="a"/><xs:element name="b" type="xs:string"/>
               </xs:sequence></xs:complexType></xs:element>
               <xs:element name="other" type="xs:int"/>"#,
        )
        .unwrap();
        let names: Vec<_> = elements.iter().map(|e| (e.name.as_str(), e.is_top_level)).collect();
        assert_eq!(names, vec![("top", true), ("a", false), ("b", false), ("other", true)]);
        assert_eq!(child_names(&elements[0]), vec!["a", "b"]);
    }

    #[test]
    fn test_nested_groups_are_flattened() {
        let elements = resolve(
            r#"<xs:group name="inner"><xs:choice>
                 <xs:element ref="b"/><xs:element ref="a"/>
               </xs:choice></xs:group>
               <xs:element name="a" type="xs:string"/>
               <xs:element name="b" type="xs:string"/>
               <xs:element name="top"><xs:complexType><xs:sequence>
                 <xs:element ref="a"/>
                 <xs:group ref="inner"/>
                 <xs:choice><xs:element name="c"/><xs:any/></xs:choice>
               </xs:sequence></xs:complexType></xs:element>"#,
        )
        .unwrap();
        assert_eq!(child_names(find(&elements, "top")), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_shared_group_resolves_once() {
        let schema = CompiledSchema::from_string(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:group name="g"><xs:sequence><xs:element name="x"/></xs:sequence></xs:group>
                 <xs:element name="one"><xs:complexType><xs:group ref="g"/></xs:complexType></xs:element>
                 <xs:element name="two"><xs:complexType><xs:group ref="g"/></xs:complexType></xs:element>
               </xs:schema>"#,
        )
        .unwrap();
        let mut resolver = SchemaResolver::new(&schema);
        for id in schema.global_elements() {
            resolver.resolve_element(*id, true).unwrap();
        }
        assert_eq!(resolver.groups.len(), 1);

        let elements = resolver.resolve().unwrap();
        assert_eq!(child_names(find(&elements, "one")), vec!["x"]);
        assert_eq!(child_names(find(&elements, "two")), vec!["x"]);
    }

    #[test]
    fn test_recursive_elements_terminate() {
        let elements = resolve(
            r#"<xs:element name="list"><xs:complexType><xs:sequence>
                 <xs:element ref="item"/>
               </xs:sequence></xs:complexType></xs:element>
               <xs:element name="item"><xs:complexType><xs:choice>
                 <xs:element ref="list"/><xs:element ref="item"/>
               </xs:choice></xs:complexType></xs:element>"#,
        )
        .unwrap();
        assert_eq!(child_names(find(&elements, "list")), vec!["item"]);
        assert_eq!(child_names(find(&elements, "item")), vec!["list", "item"]);
    }

    #[test]
    fn test_group_cycle_is_an_error() {
        let err = resolve(
            r#"<xs:group name="a"><xs:sequence><xs:element name="x"/><xs:group ref="b"/></xs:sequence></xs:group>
               <xs:group name="b"><xs:choice><xs:group ref="a"/></xs:choice></xs:group>
               <xs:element name="e"><xs:complexType><xs:group ref="a"/></xs:complexType></xs:element>"#,
        )
        .unwrap_err();
        match err {
            Error::Cycle { groups } => {
                assert_eq!(groups.len(), 2);
                assert!(groups[0].starts_with("Sequence:"), "{:?}", groups);
                assert!(groups[1].starts_with("Choice:"), "{:?}", groups);
            }
            other => panic!("expected a cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_unreferenced_cycle_is_reported() {
        // the cycle hangs off an element that is only reachable from a
        // second top-level element
        let err = resolve(
            r#"<xs:group name="loop"><xs:sequence><xs:group ref="loop"/></xs:sequence></xs:group>
               <xs:element name="plain" type="xs:string"/>
               <xs:element name="looping"><xs:complexType><xs:sequence>
                 <xs:element name="inner"><xs:complexType><xs:group ref="loop"/></xs:complexType></xs:element>
               </xs:sequence></xs:complexType></xs:element>"#,
        )
        .unwrap_err();
        assert_eq!(err.kind_name(), "CycleError");
    }

    #[test]
    fn test_unsupported_particle() {
        let err = resolve(
            r#"<xs:element name="e"><xs:complexType><xs:sequence>
                 <xs:element name="ok"/><xs:openContent/>
               </xs:sequence></xs:complexType></xs:element>"#,
        )
        .unwrap_err();
        match err {
            Error::UnsupportedConstruct { kind, particle } => {
                assert_eq!(kind, "openContent");
                assert!(particle.starts_with("openContent:"), "{}", particle);
            }
            other => panic!("expected unsupported construct, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_direct_content() {
        let err = resolve(
            r#"<xs:element name="e"><xs:complexType><xs:openContent/></xs:complexType></xs:element>"#,
        )
        .unwrap_err();
        assert_eq!(err.kind_name(), "UnsupportedConstructError");
    }

    #[test]
    fn test_attributes_resolved() {
        let elements = resolve(
            r#"<xs:element name="e"><xs:complexType>
                 <xs:attribute name="kind"><xs:simpleType><xs:restriction base="xs:string">
                   <xs:enumeration value="x"/><xs:enumeration value="y"/>
                 </xs:restriction></xs:simpleType></xs:attribute>
                 <xs:attribute name="note" type="xs:string"/>
               </xs:complexType></xs:element>"#,
        )
        .unwrap();
        let e = find(&elements, "e");
        assert_eq!(e.attributes.len(), 2);
        assert_eq!(e.attributes[0].possible_values, Some(vec!["x".to_string(), "y".to_string()]));
        assert!(e.attributes[1].is_free_form());
        assert!(e.children.is_empty());
        assert_eq!(e.qname(), QName::local("e"));
    }
}
