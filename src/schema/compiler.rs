//! Compilation of schema documents into the particle graph
//!
//! Global components of every document are indexed by qualified name first
//! (first declaration wins), then the global elements are compiled in
//! document order, pulling in the types and groups they use. Named types and
//! groups are registered before their bodies are compiled, so recursive
//! references resolve to the same arena slot.
//!
//! Complex types are compiled in two phases. Phase one records each type's
//! own attribute uses, own content and derivation. Phase two walks the base
//! chains and computes effective attribute uses and content.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use roxmltree::{Document, Node, NodeId};
use tracing::{debug, trace, warn};

use super::loading::{parsing_options, SchemaText};
use super::{
    AttributeUse, CompiledSchema, ComplexType, Compositor, ElementId, ElementType, GroupId,
    ModelGroup, Particle, SchemaElement, TypeId, UseMode,
};
use crate::error::{Error, ParseError, Result};
use crate::limits::Limits;
use crate::locations::SourceLocation;
use crate::names::{is_valid_qname, split_qname};
use crate::namespaces::QName;
use crate::{XML_NAMESPACE, XSD_NAMESPACE};

/// XSD element local names
mod xsd_elements {
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const ATTRIBUTE_GROUP: &str = "attributeGroup";
    pub const GROUP: &str = "group";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const ANNOTATION: &str = "annotation";
    pub const RESTRICTION: &str = "restriction";
    pub const EXTENSION: &str = "extension";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
    pub const ENUMERATION: &str = "enumeration";
    pub const ANY: &str = "any";
    pub const ANY_ATTRIBUTE: &str = "anyAttribute";
    pub const ASSERT: &str = "assert";
}

use xsd_elements::*;

/// Identity of a node across the document set
type NodeKey = (usize, NodeId);

/// A schema node together with the index of the document it belongs to
#[derive(Debug, Clone, Copy)]
struct Decl<'a, 'i> {
    doc: usize,
    node: Node<'a, 'i>,
}

impl<'a, 'i> Decl<'a, 'i> {
    /// Another node of the same document
    fn with(self, node: Node<'a, 'i>) -> Self {
        Self { doc: self.doc, node }
    }

    fn key(self) -> NodeKey {
        (self.doc, self.node.id())
    }

    fn tag(self) -> &'i str {
        self.node.tag_name().name()
    }
}

/// XSD element children of a node
fn xsd_children<'a, 'i>(node: Node<'a, 'i>) -> impl Iterator<Item = Node<'a, 'i>> {
    node.children()
        .filter(|n| n.is_element() && n.tag_name().namespace() == Some(XSD_NAMESPACE))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Derivation {
    Extension,
    Restriction,
}

/// Phase-one view of a complex type
#[derive(Debug, Clone)]
struct TypeDraft {
    derivation: Option<(Derivation, TypeId)>,
    attributes: Vec<AttributeUse>,
    content: Particle,
}

impl Default for TypeDraft {
    fn default() -> Self {
        Self {
            derivation: None,
            attributes: Vec::new(),
            content: Particle::Empty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeState {
    Pending,
    InProgress,
    Done,
}

/// Compile a loaded document set
pub(crate) fn compile(documents: &[SchemaText], limits: &Limits) -> Result<CompiledSchema> {
    let parsed = documents
        .iter()
        .map(|d| {
            Document::parse_with_options(&d.text, parsing_options(limits)).map_err(|e| {
                Error::SchemaLoad(
                    ParseError::new(format!("malformed XML: {}", e))
                        .with_location(d.location.as_str()),
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut compiler = Compiler::new(documents);
    for (index, doc) in parsed.iter().enumerate() {
        compiler.index_document(index, doc);
    }
    compiler.compile_globals()?;
    compiler.finish()
}

struct Compiler<'a, 'i> {
    documents: &'a [SchemaText],

    // global declarations by name
    elements: IndexMap<QName, Decl<'a, 'i>>,
    types: IndexMap<QName, Decl<'a, 'i>>,
    groups: IndexMap<QName, Decl<'a, 'i>>,
    attributes: IndexMap<QName, Decl<'a, 'i>>,
    attribute_groups: IndexMap<QName, Decl<'a, 'i>>,

    schema: CompiledSchema,
    drafts: Vec<TypeDraft>,
    named_types: HashMap<QName, TypeId>,
    named_groups: HashMap<QName, GroupId>,
    element_types: HashMap<NodeKey, ElementType>,
    resolving_heads: HashSet<NodeKey>,
}

impl<'a, 'i> Compiler<'a, 'i> {
    fn new(documents: &'a [SchemaText]) -> Self {
        Self {
            documents,
            elements: IndexMap::new(),
            types: IndexMap::new(),
            groups: IndexMap::new(),
            attributes: IndexMap::new(),
            attribute_groups: IndexMap::new(),
            schema: CompiledSchema::default(),
            drafts: Vec::new(),
            named_types: HashMap::new(),
            named_groups: HashMap::new(),
            element_types: HashMap::new(),
            resolving_heads: HashSet::new(),
        }
    }

    fn index_document(&mut self, index: usize, doc: &'a Document<'i>) {
        let namespace = self.documents[index].target_namespace.clone();
        for node in xsd_children(doc.root_element()) {
            let Some(name) = node.attribute("name") else {
                continue;
            };
            let decl = Decl { doc: index, node };
            let name = QName::new(namespace.as_deref(), name);
            let map = match node.tag_name().name() {
                ELEMENT => &mut self.elements,
                COMPLEX_TYPE | SIMPLE_TYPE => &mut self.types,
                GROUP => &mut self.groups,
                ATTRIBUTE => &mut self.attributes,
                ATTRIBUTE_GROUP => &mut self.attribute_groups,
                _ => continue,
            };
            if map.contains_key(&name) {
                warn!(
                    kind = node.tag_name().name(),
                    name = %name,
                    "duplicate global declaration ignored"
                );
            } else {
                map.insert(name, decl);
            }
        }
    }

    fn compile_globals(&mut self) -> Result<()> {
        let globals: Vec<(QName, Decl<'a, 'i>)> = self
            .elements
            .iter()
            .map(|(n, d)| (n.clone(), *d))
            .collect();
        for (name, decl) in globals {
            trace!(element = %name, "compiling global element");
            let element_type = self.element_type(decl)?;
            let location = Some(self.location(decl));
            let id = self.push_element(SchemaElement {
                name,
                reference: None,
                element_type: Some(element_type),
                location,
            });
            self.schema.global_elements.push(id);
        }
        Ok(())
    }

    fn finish(mut self) -> Result<CompiledSchema> {
        let mut states = vec![TypeState::Pending; self.drafts.len()];
        for index in 0..self.drafts.len() {
            self.effective_type(TypeId(index), &mut states)?;
        }
        debug!(
            elements = self.schema.elements.len(),
            types = self.schema.types.len(),
            groups = self.schema.groups.len(),
            "compiled schema"
        );
        Ok(self.schema)
    }

    // ----- elements -----

    fn push_element(&mut self, element: SchemaElement) -> ElementId {
        let id = ElementId(self.schema.elements.len());
        self.schema.elements.push(element);
        id
    }

    fn local_element(&mut self, decl: Decl<'a, 'i>) -> Result<ElementId> {
        let location = Some(self.location(decl));

        if let Some(reference) = decl.node.attribute("ref") {
            let name = self.resolve_qname(decl, reference)?;
            if !self.elements.contains_key(&name) {
                return Err(self.undeclared("element", &name, decl));
            }
            return Ok(self.push_element(SchemaElement {
                name: name.clone(),
                reference: Some(name),
                element_type: None,
                location,
            }));
        }

        let local = decl
            .node
            .attribute("name")
            .ok_or_else(|| self.malformed("element without name or ref", decl))?;
        let name = QName::new(self.local_namespace(decl, "elementFormDefault"), local);
        let element_type = self.element_type(decl)?;
        Ok(self.push_element(SchemaElement {
            name,
            reference: None,
            element_type: Some(element_type),
            location,
        }))
    }

    /// Type of an element declaration: `type=`, inline type, the
    /// substitution group head's type, or `xs:anyType`
    fn element_type(&mut self, decl: Decl<'a, 'i>) -> Result<ElementType> {
        let key = decl.key();
        if let Some(element_type) = self.element_types.get(&key) {
            return Ok(*element_type);
        }

        let element_type = if let Some(type_name) = decl.node.attribute("type") {
            let name = self.resolve_qname(decl, type_name)?;
            self.named_type(&name, decl)?
        } else if let Some(inline) =
            xsd_children(decl.node).find(|n| n.tag_name().name() == COMPLEX_TYPE)
        {
            ElementType::Complex(self.anonymous_type(decl.with(inline))?)
        } else if xsd_children(decl.node).any(|n| n.tag_name().name() == SIMPLE_TYPE) {
            ElementType::Simple
        } else if let Some(head) = decl
            .node
            .attribute("substitutionGroup")
            .and_then(|s| s.split_whitespace().next())
        {
            let head_name = self.resolve_qname(decl, head)?;
            let head_decl = self
                .elements
                .get(&head_name)
                .copied()
                .ok_or_else(|| self.undeclared("element", &head_name, decl))?;
            if self.resolving_heads.insert(key) {
                let head_type = self.element_type(head_decl);
                self.resolving_heads.remove(&key);
                head_type?
            } else {
                warn!(element = %head_name, "circular substitution group, using xs:anyType");
                ElementType::Complex(self.any_type())
            }
        } else {
            ElementType::Complex(self.any_type())
        };

        self.element_types.insert(key, element_type);
        Ok(element_type)
    }

    // ----- types -----

    fn alloc_type(&mut self, name: Option<QName>, draft: TypeDraft) -> TypeId {
        let id = TypeId(self.schema.types.len());
        self.schema.types.push(ComplexType {
            name,
            attribute_uses: Vec::new(),
            content: Particle::Empty,
        });
        self.drafts.push(draft);
        id
    }

    fn any_type(&mut self) -> TypeId {
        let name = QName::namespaced(XSD_NAMESPACE, "anyType");
        if let Some(id) = self.named_types.get(&name) {
            return *id;
        }
        let draft = TypeDraft {
            content: Particle::Any,
            ..TypeDraft::default()
        };
        let id = self.alloc_type(Some(name.clone()), draft);
        self.named_types.insert(name, id);
        id
    }

    fn named_type(&mut self, name: &QName, decl: Decl<'a, 'i>) -> Result<ElementType> {
        if name.namespace() == Some(XSD_NAMESPACE) {
            return Ok(if name.local_name == "anyType" {
                ElementType::Complex(self.any_type())
            } else {
                ElementType::Simple
            });
        }
        if let Some(id) = self.named_types.get(name) {
            return Ok(ElementType::Complex(*id));
        }

        let type_decl = self
            .types
            .get(name)
            .copied()
            .ok_or_else(|| self.undeclared("type", name, decl))?;
        if type_decl.tag() != COMPLEX_TYPE {
            return Ok(ElementType::Simple);
        }

        trace!(type_name = %name, "compiling complex type");
        let id = self.alloc_type(Some(name.clone()), TypeDraft::default());
        self.named_types.insert(name.clone(), id);
        self.drafts[id.0] = self.complex_type_draft(type_decl)?;
        Ok(ElementType::Complex(id))
    }

    fn anonymous_type(&mut self, decl: Decl<'a, 'i>) -> Result<TypeId> {
        let id = self.alloc_type(None, TypeDraft::default());
        self.drafts[id.0] = self.complex_type_draft(decl)?;
        Ok(id)
    }

    /// Base of a derivation, if it is a user-defined complex type
    fn base_type(&mut self, name: &QName, decl: Decl<'a, 'i>) -> Result<Option<TypeId>> {
        if name.namespace() == Some(XSD_NAMESPACE) {
            return Ok(None);
        }
        match self.named_type(name, decl)? {
            ElementType::Complex(id) => Ok(Some(id)),
            ElementType::Simple => Ok(None),
        }
    }

    fn complex_type_draft(&mut self, decl: Decl<'a, 'i>) -> Result<TypeDraft> {
        let mut draft = TypeDraft::default();
        let mut body = decl;
        let mut simple_content = false;

        let content_model = xsd_children(decl.node)
            .find(|n| matches!(n.tag_name().name(), COMPLEX_CONTENT | SIMPLE_CONTENT));
        if let Some(content_model) = content_model {
            simple_content = content_model.tag_name().name() == SIMPLE_CONTENT;
            if let Some(derivation_node) = xsd_children(content_model)
                .find(|n| matches!(n.tag_name().name(), EXTENSION | RESTRICTION))
            {
                body = decl.with(derivation_node);
                let derivation = if derivation_node.tag_name().name() == EXTENSION {
                    Derivation::Extension
                } else {
                    Derivation::Restriction
                };
                if let Some(base) = derivation_node.attribute("base") {
                    let base_name = self.resolve_qname(body, base)?;
                    if let Some(base_id) = self.base_type(&base_name, body)? {
                        draft.derivation = Some((derivation, base_id));
                    }
                }
            }
        }

        if !simple_content {
            draft.content = self.content_particle(body)?;
        }
        self.collect_attributes(body, &mut draft.attributes, &mut HashSet::new())?;
        Ok(draft)
    }

    fn content_particle(&mut self, body: Decl<'a, 'i>) -> Result<Particle> {
        for child in xsd_children(body.node) {
            match child.tag_name().name() {
                ANNOTATION | ATTRIBUTE | ATTRIBUTE_GROUP | ANY_ATTRIBUTE | ASSERT | COMPLEX_CONTENT
                | SIMPLE_CONTENT => continue,
                _ => return self.particle(body.with(child)),
            }
        }
        Ok(Particle::Empty)
    }

    fn effective_type(&mut self, id: TypeId, states: &mut [TypeState]) -> Result<()> {
        match states[id.0] {
            TypeState::Done => return Ok(()),
            TypeState::InProgress => {
                let name = self.schema.types[id.0]
                    .name
                    .as_ref()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "anonymous".to_string());
                return Err(Error::schema(format!("circular derivation of type '{}'", name)));
            }
            TypeState::Pending => states[id.0] = TypeState::InProgress,
        }

        let draft = self.drafts[id.0].clone();
        let (attribute_uses, content) = match draft.derivation {
            None => (overlay(&[], &draft.attributes), draft.content),
            Some((derivation, base)) => {
                self.effective_type(base, states)?;
                let base_type = &self.schema.types[base.0];
                let attribute_uses = overlay(&base_type.attribute_uses, &draft.attributes);
                let content = match derivation {
                    Derivation::Restriction => draft.content,
                    Derivation::Extension => match (base_type.content.clone(), draft.content) {
                        (Particle::Empty, own) => own,
                        (base_content, Particle::Empty) => base_content,
                        (base_content, own) => {
                            let group = GroupId(self.schema.groups.len());
                            self.schema.groups.push(ModelGroup {
                                compositor: Compositor::Sequence,
                                particles: vec![base_content, own],
                                location: None,
                            });
                            Particle::Group(group)
                        }
                    },
                };
                (attribute_uses, content)
            }
        };

        let complex_type = &mut self.schema.types[id.0];
        complex_type.attribute_uses = attribute_uses;
        complex_type.content = content;
        states[id.0] = TypeState::Done;
        Ok(())
    }

    // ----- particles and groups -----

    fn particle(&mut self, decl: Decl<'a, 'i>) -> Result<Particle> {
        Ok(match decl.tag() {
            ELEMENT => Particle::Element(self.local_element(decl)?),
            SEQUENCE | CHOICE | ALL => {
                let id = self.alloc_group(decl);
                self.fill_group(id, decl)?;
                Particle::Group(id)
            }
            GROUP => {
                let reference = decl
                    .node
                    .attribute("ref")
                    .ok_or_else(|| self.malformed("group particle without ref", decl))?;
                let name = self.resolve_qname(decl, reference)?;
                let group = self.named_group(&name, decl)?;
                Particle::GroupRef { name, group }
            }
            ANY => Particle::Any,
            other => Particle::Unsupported {
                kind: other.to_string(),
                location: Some(self.location(decl)),
            },
        })
    }

    fn alloc_group(&mut self, decl: Decl<'a, 'i>) -> GroupId {
        let id = GroupId(self.schema.groups.len());
        self.schema.groups.push(ModelGroup {
            compositor: Compositor::from_tag(decl.tag()).unwrap_or(Compositor::Sequence),
            particles: Vec::new(),
            location: Some(self.location(decl)),
        });
        id
    }

    fn fill_group(&mut self, id: GroupId, decl: Decl<'a, 'i>) -> Result<()> {
        let mut particles = Vec::new();
        for child in xsd_children(decl.node) {
            if child.tag_name().name() == ANNOTATION {
                continue;
            }
            particles.push(self.particle(decl.with(child))?);
        }
        self.schema.groups[id.0].particles = particles;
        Ok(())
    }

    fn named_group(&mut self, name: &QName, decl: Decl<'a, 'i>) -> Result<GroupId> {
        if let Some(id) = self.named_groups.get(name) {
            return Ok(*id);
        }
        let group_decl = self
            .groups
            .get(name)
            .copied()
            .ok_or_else(|| self.undeclared("group", name, decl))?;

        trace!(group = %name, "compiling named group");
        let body = xsd_children(group_decl.node)
            .find(|n| Compositor::from_tag(n.tag_name().name()).is_some())
            .map(|n| group_decl.with(n));
        let id = self.alloc_group(body.unwrap_or(group_decl));
        self.named_groups.insert(name.clone(), id);
        if let Some(body) = body {
            self.fill_group(id, body)?;
        }
        Ok(id)
    }

    // ----- attributes -----

    fn collect_attributes(
        &self,
        decl: Decl<'a, 'i>,
        out: &mut Vec<AttributeUse>,
        expanding: &mut HashSet<QName>,
    ) -> Result<()> {
        for child in xsd_children(decl.node) {
            let child_decl = decl.with(child);
            match child.tag_name().name() {
                ATTRIBUTE => out.push(self.attribute_use(child_decl)?),
                ATTRIBUTE_GROUP => {
                    let Some(reference) = child.attribute("ref") else {
                        continue;
                    };
                    let name = self.resolve_qname(child_decl, reference)?;
                    let group = self
                        .attribute_groups
                        .get(&name)
                        .copied()
                        .ok_or_else(|| self.undeclared("attribute group", &name, child_decl))?;
                    if expanding.insert(name.clone()) {
                        self.collect_attributes(group, out, expanding)?;
                        expanding.remove(&name);
                    } else {
                        warn!(group = %name, "circular attribute group reference ignored");
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn attribute_use(&self, decl: Decl<'a, 'i>) -> Result<AttributeUse> {
        let use_mode = decl.node.attribute("use").and_then(UseMode::parse).unwrap_or_default();

        if let Some(reference) = decl.node.attribute("ref") {
            let name = self.resolve_qname(decl, reference)?;
            let enumeration = match self.attributes.get(&name).copied() {
                Some(global) => self.attribute_enumeration(global)?,
                // xml:lang, xml:space and friends without an imported declaration
                None if name.namespace() == Some(XML_NAMESPACE) => Vec::new(),
                None => return Err(self.undeclared("attribute", &name, decl)),
            };
            return Ok(AttributeUse {
                name,
                use_mode,
                enumeration,
            });
        }

        let local = decl
            .node
            .attribute("name")
            .ok_or_else(|| self.malformed("attribute without name or ref", decl))?;
        Ok(AttributeUse {
            name: QName::new(self.local_namespace(decl, "attributeFormDefault"), local),
            use_mode,
            enumeration: self.attribute_enumeration(decl)?,
        })
    }

    fn attribute_enumeration(&self, decl: Decl<'a, 'i>) -> Result<Vec<String>> {
        if let Some(type_name) = decl.node.attribute("type") {
            let name = self.resolve_qname(decl, type_name)?;
            if name.namespace() == Some(XSD_NAMESPACE) {
                return Ok(Vec::new());
            }
            let type_decl = self
                .types
                .get(&name)
                .copied()
                .ok_or_else(|| self.undeclared("type", &name, decl))?;
            return Ok(enumeration_facets(type_decl.node));
        }
        Ok(xsd_children(decl.node)
            .find(|n| n.tag_name().name() == SIMPLE_TYPE)
            .map(enumeration_facets)
            .unwrap_or_default())
    }

    // ----- names and locations -----

    fn resolve_qname(&self, decl: Decl<'a, 'i>, value: &str) -> Result<QName> {
        let value = value.trim();
        if !is_valid_qname(value) {
            return Err(self.malformed(&format!("invalid QName '{}'", value), decl));
        }
        let (prefix, local) = split_qname(value);
        let namespace = match prefix {
            Some("xml") => Some(XML_NAMESPACE.to_string()),
            Some(prefix) => Some(
                decl.node
                    .lookup_namespace_uri(Some(prefix))
                    .ok_or_else(|| {
                        self.malformed(&format!("unknown namespace prefix '{}'", prefix), decl)
                    })?
                    .to_string(),
            ),
            None => match decl.node.lookup_namespace_uri(None).filter(|ns| !ns.is_empty()) {
                Some(ns) => Some(ns.to_string()),
                None => {
                    let document = &self.documents[decl.doc];
                    if document.chameleon {
                        document.target_namespace.clone()
                    } else {
                        None
                    }
                }
            },
        };
        Ok(QName::new(namespace, local))
    }

    /// Namespace of a local element or attribute per `form` / `*FormDefault`
    fn local_namespace(&self, decl: Decl<'a, 'i>, form_default: &str) -> Option<String> {
        let qualified = match decl.node.attribute("form") {
            Some(form) => form == "qualified",
            None => {
                decl.node.document().root_element().attribute(form_default) == Some("qualified")
            }
        };
        if qualified {
            self.documents[decl.doc].target_namespace.clone()
        } else {
            None
        }
    }

    fn location(&self, decl: Decl<'a, 'i>) -> SourceLocation {
        let pos = decl.node.document().text_pos_at(decl.node.range().start);
        SourceLocation {
            file: self.documents[decl.doc].file.clone(),
            line: pos.row,
            column: pos.col,
        }
    }

    fn undeclared(&self, kind: &str, name: &QName, decl: Decl<'a, 'i>) -> Error {
        self.malformed(&format!("reference to undeclared {} '{}'", kind, name), decl)
    }

    fn malformed(&self, message: &str, decl: Decl<'a, 'i>) -> Error {
        Error::SchemaLoad(
            ParseError::new(message)
                .with_location(self.location(decl))
                .with_source(start_tag(decl.node)),
        )
    }
}

/// Source text of a node's start tag
fn start_tag<'i>(node: Node<'_, 'i>) -> &'i str {
    let text = node.document().input_text();
    let tag = &text[node.range()];
    match tag.find('>') {
        Some(end) => &tag[..=end],
        None => tag,
    }
}

/// Enumeration values declared directly on a simple type's restriction
fn enumeration_facets(simple_type: Node<'_, '_>) -> Vec<String> {
    xsd_children(simple_type)
        .filter(|n| n.tag_name().name() == RESTRICTION)
        .flat_map(|restriction| {
            xsd_children(restriction)
                .filter(|n| n.tag_name().name() == ENUMERATION)
                .filter_map(|n| n.attribute("value").map(str::to_string))
        })
        .collect()
}

/// Apply `own` attribute uses on top of inherited ones and drop prohibited uses
fn overlay(base: &[AttributeUse], own: &[AttributeUse]) -> Vec<AttributeUse> {
    let mut result = base.to_vec();
    for attribute in own {
        match result.iter().position(|a| a.name == attribute.name) {
            Some(index) => result[index] = attribute.clone(),
            None => result.push(attribute.clone()),
        }
    }
    result.retain(|a| a.use_mode != UseMode::Prohibited);
    result
}
