//! Compiled schema model
//!
//! A [`CompiledSchema`] is the particle graph produced from one or more XSD
//! documents. Components live in arenas and refer to each other through
//! copyable ids, so recursive content models (a group that references
//! itself, a type whose children use the same type) are plain index cycles.
//!
//! Only what the resolver needs is modelled: elements, complex types with
//! their attribute uses and content particle, and model groups.

mod compiler;
mod loading;

use std::fmt;
use std::path::Path;

use crate::error::Result;
use crate::limits::Limits;
use crate::locations::{Location, SourceLocation};
use crate::namespaces::QName;

/// Identity of an element particle in the compiled schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) usize);

/// Identity of a complex type in the compiled schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

/// Identity of a model group (sequence/choice/all) in the compiled schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) usize);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type of an element declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// Simple type: no attributes, no children
    Simple,
    /// Complex type
    Complex(TypeId),
}

/// An element particle: a declaration (global or local) or a reference
#[derive(Debug, Clone)]
pub struct SchemaElement {
    /// Qualified name of the element
    pub name: QName,
    /// Target of a `ref=` particle
    pub reference: Option<QName>,
    /// Declared type (None for references)
    pub element_type: Option<ElementType>,
    /// Position in the schema source
    pub location: Option<SourceLocation>,
}

/// How an attribute may be used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UseMode {
    /// Attribute is optional
    #[default]
    Optional,
    /// Attribute is required
    Required,
    /// Attribute is prohibited (removes an inherited use)
    Prohibited,
}

impl UseMode {
    /// Parse the value of a `use` attribute
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "optional" => Some(Self::Optional),
            "required" => Some(Self::Required),
            "prohibited" => Some(Self::Prohibited),
            _ => None,
        }
    }
}

/// An attribute use of a complex type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUse {
    /// Qualified attribute name
    pub name: QName,
    /// Use mode
    pub use_mode: UseMode,
    /// Enumeration facet values of the attribute's type, in declaration order
    pub enumeration: Vec<String>,
}

/// A complex type with its effective attribute uses and content particle
#[derive(Debug, Clone)]
pub struct ComplexType {
    /// Type name (None for anonymous types)
    pub name: Option<QName>,
    /// Effective attribute uses, in declaration order (prohibited uses removed)
    pub attribute_uses: Vec<AttributeUse>,
    /// Effective content particle
    pub content: Particle,
}

/// Model group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compositor {
    /// xs:sequence
    Sequence,
    /// xs:choice
    Choice,
    /// xs:all
    All,
}

impl Compositor {
    /// Parse from an XSD element local name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sequence" => Some(Self::Sequence),
            "choice" => Some(Self::Choice),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Kind name used in particle descriptions
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Sequence => "Sequence",
            Self::Choice => "Choice",
            Self::All => "All",
        }
    }
}

/// A model group body
#[derive(Debug, Clone)]
pub struct ModelGroup {
    /// Compositor of the group
    pub compositor: Compositor,
    /// Sub-particles in declaration order
    pub particles: Vec<Particle>,
    /// Position in the schema source (None for synthesized groups)
    pub location: Option<SourceLocation>,
}

/// A node in a content model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Particle {
    /// Element declaration or reference
    Element(ElementId),
    /// Nested sequence/choice/all
    Group(GroupId),
    /// Reference to a named group (`xs:group ref=`), pointing at its body
    GroupRef {
        /// Name of the referenced group
        name: QName,
        /// Body of the referenced group
        group: GroupId,
    },
    /// Wildcard (`xs:any`)
    Any,
    /// Empty content
    Empty,
    /// A construct the resolver does not support
    Unsupported {
        /// Local name of the construct
        kind: String,
        /// Position in the schema source
        location: Option<SourceLocation>,
    },
}

impl Particle {
    /// Kind name of the particle
    pub fn kind_name(&self) -> &str {
        match self {
            Particle::Element(_) => "Element",
            Particle::Group(_) => "Group",
            Particle::GroupRef { .. } => "GroupRef",
            Particle::Any => "Any",
            Particle::Empty => "EmptyParticle",
            Particle::Unsupported { kind, .. } => kind,
        }
    }
}

/// Compiled, fully resolved schema
#[derive(Debug, Clone, Default)]
pub struct CompiledSchema {
    pub(crate) elements: Vec<SchemaElement>,
    pub(crate) types: Vec<ComplexType>,
    pub(crate) groups: Vec<ModelGroup>,
    pub(crate) global_elements: Vec<ElementId>,
}

impl CompiledSchema {
    /// Compile a schema from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::compile(&Location::Path(path.as_ref().to_path_buf()), None, &Limits::default())
    }

    /// Compile a schema from in-memory XSD text
    pub fn from_string(xsd: &str) -> Result<Self> {
        Self::compile(&Location::String(xsd.to_string()), None, &Limits::default())
    }

    /// Compile a schema from a location.
    ///
    /// `target_namespace` is the namespace the root document is expected to
    /// declare; a root document without a target namespace adopts it.
    pub fn compile(
        location: &Location,
        target_namespace: Option<&str>,
        limits: &Limits,
    ) -> Result<Self> {
        let documents = loading::load_documents(location, target_namespace, limits)?;
        compiler::compile(&documents, limits)
    }

    /// Global (top-level) elements in document order
    pub fn global_elements(&self) -> &[ElementId] {
        &self.global_elements
    }

    /// Get an element particle
    pub fn element(&self, id: ElementId) -> &SchemaElement {
        &self.elements[id.0]
    }

    /// Get a complex type
    pub fn complex_type(&self, id: TypeId) -> &ComplexType {
        &self.types[id.0]
    }

    /// Get a model group
    pub fn group(&self, id: GroupId) -> &ModelGroup {
        &self.groups[id.0]
    }

    /// Find the first global element with the given name
    pub fn global_element(&self, name: &QName) -> Option<ElementId> {
        self.global_elements
            .iter()
            .copied()
            .find(|id| self.element(*id).name == *name)
    }

    /// Describe an element particle for diagnostics
    pub fn describe_element(&self, id: ElementId) -> String {
        let element = self.element(id);
        let desc = format!("Element({})", element.name);
        describe(&desc, element.location.as_ref(), || format!("#{}", id.0))
    }

    /// Describe a model group for diagnostics
    pub fn describe_group(&self, id: GroupId) -> String {
        let group = self.group(id);
        describe(group.compositor.kind_name(), group.location.as_ref(), || id.to_string())
    }

    /// Describe any particle for diagnostics
    pub fn describe_particle(&self, particle: &Particle) -> String {
        match particle {
            Particle::Element(id) => self.describe_element(*id),
            Particle::Group(id) | Particle::GroupRef { group: id, .. } => self.describe_group(*id),
            Particle::Unsupported { kind, location } => {
                describe(kind, location.as_ref(), || "#?".to_string())
            }
            other => other.kind_name().to_string(),
        }
    }
}

/// `file:Kind:line:column`, `Kind:line:column`, or `Kind:<internal id>`
fn describe(
    kind: &str,
    location: Option<&SourceLocation>,
    internal_id: impl FnOnce() -> String,
) -> String {
    match location {
        Some(SourceLocation {
            file: Some(file),
            line,
            column,
        }) => format!("{}:{}:{}:{}", file, kind, line, column),
        Some(SourceLocation {
            file: None,
            line,
            column,
        }) => format!("{}:{}:{}", kind, line, column),
        None => format!("{}:{}", kind, internal_id()),
    }
}
