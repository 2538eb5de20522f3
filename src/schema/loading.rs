//! Discovery of the schema document set
//!
//! Starting from the root document, `xs:include`, `xs:import` and
//! `xs:redefine` references are followed with an iterative worklist so deep
//! include chains cannot exhaust the stack. Every document is read once.
//! Only the root document is mandatory: a referenced document that cannot be
//! loaded or does not fit its namespace is skipped with a warning.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;

use roxmltree::{Document, ParsingOptions};
use tracing::{debug, warn};

use crate::error::{Error, ParseError, Result};
use crate::limits::Limits;
use crate::loaders::Loader;
use crate::locations::Location;
use crate::XSD_NAMESPACE;

/// One loaded schema document
#[derive(Debug, Clone)]
pub(crate) struct SchemaText {
    /// Where the document was loaded from
    pub location: Location,
    /// File name used in source locations
    pub file: Option<String>,
    /// Document text
    pub text: String,
    /// Namespace the document's global components belong to. Differs from
    /// the declared `targetNamespace` for chameleon includes and for a root
    /// document that adopted the requested namespace.
    pub target_namespace: Option<String>,
    /// Whether unprefixed references map to `target_namespace` even though
    /// the document declares no target namespace
    pub chameleon: bool,
}

/// How a queued document was reached
#[derive(Debug, Clone)]
enum Origin {
    /// The root document, with the namespace requested by the caller
    Root(Option<String>),
    /// `xs:include` or `xs:redefine` from a document of the given namespace
    Include(Option<String>),
    /// `xs:import` with the given `namespace` attribute
    Import(Option<String>),
}

/// Pending document for iterative processing
struct PendingDocument {
    location: Location,
    origin: Origin,
}

/// XML parsing options shared by discovery and compilation
pub(crate) fn parsing_options(limits: &Limits) -> ParsingOptions {
    ParsingOptions {
        allow_dtd: true,
        nodes_limit: limits.max_schema_nodes,
        ..Default::default()
    }
}

/// Load the root document and everything it transitively references
pub(crate) fn load_documents(
    location: &Location,
    target_namespace: Option<&str>,
    limits: &Limits,
) -> Result<Vec<SchemaText>> {
    let loader = Loader::new().with_limits(limits.clone());
    let mut loaded: HashSet<PathBuf> = HashSet::new();
    let mut documents: Vec<SchemaText> = Vec::new();

    let mut pending: VecDeque<PendingDocument> = VecDeque::new();
    pending.push_back(PendingDocument {
        location: location.clone(),
        origin: Origin::Root(target_namespace.map(str::to_string)),
    });

    while let Some(work) = pending.pop_front() {
        if let Location::Path(path) = &work.location {
            let key = path.canonicalize().unwrap_or_else(|_| path.clone());
            if !loaded.insert(key) {
                continue;
            }
        }

        let is_root = matches!(work.origin, Origin::Root(_));
        match load_document(&loader, &work, limits) {
            Ok((document, references)) => {
                debug!(
                    location = %document.location.as_str(),
                    namespace = document.target_namespace.as_deref().unwrap_or(""),
                    "loaded schema document"
                );
                pending.extend(references);
                documents.push(document);
                limits.check_schema_documents(documents.len())?;
            }
            Err(e) if is_root => return Err(e),
            Err(e) => {
                warn!(location = %work.location.as_str(), "skipping schema document: {}", e);
            }
        }
    }

    Ok(documents)
}

/// Load one document, check its namespace against how it was reached and
/// collect the documents it references.
fn load_document(
    loader: &Loader,
    work: &PendingDocument,
    limits: &Limits,
) -> Result<(SchemaText, Vec<PendingDocument>)> {
    let text = loader.load(&work.location)?;
    let file = work.location.file_name();
    let doc_location = || file.clone().unwrap_or_else(|| work.location.as_str());

    let doc = Document::parse_with_options(&text, parsing_options(limits)).map_err(|e| {
        Error::SchemaLoad(
            ParseError::new(format!("malformed XML: {}", e)).with_location(doc_location()),
        )
    })?;
    let root = doc.root_element();
    if root.tag_name().name() != "schema" || root.tag_name().namespace() != Some(XSD_NAMESPACE) {
        return Err(Error::SchemaLoad(
            ParseError::new(format!(
                "expected xs:schema root element, got '{}'",
                root.tag_name().name()
            ))
            .with_location(doc_location()),
        ));
    }

    let declared = root.attribute("targetNamespace").filter(|ns| !ns.is_empty());
    let (target_namespace, chameleon) = match (&work.origin, declared) {
        (Origin::Root(None), declared) => (declared.map(str::to_string), false),
        (Origin::Root(Some(requested)), None) => (Some(requested.clone()), true),
        (Origin::Root(Some(requested)), Some(declared)) => {
            if requested != declared {
                return Err(Error::SchemaLoad(
                    ParseError::new(format!(
                        "schema target namespace '{}' does not match requested namespace '{}'",
                        declared, requested
                    ))
                    .with_location(doc_location()),
                ));
            }
            (Some(declared.to_string()), false)
        }
        (Origin::Include(parent), None) => (parent.clone(), parent.is_some()),
        (Origin::Include(parent), Some(declared)) => {
            if parent.as_deref() != Some(declared) {
                return Err(Error::schema(format!(
                    "included schema namespace '{}' differs from '{}'",
                    declared,
                    parent.as_deref().unwrap_or("")
                )));
            }
            (Some(declared.to_string()), false)
        }
        (Origin::Import(expected), declared) => {
            if expected.as_deref() != declared {
                return Err(Error::schema(format!(
                    "imported schema namespace '{}' differs from import namespace '{}'",
                    declared.unwrap_or(""),
                    expected.as_deref().unwrap_or("")
                )));
            }
            (declared.map(str::to_string), false)
        }
    };

    let base_dir = work.location.base_dir();
    let mut references = Vec::new();
    for child in root
        .children()
        .filter(|n| n.is_element() && n.tag_name().namespace() == Some(XSD_NAMESPACE))
    {
        let origin = match child.tag_name().name() {
            "include" => Origin::Include(target_namespace.clone()),
            "redefine" => {
                warn!(
                    location = %doc_location(),
                    "xs:redefine is loaded as an include; redefinitions are not applied"
                );
                Origin::Include(target_namespace.clone())
            }
            "import" => Origin::Import(child.attribute("namespace").map(str::to_string)),
            _ => continue,
        };
        let Some(schema_location) = child.attribute("schemaLocation") else {
            debug!(
                location = %doc_location(),
                "{} without schemaLocation ignored",
                child.tag_name().name()
            );
            continue;
        };
        references.push(PendingDocument {
            location: Location::resolve(schema_location, base_dir),
            origin,
        });
    }

    drop(doc);
    Ok((
        SchemaText {
            location: work.location.clone(),
            file,
            text,
            target_namespace,
            chameleon,
        },
        references,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const XS: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

    fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_root_only() {
        let xsd = format!(r#"<xs:schema {XS} targetNamespace="urn:a"/>"#);
        let docs = load_documents(&Location::String(xsd), None, &Limits::default()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].target_namespace.as_deref(), Some("urn:a"));
        assert!(!docs[0].chameleon);
    }

    #[test]
    fn test_root_not_a_schema() {
        let err = load_documents(&Location::String("<root/>".into()), None, &Limits::default())
            .unwrap_err();
        assert!(matches!(err, Error::SchemaLoad(_)));
    }

    #[test]
    fn test_malformed_root() {
        let err = load_documents(&Location::String("<xs:schema".into()), None, &Limits::default())
            .unwrap_err();
        assert!(matches!(err, Error::SchemaLoad(_)));
    }

    #[test]
    fn test_requested_namespace_adopted() {
        let xsd = format!(r#"<xs:schema {XS}/>"#);
        let docs =
            load_documents(&Location::String(xsd), Some("urn:x"), &Limits::default()).unwrap();
        assert_eq!(docs[0].target_namespace.as_deref(), Some("urn:x"));
        assert!(docs[0].chameleon);
    }

    #[test]
    fn test_requested_namespace_mismatch() {
        let xsd = format!(r#"<xs:schema {XS} targetNamespace="urn:a"/>"#);
        assert!(load_documents(&Location::String(xsd), Some("urn:b"), &Limits::default()).is_err());
    }

    #[test]
    fn test_include_chain_loaded_once() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "b.xsd",
            &format!(r#"<xs:schema {XS}><xs:include schemaLocation="a.xsd"/></xs:schema>"#),
        );
        let root = write(
            &dir,
            "a.xsd",
            &format!(
                r#"<xs:schema {XS} targetNamespace="urn:a">
                     <xs:include schemaLocation="b.xsd"/>
                   </xs:schema>"#
            ),
        );

        let docs = load_documents(&Location::Path(root), None, &Limits::default()).unwrap();
        assert_eq!(docs.len(), 2);
        // b.xsd declares no namespace and adopts the includer's
        assert_eq!(docs[1].target_namespace.as_deref(), Some("urn:a"));
        assert!(docs[1].chameleon);
        assert_eq!(docs[1].file.as_deref(), Some("b.xsd"));
    }

    #[test]
    fn test_missing_include_is_skipped() {
        let dir = TempDir::new().unwrap();
        let root = write(
            &dir,
            "a.xsd",
            &format!(r#"<xs:schema {XS}><xs:include schemaLocation="missing.xsd"/></xs:schema>"#),
        );
        let docs = load_documents(&Location::Path(root), None, &Limits::default()).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_import_namespace_checked() {
        let dir = TempDir::new().unwrap();
        write(&dir, "good.xsd", &format!(r#"<xs:schema {XS} targetNamespace="urn:b"/>"#));
        write(&dir, "bad.xsd", &format!(r#"<xs:schema {XS} targetNamespace="urn:c"/>"#));
        let root = write(
            &dir,
            "a.xsd",
            &format!(
                r#"<xs:schema {XS} targetNamespace="urn:a">
                    <xs:import namespace="urn:b" schemaLocation="good.xsd"/>
                    <xs:import namespace="urn:b" schemaLocation="bad.xsd"/>
                    <xs:import namespace="urn:d"/>
                </xs:schema>"#
            ),
        );

        let docs = load_documents(&Location::Path(root), None, &Limits::default()).unwrap();
        let namespaces: Vec<_> = docs.iter().map(|d| d.target_namespace.clone()).collect();
        assert_eq!(namespaces, vec![Some("urn:a".to_string()), Some("urn:b".to_string())]);
    }

    #[test]
    fn test_document_limit() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.xsd", &format!(r#"<xs:schema {XS}/>"#));
        let root = write(
            &dir,
            "a.xsd",
            &format!(r#"<xs:schema {XS}><xs:include schemaLocation="b.xsd"/></xs:schema>"#),
        );
        let limits = Limits {
            max_schema_documents: 1,
            ..Limits::default()
        };
        assert!(load_documents(&Location::Path(root), None, &limits).is_err());
    }
}
