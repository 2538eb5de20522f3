//! Schema converters
//!
//! This module wires schema compilation, resolution and serialization into
//! a single conversion from an XSD document to CodeMirror hint JSON.

mod codemirror;

pub use codemirror::{CodeMirrorSerializer, ElementInfo, SchemaInfo};

use std::path::Path;

use tracing::info;

use crate::error::{Error, ParseError, Result};
use crate::locations::Location;
use crate::resolver::resolve_elements;
use crate::schema::CompiledSchema;
use crate::settings::Settings;

/// Resolution recurses along the schema's nesting depth; deeply nested
/// schemas overflow the default thread stack.
const STACK_SIZE: usize = 32 * 1024 * 1024;

/// Convert the schema at `path` to CodeMirror hint JSON
pub fn convert_file(path: impl AsRef<Path>, settings: &Settings) -> Result<String> {
    let location = Location::Path(path.as_ref().to_path_buf());
    let settings = settings.clone();
    on_large_stack(move || convert(&location, &settings))
}

/// Convert in-memory XSD text to CodeMirror hint JSON.
///
/// Relative `schemaLocation`s are resolved against the working directory.
pub fn convert_str(xsd: &str, settings: &Settings) -> Result<String> {
    let location = Location::String(xsd.to_string());
    let settings = settings.clone();
    on_large_stack(move || convert(&location, &settings))
}

/// Convert the schema at `location` on the current thread
pub fn convert(location: &Location, settings: &Settings) -> Result<String> {
    info!(schema = %location.as_str(), "converting schema");

    let schema = CompiledSchema::compile(
        location,
        settings.target_namespace.as_deref(),
        &settings.limits,
    )?;
    let elements = resolve_elements(&schema, &settings.limits)?;

    let mut serializer = CodeMirrorSerializer::new(&elements).with_pretty(settings.pretty);
    for (namespace, prefix) in &settings.prefixes {
        serializer.set_prefix(namespace, prefix)?;
    }
    serializer.to_json_string()
}

fn on_large_stack<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .stack_size(STACK_SIZE)
        .name("xsd2codemirror".to_string())
        .spawn(f)?;

    handle.join().map_err(|_| {
        Error::SchemaLoad(ParseError::new(
            "conversion thread panicked (possible stack overflow)",
        ))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;

    const XSD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t" xmlns:t="urn:t">
        <xs:element name="root"><xs:complexType><xs:sequence>
          <xs:element ref="t:leaf"/>
        </xs:sequence></xs:complexType></xs:element>
        <xs:element name="leaf" type="xs:string"/>
    </xs:schema>"#;

    #[test]
    fn test_convert_str_with_prefix() {
        let settings = Settings::new().with_pretty(false).with_prefix("urn:t", "t");
        let json = convert_str(XSD, &settings).unwrap();
        assert_eq!(
            json,
            r#"{"!top":["t:root","t:leaf"],"t:root":{"children":["t:leaf"]},"t:leaf":{}}"#
        );
    }

    #[test]
    fn test_invalid_prefix_is_name_error() {
        let settings = Settings::new().with_prefix("urn:t", "not a prefix");
        let err = convert_str(XSD, &settings).unwrap_err();
        assert_eq!(err.kind_name(), "NameError");
    }

    #[test]
    fn test_target_namespace_mismatch() {
        let settings = Settings::new().with_target_namespace(Some("urn:other".into()));
        let err = convert_str(XSD, &settings).unwrap_err();
        assert_eq!(err.kind_name(), "SchemaLoadError");
    }

    #[test]
    fn test_missing_file() {
        let err = convert_file("/no/such/schema.xsd", &Settings::new()).unwrap_err();
        assert_eq!(err.kind_name(), "SchemaLoadError");
    }
}
