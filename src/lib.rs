//! # xsd2codemirror
//!
//! Converts an XML Schema (XSD) into the schema-info JSON object used by
//! CodeMirror's XML autocompletion: for every element, its attributes (with
//! enumerated values where the schema declares them) and its possible
//! children, plus the list of top-level elements.
//!
//! ## Pipeline
//!
//! 1. [`schema`] loads the root document and everything it includes or
//!    imports, and compiles it into a particle graph.
//! 2. [`resolver`] flattens the graph into one element record per element
//!    particle. Recursive and mutually recursive groups are handled by
//!    deferring group dependencies and closing them afterwards; a group that
//!    (transitively) contains only itself is reported as a cycle.
//! 3. [`converters`] renders the records as JSON.
//!
//! ## Example
//!
//! ```rust,no_run
//! use xsd2codemirror::{convert_file, Settings};
//!
//! let settings = Settings::new().with_prefix("http://www.tei-c.org/ns/1.0", "");
//! let json = convert_file("tei.xsd", &settings)?;
//! println!("{}", json);
//! # Ok::<(), xsd2codemirror::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod limits;
pub mod settings;

// Utilities
pub mod namespaces;
pub mod names;
pub mod locations;

// Resource loading and compilation
pub mod loaders;
pub mod schema;

// Resolution and output
pub mod resolver;
pub mod converters;

// Re-exports for convenience
pub use converters::{convert, convert_file, convert_str};
pub use error::{Error, Result};
pub use limits::Limits;
pub use namespaces::QName;
pub use resolver::{resolve_elements, SimpleAttribute, SimpleElement};
pub use schema::CompiledSchema;
pub use settings::Settings;

/// Version of the xsd2codemirror library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD namespace
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XML namespace (bound to the `xml` prefix)
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";
