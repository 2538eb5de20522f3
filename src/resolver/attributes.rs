//! Attribute resolution

use crate::schema::AttributeUse;

use super::model::SimpleAttribute;

/// Convert an attribute use into a [`SimpleAttribute`].
///
/// Enumeration values keep their facet order and are not deduplicated. An
/// attribute without enumeration facets is free-form.
pub fn resolve_attribute(attribute: &AttributeUse) -> SimpleAttribute {
    let possible_values = if attribute.enumeration.is_empty() {
        None
    } else {
        Some(attribute.enumeration.clone())
    };

    SimpleAttribute {
        name: attribute.name.local_name.clone(),
        namespace: attribute.name.namespace.clone(),
        possible_values,
    }
}
