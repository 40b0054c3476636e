//! Declarative markers: what kind of wire node a contact binds to.
//!
//! One marker per contact, mirrored after the declarative annotations a
//! schema language would attach to fields: attribute, element, element
//! list, element array, element map, or text. Collection markers carry the
//! erased container ops built for the concrete entry types.

use core::fmt;

use crate::ops::{MapOps, SequenceOps};
use crate::registry::TypeRef;

// -----------------------------------------------------------------------------
// Marker

/// The marker attached to one contact.
#[derive(Copy, Clone)]
pub enum Marker {
    /// Bind to a wire attribute on the owning element.
    Attribute { required: bool },
    /// Bind to a child element.
    Element { required: bool },
    /// Bind to repeated child elements collected into a sequence.
    ElementList(ListMarker),
    /// Bind to repeated child elements with a declared length.
    ElementArray(ArrayMarker),
    /// Bind to key/value entry elements collected into a map.
    ElementMap(MapMarker),
    /// Bind to the owning element's text value.
    Text { required: bool },
}

impl Marker {
    /// Whether a missing wire node for this marker is an error.
    pub fn required(&self) -> bool {
        match self {
            Self::Attribute { required }
            | Self::Element { required }
            | Self::Text { required } => *required,
            Self::ElementList(marker) => marker.required,
            Self::ElementArray(marker) => marker.required,
            Self::ElementMap(marker) => marker.required,
        }
    }

    /// Whether entries appear as repeated siblings with no wrapper.
    pub fn is_inline(&self) -> bool {
        match self {
            Self::ElementList(marker) => marker.inline,
            Self::ElementMap(marker) => marker.inline,
            _ => false,
        }
    }

    /// The marker kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Attribute { .. } => "attribute",
            Self::Element { .. } => "element",
            Self::ElementList(_) => "element list",
            Self::ElementArray(_) => "element array",
            Self::ElementMap(_) => "element map",
            Self::Text { .. } => "text",
        }
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Marker")
            .field("kind", &self.kind_name())
            .field("required", &self.required())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Collection markers

/// Configuration of an element-list marker.
#[derive(Copy, Clone)]
pub struct ListMarker {
    /// The declared entry type.
    pub entry: TypeRef,
    /// Explicit entry element name; defaults to the entry type's root name.
    pub entry_name: Option<&'static str>,
    /// Entries are repeated siblings rather than children of a wrapper.
    pub inline: bool,
    /// Entries are resolved polymorphically; every entry must match the
    /// declared root name, there is no wrapper to disambiguate by.
    pub union: bool,
    pub required: bool,
    /// Erased operations over the backing sequence.
    pub ops: SequenceOps,
}

/// Configuration of an element-array marker.
#[derive(Copy, Clone)]
pub struct ArrayMarker {
    /// The declared entry type.
    pub entry: TypeRef,
    /// Explicit entry element name; defaults to the entry type's root name.
    pub entry_name: Option<&'static str>,
    /// Declared element count, written as a `length` attribute on the
    /// wrapper and validated on read.
    pub length: Option<usize>,
    pub required: bool,
    /// Erased operations over the backing sequence.
    pub ops: SequenceOps,
}

/// Configuration of an element-map marker.
#[derive(Copy, Clone)]
pub struct MapMarker {
    /// The declared key type.
    pub key: TypeRef,
    /// The declared value type.
    pub value: TypeRef,
    /// Entry naming and placement.
    pub entry: EntryConfig,
    /// Entries are repeated siblings rather than children of a wrapper.
    pub inline: bool,
    pub required: bool,
    /// Erased operations over the backing map.
    pub ops: MapOps,
}

/// Naming and placement of one map entry.
///
/// The default renders a pair as
/// `<entry key="k"><value>v</value></entry>` when the key is placed as an
/// attribute, or `<entry><key>k</key><value>v</value></entry>` when both
/// sides are elements.
#[derive(Copy, Clone, Debug)]
pub struct EntryConfig {
    /// Entry element name.
    pub entry: &'static str,
    /// Key node name.
    pub key: &'static str,
    /// Value node name.
    pub value: &'static str,
    /// Place the key as an attribute of the entry element. Requires a
    /// primitive key type.
    pub key_attribute: bool,
    /// Place the value as the entry element's text. Requires a primitive
    /// value type.
    pub value_text: bool,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            entry: "entry",
            key: "key",
            value: "value",
            key_attribute: false,
            value_text: false,
        }
    }
}

// -----------------------------------------------------------------------------
// Order

/// An explicit wire-order override for a class schema.
///
/// Listed names are emitted first, in the listed order; unlisted labels
/// follow in declaration order. Every listed name must exist in the
/// corresponding label map.
#[derive(Clone, Debug, Default)]
pub struct Order {
    pub attributes: Vec<&'static str>,
    pub elements: Vec<&'static str>,
}

#[cfg(test)]
mod tests {
    use super::{EntryConfig, Marker};

    #[test]
    fn kind_and_required_flags() {
        let marker = Marker::Attribute { required: true };
        assert_eq!(marker.kind_name(), "attribute");
        assert!(marker.required());
        assert!(!marker.is_inline());
    }

    #[test]
    fn entry_defaults_match_the_conventional_names() {
        let entry = EntryConfig::default();
        assert_eq!((entry.entry, entry.key, entry.value), ("entry", "key", "value"));
        assert!(!entry.key_attribute);
    }
}
