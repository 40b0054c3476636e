//! Labels: a contact paired with its marker and resolved wire name.

use crate::contact::Contact;
use crate::convert::{ArrayConverter, Classified, CompositeConverter, Converter, MapConverter,
    PrimitiveConverter, SequenceConverter};
use crate::error::{Error, Result};
use crate::marker::Marker;
use crate::registry::{Registry, TypeRef};

// -----------------------------------------------------------------------------
// Label

/// One scanned binding: a contact, its marker, and the wire name it
/// resolved to.
///
/// For inline collection labels the wire name is the entry name, since
/// that is what actually appears on the wire; everything else resolves to
/// the contact's property name unless overridden.
pub struct Label {
    contact: Contact,
    marker: Marker,
    name: String,
}

impl Label {
    pub(crate) fn new(contact: Contact, marker: Marker, name: String) -> Self {
        Self {
            contact,
            marker,
            name,
        }
    }

    /// The resolved wire name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a missing wire node is an error.
    #[inline]
    pub fn required(&self) -> bool {
        self.marker.required()
    }

    /// Whether this label's entries repeat inline, without a wrapper.
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.marker.is_inline()
    }

    /// The declarative marker.
    #[inline]
    pub fn marker(&self) -> &Marker {
        &self.marker
    }

    /// The field accessor.
    #[inline]
    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    /// Builds the converter for this label against the current registry.
    ///
    /// The match is total: every marker kind and every primitive-versus-
    /// composite classification of the declared types maps to exactly one
    /// converter. Classification happens here, at call time, so a
    /// dependency type registered after this label's owner is still seen.
    pub fn converter(&self, registry: &Registry, strict: bool) -> Result<Converter> {
        match &self.marker {
            Marker::Attribute { .. } | Marker::Text { .. } => {
                Ok(Converter::Primitive(PrimitiveConverter {
                    transform: scalar(registry, self.contact.declared())?,
                }))
            }
            Marker::Element { .. } => {
                let declared = self.contact.declared();
                match registry.transform(declared.id()) {
                    Some(transform) => Ok(Converter::Primitive(PrimitiveConverter {
                        transform: transform.clone(),
                    })),
                    None => Ok(Converter::Composite(CompositeConverter { ty: declared })),
                }
            }
            Marker::ElementList(marker) => Ok(Converter::Sequence(SequenceConverter {
                entry: classify(registry, marker.entry),
                entry_name: entry_name(registry, marker.entry, marker.entry_name)?,
                inline: marker.inline,
                union: marker.union,
                strict,
                ops: marker.ops,
            })),
            Marker::ElementArray(marker) => Ok(Converter::Array(ArrayConverter {
                entry: classify(registry, marker.entry),
                entry_name: entry_name(registry, marker.entry, marker.entry_name)?,
                length: marker.length,
                strict,
                ops: marker.ops,
            })),
            Marker::ElementMap(marker) => {
                let key = classify(registry, marker.key);
                if marker.entry.key_attribute && !matches!(key, Classified::Primitive(_)) {
                    return Err(Error::instantiation(
                        marker.key.name(),
                        "attribute-placed map keys require a registered primitive",
                    ));
                }
                let value = classify(registry, marker.value);
                if marker.entry.value_text && !matches!(value, Classified::Primitive(_)) {
                    return Err(Error::instantiation(
                        marker.value.name(),
                        "text-placed map values require a registered primitive",
                    ));
                }
                Ok(Converter::Map(MapConverter {
                    key,
                    value,
                    entry: marker.entry,
                    inline: marker.inline,
                    strict,
                    ops: marker.ops,
                }))
            }
        }
    }
}

impl core::fmt::Debug for Label {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Label")
            .field("name", &self.name)
            .field("marker", &self.marker)
            .field("contact", &self.contact)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// Classification helpers

/// The entry element name for a collection label: explicit override first,
/// then the entry type's registered root name.
pub(crate) fn entry_name(
    registry: &Registry,
    entry: TypeRef,
    explicit: Option<&'static str>,
) -> Result<&'static str> {
    explicit
        .or_else(|| registry.root_name(entry.id()))
        .ok_or_else(|| {
            Error::schema(
                entry.name(),
                "collection entries need an explicit entry name or a registered root name",
            )
        })
}

fn classify(registry: &Registry, ty: TypeRef) -> Classified {
    match registry.transform(ty.id()) {
        Some(transform) => Classified::Primitive(transform.clone()),
        None => Classified::Composite(ty),
    }
}

fn scalar(registry: &Registry, ty: TypeRef) -> Result<crate::transform::Transform> {
    registry.transform(ty.id()).cloned().ok_or_else(|| {
        Error::instantiation(
            ty.name(),
            "not a registered primitive; attributes and text bind scalars only",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::Label;
    use crate::contact::Contact;
    use crate::convert::Converter;
    use crate::marker::Marker;
    use crate::registry::Registry;

    #[derive(Default)]
    struct Sample {
        value: i32,
    }

    fn value_label(marker: Marker) -> Label {
        let contact =
            Contact::new::<Sample, i32>("value", |s| Some(s.value), |s, v| s.value = v);
        Label::new(contact, marker, "value".to_string())
    }

    #[test]
    fn attribute_labels_build_scalar_converters() {
        let registry = Registry::new();
        let label = value_label(Marker::Attribute { required: true });
        let converter = label.converter(&registry, true).unwrap();
        assert!(matches!(converter, Converter::Primitive(_)));
    }

    #[test]
    fn element_labels_classify_by_registration() {
        let registry = Registry::new();

        // i32 is a built-in primitive.
        let label = value_label(Marker::Element { required: true });
        let converter = label.converter(&registry, true).unwrap();
        assert!(matches!(converter, Converter::Primitive(_)));

        // An unregistered struct classifies as composite.
        struct Nested;
        let contact = Contact::new::<Sample, Nested>("nested", |_| None, |_, _| {});
        let label = Label::new(
            contact,
            Marker::Element { required: false },
            "nested".to_string(),
        );
        let converter = label.converter(&registry, true).unwrap();
        assert!(matches!(converter, Converter::Composite(_)));
    }

    #[test]
    fn attribute_labels_reject_composite_types() {
        struct Nested;
        let registry = Registry::new();
        let contact = Contact::new::<Sample, Nested>("nested", |_| None, |_, _| {});
        let label = Label::new(
            contact,
            Marker::Attribute { required: true },
            "nested".to_string(),
        );
        assert!(label.converter(&registry, true).is_err());
    }
}
