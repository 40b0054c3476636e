//! The scanner: folds declared marker sets into one class schema.
//!
//! A schema builder produces one marker set per declaration level, most
//! derived first. The scanner resolves every contact's wire name, refuses
//! conflicting declarations, applies the wire-order override, and seals
//! the result into an immutable [`ClassSchema`].

use std::sync::Arc;

use crate::contact::Contact;
use crate::error::{Error, Result};
use crate::label::{self, Label};
use crate::marker::{Marker, Order};
use crate::registry::{Registry, TypeRef};
use crate::schema::{ClassSchema, Hooks, InstantiateFn, LabelMap};
use crate::util::HashSet;

// -----------------------------------------------------------------------------
// MarkerSet

/// The declarations of one level: contacts with markers, hooks, and an
/// optional wire-order override.
///
/// Builders produce these; a set can also be merged into another builder
/// to compose shared declarations, the way a base class contributes its
/// fields to a derived one.
#[derive(Default)]
pub struct MarkerSet {
    pub(crate) items: Vec<(Contact, Marker)>,
    pub(crate) hooks: Hooks,
    pub(crate) order: Option<Order>,
}

impl MarkerSet {
    pub fn new() -> Self {
        Self::default()
    }
}

// -----------------------------------------------------------------------------
// Scanner

pub(crate) struct Scanner<'r> {
    registry: &'r Registry,
}

impl<'r> Scanner<'r> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Builds the schema for `ty` from its marker sets, most derived
    /// first.
    ///
    /// A wire name declared twice in the same set is an error; a name a
    /// more derived set already claimed shadows the base declaration.
    /// Hooks follow the same precedence, slot by slot.
    pub(crate) fn scan(
        &self,
        ty: TypeRef,
        name: &'static str,
        strict: bool,
        sets: Vec<MarkerSet>,
        instantiate: InstantiateFn,
    ) -> Result<ClassSchema> {
        let type_name = ty.name();
        let mut attributes = LabelMap::new();
        let mut elements = LabelMap::new();
        let mut text: Option<Arc<Label>> = None;
        let mut hooks = Hooks::default();
        let mut order: Option<Order> = None;

        for set in sets {
            hooks.inherit(&set.hooks);
            if order.is_none() {
                order = set.order;
            }

            // Names this set itself claimed, to tell a conflict apart
            // from base shadowing.
            let mut claimed: HashSet<String> = HashSet::default();
            let mut claimed_text = false;

            for (contact, marker) in set.items {
                let wire = self.wire_name(&contact, &marker)?;

                if let Marker::Text { .. } = marker {
                    if claimed_text {
                        return Err(Error::schema(
                            type_name,
                            "declares more than one text label",
                        ));
                    }
                    claimed_text = true;
                    if text.is_none() {
                        text = Some(Arc::new(Label::new(contact, marker, wire)));
                    }
                    continue;
                }

                let target = match marker {
                    Marker::Attribute { .. } => &mut attributes,
                    _ => &mut elements,
                };
                if !claimed.insert(wire.clone()) {
                    return Err(Error::schema(
                        type_name,
                        format!("declares the wire name `{wire}` twice"),
                    ));
                }
                let label = Arc::new(Label::new(contact, marker, wire.clone()));
                if !target.insert(wire.clone(), label) {
                    // A more derived set owns the name already.
                    tracing::trace!(ty = type_name, name = %wire, "label shadowed");
                }
            }
        }

        if text.is_some() && !elements.is_empty() {
            return Err(Error::schema(
                type_name,
                "declares both a text label and element labels",
            ));
        }
        if attributes.is_empty() && elements.is_empty() && text.is_none() {
            return Err(Error::schema(
                type_name,
                "declares nothing to bind; register a primitive transform instead",
            ));
        }

        if let Some(order) = order {
            attributes.reorder(&order.attributes).map_err(|name| {
                Error::schema(
                    type_name,
                    format!("wire order names the unknown attribute `{name}`"),
                )
            })?;
            elements.reorder(&order.elements).map_err(|name| {
                Error::schema(
                    type_name,
                    format!("wire order names the unknown element `{name}`"),
                )
            })?;
        }

        Ok(ClassSchema::new(
            ty, name, strict, attributes, elements, text, hooks, instantiate,
        ))
    }

    /// The wire name a contact resolves to: inline collections surface
    /// their entry name, everything else the property name.
    fn wire_name(&self, contact: &Contact, marker: &Marker) -> Result<String> {
        let name = match marker {
            Marker::ElementList(list) if list.inline => {
                label::entry_name(self.registry, list.entry, list.entry_name)?
            }
            Marker::ElementMap(map) if map.inline => map.entry.entry,
            _ => contact.name(),
        };
        Ok(name.to_string())
    }
}
