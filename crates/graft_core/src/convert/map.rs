//! The map converter: key/value entry elements, wrapped or inline.

use core::any::Any;

use graft_node::Element;

use crate::error::{Error, Result};
use crate::marker::EntryConfig;
use crate::ops::MapOps;

use super::{Classified, Context};

/// Converter for key/value entries collected into a map.
///
/// Each pair is one entry element. The key sits in an attribute of the
/// entry or in a key element inside it; the value sits in the entry's
/// text or in a value element. Attribute keys and text values require
/// primitive types, which the converter factory enforces.
pub struct MapConverter {
    pub(crate) key: Classified,
    pub(crate) value: Classified,
    pub(crate) entry: EntryConfig,
    pub(crate) inline: bool,
    pub(crate) strict: bool,
    pub(crate) ops: MapOps,
}

impl MapConverter {
    /// Reads a wrapped map from the wrapper element.
    pub(crate) fn read(&self, ctx: &mut Context<'_>, node: &mut Element) -> Result<Box<dyn Any>> {
        let mut map = self.ops.new_value();
        while let Some(mut child) = node.next() {
            if child.name() != self.entry.entry {
                if self.strict {
                    return Err(Error::Element {
                        name: child.name().to_string(),
                        position: child.position(),
                    });
                }
                continue;
            }
            self.read_entry(ctx, &mut child, map.as_mut())?;
        }
        Ok(map)
    }

    /// Reads an inline run of entry elements that began with `first`.
    pub(crate) fn read_inline(
        &self,
        ctx: &mut Context<'_>,
        parent: &mut Element,
        first: Element,
    ) -> Result<Box<dyn Any>> {
        let mut map = self.ops.new_value();
        let mut entry = first;
        loop {
            self.read_entry(ctx, &mut entry, map.as_mut())?;
            match parent.next_named(self.entry.entry) {
                Some(node) => entry = node,
                None => break,
            }
        }
        Ok(map)
    }

    fn read_entry(
        &self,
        ctx: &mut Context<'_>,
        node: &mut Element,
        map: &mut dyn Any,
    ) -> Result<()> {
        let mut key = None;
        if self.entry.key_attribute
            && let Some(text) = node.remove_attribute(self.entry.key)
        {
            key = Some(self.read_scalar(&self.key, &text)?);
        }
        let mut value = None;
        if self.entry.value_text
            && let Some(text) = node.value()
        {
            value = Some(self.read_scalar(&self.value, text)?);
        }

        while let Some(mut child) = node.next() {
            if !self.entry.key_attribute && child.name() == self.entry.key {
                key = self.key.read(ctx, &mut child)?;
            } else if !self.entry.value_text && child.name() == self.entry.value {
                value = self.value.read(ctx, &mut child)?;
            } else if self.strict {
                return Err(Error::Element {
                    name: child.name().to_string(),
                    position: child.position(),
                });
            }
        }

        let key = key.ok_or_else(|| Error::required(self.entry.key))?;
        let value = value.ok_or_else(|| Error::required(self.entry.value))?;
        self.ops.insert(map, key, value)
    }

    fn read_scalar(&self, side: &Classified, text: &str) -> Result<Box<dyn Any>> {
        match side {
            Classified::Primitive(transform) => transform.read(text),
            // The factory refuses composite types in scalar placements.
            Classified::Composite(ty) => Err(Error::instantiation(
                ty.name(),
                "composite type in a scalar map placement",
            )),
        }
    }

    /// Writes a wrapped map into the wrapper element.
    pub(crate) fn write(
        &self,
        ctx: &mut Context<'_>,
        node: &mut Element,
        value: &dyn Any,
    ) -> Result<()> {
        self.write_entries(ctx, node, value)
    }

    /// Writes every pair as an entry element under `target`.
    pub(crate) fn write_entries(
        &self,
        ctx: &mut Context<'_>,
        target: &mut Element,
        map: &dyn Any,
    ) -> Result<()> {
        self.ops.each(map, &mut |key, value| {
            let mut entry = Element::new(self.entry.entry);

            if self.entry.key_attribute {
                match &self.key {
                    Classified::Primitive(transform) => {
                        entry.set_attribute(self.entry.key, transform.write(key)?);
                    }
                    Classified::Composite(ty) => {
                        return Err(Error::instantiation(
                            ty.name(),
                            "composite type in a scalar map placement",
                        ));
                    }
                }
            } else {
                let mut child = Element::new(self.entry.key);
                self.key.write(ctx, &mut child, key)?;
                entry.push_child(child);
            }

            if self.entry.value_text {
                match &self.value {
                    Classified::Primitive(transform) => {
                        entry.set_value(transform.write(value)?);
                    }
                    Classified::Composite(ty) => {
                        return Err(Error::instantiation(
                            ty.name(),
                            "composite type in a scalar map placement",
                        ));
                    }
                }
            } else {
                let mut child = Element::new(self.entry.value);
                self.value.write(ctx, &mut child, value)?;
                entry.push_child(child);
            }

            target.push_child(entry);
            Ok(())
        })
    }
}
