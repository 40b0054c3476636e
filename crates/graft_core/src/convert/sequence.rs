//! The sequence converter: repeated entries, wrapped or inline.

use core::any::Any;

use graft_node::Element;

use crate::error::{Error, Result};
use crate::ops::SequenceOps;

use super::{Classified, Context};

/// Converter for repeated entries collected into a sequence.
///
/// Wrapped sequences own a wrapper element whose children are the
/// entries. Inline sequences have no wrapper: the entries sit directly on
/// the owning element as a run of same-named siblings. A union sequence is
/// the polymorphic flavor of inline: entries resolve through the strategy,
/// and the run extends to the end of the owning element, so a sibling
/// whose name disagrees with the declared entry name is an error rather
/// than the end of the run.
pub struct SequenceConverter {
    pub(crate) entry: Classified,
    pub(crate) entry_name: &'static str,
    pub(crate) inline: bool,
    pub(crate) union: bool,
    pub(crate) strict: bool,
    pub(crate) ops: SequenceOps,
}

impl SequenceConverter {
    /// Reads a wrapped sequence from the wrapper element.
    pub(crate) fn read(&self, ctx: &mut Context<'_>, node: &mut Element) -> Result<Box<dyn Any>> {
        let mut sequence = self.ops.new_value();
        while let Some(mut child) = node.next() {
            if child.name() != self.entry_name {
                if self.union {
                    return Err(self.mismatch(&child));
                }
                if self.strict {
                    return Err(Error::Element {
                        name: child.name().to_string(),
                        position: child.position(),
                    });
                }
                continue;
            }
            self.read_entry(ctx, &mut child, sequence.as_mut())?;
        }
        Ok(sequence)
    }

    /// Reads an inline run that began with `first`.
    pub(crate) fn read_inline(
        &self,
        ctx: &mut Context<'_>,
        parent: &mut Element,
        first: Element,
    ) -> Result<Box<dyn Any>> {
        let mut sequence = self.ops.new_value();
        let mut entry = first;
        loop {
            if entry.name() != self.entry_name {
                return Err(self.mismatch(&entry));
            }
            self.read_entry(ctx, &mut entry, sequence.as_mut())?;
            let next = if self.union {
                // A union run extends to the end of the element; the name
                // check above faults any stray sibling.
                parent.next()
            } else {
                parent.next_named(self.entry_name)
            };
            match next {
                Some(node) => entry = node,
                None => break,
            }
        }
        Ok(sequence)
    }

    fn read_entry(
        &self,
        ctx: &mut Context<'_>,
        node: &mut Element,
        sequence: &mut dyn Any,
    ) -> Result<()> {
        match self.entry.read(ctx, node)? {
            Some(value) => self.ops.push(sequence, value),
            // An empty primitive entry contributes nothing.
            None => Ok(()),
        }
    }

    /// Writes a wrapped sequence into the wrapper element.
    pub(crate) fn write(
        &self,
        ctx: &mut Context<'_>,
        node: &mut Element,
        value: &dyn Any,
    ) -> Result<()> {
        self.write_entries(ctx, node, value)
    }

    /// Writes every entry as a child of `target`.
    pub(crate) fn write_entries(
        &self,
        ctx: &mut Context<'_>,
        target: &mut Element,
        value: &dyn Any,
    ) -> Result<()> {
        self.ops.each(value, &mut |entry| {
            let mut child = Element::new(self.entry_name);
            self.entry.write(ctx, &mut child, entry)?;
            target.push_child(child);
            Ok(())
        })
    }

    fn mismatch(&self, entry: &Element) -> Error {
        Error::RootNameMismatch {
            expected: self.entry_name.to_string(),
            found: entry.name().to_string(),
            position: entry.position(),
        }
    }
}
