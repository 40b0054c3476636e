//! The array converter: a wrapped sequence with a declared length.

use core::any::Any;

use graft_node::Element;

use crate::error::{Error, Result};
use crate::ops::SequenceOps;

use super::{Classified, Context};

/// The wrapper attribute carrying the element count.
const LENGTH: &str = "length";

/// Converter for repeated entries with a declared length.
///
/// The count is written as a `length` attribute on the wrapper and
/// validated on read, against both the attribute and the marker's own
/// declared length when one was given.
pub struct ArrayConverter {
    pub(crate) entry: Classified,
    pub(crate) entry_name: &'static str,
    pub(crate) length: Option<usize>,
    pub(crate) strict: bool,
    pub(crate) ops: SequenceOps,
}

impl ArrayConverter {
    pub(crate) fn read(&self, ctx: &mut Context<'_>, node: &mut Element) -> Result<Box<dyn Any>> {
        let declared = match node.remove_attribute(LENGTH) {
            Some(text) => Some(text.parse::<usize>().map_err(|_| Error::Attribute {
                name: LENGTH.to_string(),
                position: node.position(),
            })?),
            None => None,
        };

        let mut sequence = self.ops.new_value();
        while let Some(mut child) = node.next() {
            if child.name() != self.entry_name {
                if self.strict {
                    return Err(Error::Element {
                        name: child.name().to_string(),
                        position: child.position(),
                    });
                }
                continue;
            }
            if let Some(value) = self.entry.read(ctx, &mut child)? {
                self.ops.push(sequence.as_mut(), value)?;
            }
        }

        let found = self.ops.len(sequence.as_ref());
        for expected in [declared, self.length].into_iter().flatten() {
            if expected != found {
                return Err(Error::instantiation(
                    self.entry_name,
                    format!("array length mismatch: expected {expected}, found {found}"),
                ));
            }
        }
        Ok(sequence)
    }

    pub(crate) fn write(
        &self,
        ctx: &mut Context<'_>,
        node: &mut Element,
        value: &dyn Any,
    ) -> Result<()> {
        let found = self.ops.len(value);
        if let Some(expected) = self.length
            && expected != found
        {
            return Err(Error::instantiation(
                self.entry_name,
                format!("array length mismatch: expected {expected}, found {found}"),
            ));
        }
        node.set_attribute(LENGTH, found.to_string());
        self.ops.each(value, &mut |entry| {
            let mut child = Element::new(self.entry_name);
            self.entry.write(ctx, &mut child, entry)?;
            node.push_child(child);
            Ok(())
        })
    }
}
