//! The scalar converter: leaves of the recursion.

use core::any::Any;

use graft_node::Element;

use crate::error::Result;
use crate::transform::Transform;

/// Converter for scalar values: attributes, text labels, and elements
/// whose declared type is a registered primitive.
pub struct PrimitiveConverter {
    pub(crate) transform: Transform,
}

impl PrimitiveConverter {
    /// Reads the element's text value. An element with no text reads as
    /// null.
    pub(crate) fn read(&self, node: &mut Element) -> Result<Option<Box<dyn Any>>> {
        match node.value() {
            Some(text) => self.transform.read(text).map(Some),
            None => Ok(None),
        }
    }

    /// Writes a value as the element's text.
    pub(crate) fn write(&self, node: &mut Element, value: &dyn Any) -> Result<()> {
        node.set_value(self.transform.write(value)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use graft_node::Element;

    use super::PrimitiveConverter;
    use crate::transform::Transform;

    #[test]
    fn empty_elements_read_as_null() {
        let converter = PrimitiveConverter {
            transform: Transform::of::<i32>(),
        };
        let mut empty = Element::new("value");
        assert!(converter.read(&mut empty).unwrap().is_none());

        let mut filled = Element::new("value").with_value("7");
        let value = converter.read(&mut filled).unwrap().unwrap();
        assert_eq!(*value.downcast::<i32>().unwrap(), 7);
    }

    #[test]
    fn writes_land_as_text() {
        let converter = PrimitiveConverter {
            transform: Transform::of::<bool>(),
        };
        let mut node = Element::new("flag");
        converter.write(&mut node, &true).unwrap();
        assert_eq!(node.value(), Some("true"));
    }
}
