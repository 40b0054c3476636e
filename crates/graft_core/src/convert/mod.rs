//! The converter engine: recursive drivers between elements and values.
//!
//! A converter is built per label, per call, by the converter factory on
//! [`Label`](crate::label::Label). The set is closed: every marker kind
//! and every primitive-versus-composite classification of the declared
//! types maps to exactly one variant, so dispatch is a plain `match` with
//! no trait objects in the hot path.

use core::any::Any;

use graft_node::Element;

use crate::error::{Error, Result};
use crate::registry::{Registry, TypeRef};
use crate::strategy::{Session, Strategy};
use crate::transform::Transform;

pub(crate) mod array;
pub(crate) mod composite;
pub(crate) mod map;
pub(crate) mod primitive;
pub(crate) mod sequence;

pub use array::ArrayConverter;
pub use composite::CompositeConverter;
pub use map::MapConverter;
pub use primitive::PrimitiveConverter;
pub use sequence::SequenceConverter;

// -----------------------------------------------------------------------------
// Context

/// Everything one binding call carries through the recursion.
///
/// The registry reference pins a read lock for the duration of the call;
/// the session is the strategy's scratch space and dies with the call.
pub struct Context<'a> {
    pub(crate) registry: &'a Registry,
    pub(crate) strategy: &'a dyn Strategy,
    pub(crate) session: Session,
}

impl<'a> Context<'a> {
    pub(crate) fn new(registry: &'a Registry, strategy: &'a dyn Strategy) -> Self {
        Self {
            registry,
            strategy,
            session: Session::new(),
        }
    }
}

// -----------------------------------------------------------------------------
// Classified

/// How a declared entry type participates: through a scalar transform or
/// through the composite driver.
pub(crate) enum Classified {
    Primitive(Transform),
    Composite(TypeRef),
}

impl Classified {
    /// Reads one entry element into a value. `Ok(None)` means the element
    /// carried nothing (an empty primitive entry).
    pub(crate) fn read(
        &self,
        ctx: &mut Context<'_>,
        node: &mut Element,
    ) -> Result<Option<Box<dyn Any>>> {
        match self {
            Self::Primitive(transform) => match node.value() {
                Some(text) => transform.read(text).map(Some),
                None => Ok(None),
            },
            Self::Composite(ty) => composite::read(ctx, node, *ty, false).map(Some),
        }
    }

    /// Writes one entry value into `node`.
    pub(crate) fn write(
        &self,
        ctx: &mut Context<'_>,
        node: &mut Element,
        value: &dyn Any,
    ) -> Result<()> {
        match self {
            Self::Primitive(transform) => {
                node.set_value(transform.write(value)?);
                Ok(())
            }
            Self::Composite(ty) => composite::write(ctx, node, value, *ty, false),
        }
    }
}

// -----------------------------------------------------------------------------
// Converter

/// The closed set of converters.
pub enum Converter {
    /// Scalar values through a transform: attributes, text, and primitive
    /// elements.
    Primitive(PrimitiveConverter),
    /// One nested composite element.
    Composite(CompositeConverter),
    /// Repeated entries into a sequence, wrapped or inline.
    Sequence(SequenceConverter),
    /// Repeated entries with a declared length.
    Array(ArrayConverter),
    /// Key/value entries into a map, wrapped or inline.
    Map(MapConverter),
}

impl Converter {
    /// Whether this converter reads and writes repeated siblings instead
    /// of a single wire node of its own.
    pub fn is_inline(&self) -> bool {
        match self {
            Self::Sequence(converter) => converter.inline,
            Self::Map(converter) => converter.inline,
            _ => false,
        }
    }

    /// Reads one wire node into a value. `Ok(None)` means the node carried
    /// nothing.
    pub fn read(&self, ctx: &mut Context<'_>, node: &mut Element) -> Result<Option<Box<dyn Any>>> {
        match self {
            Self::Primitive(converter) => converter.read(node),
            Self::Composite(converter) => converter.read(ctx, node).map(Some),
            Self::Sequence(converter) => converter.read(ctx, node).map(Some),
            Self::Array(converter) => converter.read(ctx, node).map(Some),
            Self::Map(converter) => converter.read(ctx, node).map(Some),
        }
    }

    /// Reads an inline run that began with `first`, consuming further
    /// entries from `parent`.
    pub fn read_inline(
        &self,
        ctx: &mut Context<'_>,
        parent: &mut Element,
        first: Element,
    ) -> Result<Option<Box<dyn Any>>> {
        match self {
            Self::Sequence(converter) => converter.read_inline(ctx, parent, first).map(Some),
            Self::Map(converter) => converter.read_inline(ctx, parent, first).map(Some),
            _ => Err(internal("inline read on a non-inline converter")),
        }
    }

    /// Writes a value into one wire node.
    pub fn write(&self, ctx: &mut Context<'_>, node: &mut Element, value: &dyn Any) -> Result<()> {
        match self {
            Self::Primitive(converter) => converter.write(node, value),
            Self::Composite(converter) => converter.write(ctx, node, value),
            Self::Sequence(converter) => converter.write(ctx, node, value),
            Self::Array(converter) => converter.write(ctx, node, value),
            Self::Map(converter) => converter.write(ctx, node, value),
        }
    }

    /// Writes a value as repeated children of `parent`.
    pub fn write_inline(
        &self,
        ctx: &mut Context<'_>,
        parent: &mut Element,
        value: &dyn Any,
    ) -> Result<()> {
        match self {
            Self::Sequence(converter) => converter.write_entries(ctx, parent, value),
            Self::Map(converter) => converter.write_entries(ctx, parent, value),
            _ => Err(internal("inline write on a non-inline converter")),
        }
    }

    /// Parses attribute or text content. Only scalar converters can.
    pub fn read_text(&self, text: &str) -> Result<Box<dyn Any>> {
        match self {
            Self::Primitive(converter) => converter.transform.read(text),
            _ => Err(internal("text read on a non-scalar converter")),
        }
    }

    /// Formats a value into attribute or text content. Only scalar
    /// converters can.
    pub fn write_text(&self, value: &dyn Any) -> Result<String> {
        match self {
            Self::Primitive(converter) => converter.transform.write(value),
            _ => Err(internal("text write on a non-scalar converter")),
        }
    }
}

// These arms are unreachable through the factory; the message is for the
// unlikely case of a hand-built converter driven the wrong way.
fn internal(reason: &'static str) -> Error {
    Error::instantiation("converter", reason)
}
