//! The composite driver: schema-directed recursion over one element.
//!
//! Reading follows a fixed pass order: strategy resolution, instantiation,
//! attributes, elements, text, remainder validation, then the lifecycle
//! hooks. Writing mirrors it: replacement, strategy annotation, persist,
//! attributes, elements in schema order, text, then complete. Both
//! directions lean on the take semantics of [`CallSchema`]: a label is
//! consumed by the node that satisfies it, and whatever remains when the
//! node is exhausted either defaults or fails the call.

use core::any::Any;

use graft_node::Element;

use crate::error::{Error, Result};
use crate::registry::TypeRef;
use crate::schema::ClassSchema;

use super::Context;

/// Converter for one nested composite element.
pub struct CompositeConverter {
    pub(crate) ty: TypeRef,
}

impl CompositeConverter {
    pub(crate) fn read(&self, ctx: &mut Context<'_>, node: &mut Element) -> Result<Box<dyn Any>> {
        read(ctx, node, self.ty, false)
    }

    pub(crate) fn write(
        &self,
        ctx: &mut Context<'_>,
        node: &mut Element,
        value: &dyn Any,
    ) -> Result<()> {
        write(ctx, node, value, self.ty, false)
    }
}

// -----------------------------------------------------------------------------
// Read

/// Reads `node` into an instance of `declared`, or whatever type the
/// strategy resolves instead.
pub(crate) fn read(
    ctx: &mut Context<'_>,
    node: &mut Element,
    declared: TypeRef,
    root: bool,
) -> Result<Box<dyn Any>> {
    let strategy = ctx.strategy;
    let resolution = if root {
        strategy.read_root(declared, node, ctx.registry, &mut ctx.session)?
    } else {
        strategy.read_element(declared, node, ctx.registry, &mut ctx.session)?
    };
    let (ty, instance) = match resolution {
        Some(value) => value.into_instance(),
        None => (declared, None),
    };
    // A back reference is already materialized; nothing left to read.
    if let Some(instance) = instance {
        return Ok(instance);
    }

    let entry = ctx.registry.get(ty.id()).ok_or_else(|| {
        Error::instantiation(
            ty.name(),
            "not a registered type; abstract types resolve through a strategy",
        )
    })?;
    if let Some(transform) = entry.transform() {
        return match node.value() {
            Some(text) => transform.read(text),
            None => Err(Error::Text {
                name: node.name().to_string(),
                position: node.position(),
            }),
        };
    }
    // A registered entry is either a primitive or a composite.
    let Some(schema) = entry.schema() else {
        return Err(Error::instantiation(ty.name(), "registry entry has no schema"));
    };

    let mut instance = schema.instance();
    strategy.materialized(instance.as_ref(), ctx.registry, &mut ctx.session)?;

    populate(ctx, node, schema, instance.as_mut())?;

    schema.hooks().validate(instance.as_mut())?;
    schema.hooks().commit(instance.as_mut())?;
    schema.hooks().resolve(instance)
}

fn populate(
    ctx: &mut Context<'_>,
    node: &mut Element,
    schema: &ClassSchema,
    instance: &mut dyn Any,
) -> Result<()> {
    let mut calls = schema.calls();
    let strict = schema.is_strict();

    // Attribute pass. The strategy already removed its bookkeeping, so
    // every remaining attribute must match a label under strict policy.
    for name in node.attribute_names() {
        let Some(label) = calls.take_attribute(&name) else {
            if strict {
                return Err(Error::Attribute {
                    name,
                    position: node.position(),
                });
            }
            continue;
        };
        let Some(text) = node.attribute(&name) else {
            continue;
        };
        let converter = label.converter(ctx.registry, strict)?;
        let value = converter.read_text(text)?;
        label.contact().set(instance, value)?;
    }

    // Element pass, in document order. Inline labels receive the parent
    // so they can consume the rest of their sibling run.
    while let Some(mut child) = node.next() {
        let name = child.name().to_string();
        let Some(label) = calls.take_element(&name) else {
            if strict {
                return Err(Error::Element {
                    name,
                    position: child.position(),
                });
            }
            // Lenient policy skips the whole unknown subtree.
            continue;
        };
        let converter = label.converter(ctx.registry, strict)?;
        let value = if converter.is_inline() {
            converter.read_inline(ctx, node, child)?
        } else {
            converter.read(ctx, &mut child)?
        };
        match value {
            Some(value) => label.contact().set(instance, value)?,
            None if label.required() => return Err(Error::required(label.name())),
            None => {}
        }
    }

    // Text pass.
    if let Some(text) = node.value() {
        match calls.take_text() {
            Some(label) => {
                let converter = label.converter(ctx.registry, strict)?;
                let value = converter.read_text(text)?;
                label.contact().set(instance, value)?;
            }
            None if strict => {
                return Err(Error::Text {
                    name: node.name().to_string(),
                    position: node.position(),
                });
            }
            None => {}
        }
    }

    calls.require_satisfied()
}

// -----------------------------------------------------------------------------
// Write

/// Writes `value` into `node` under the schema of its runtime type.
pub(crate) fn write(
    ctx: &mut Context<'_>,
    node: &mut Element,
    value: &dyn Any,
    declared: TypeRef,
    root: bool,
) -> Result<()> {
    let strategy = ctx.strategy;

    // The replacement hook may substitute another value, possibly of a
    // different type; everything after it sees the substitute.
    let substituted = match ctx.registry.schema(value.type_id()) {
        Some(schema) => schema.hooks().replace(value)?,
        None => None,
    };
    let value = match &substituted {
        Some(substitute) => substitute.as_ref(),
        None => value,
    };

    let claimed = if root {
        strategy.write_root(declared, value, node, ctx.registry, &mut ctx.session)?
    } else {
        strategy.write_element(declared, value, node, ctx.registry, &mut ctx.session)?
    };
    if claimed {
        return Ok(());
    }

    let entry = ctx.registry.get(value.type_id()).ok_or_else(|| {
        Error::instantiation(declared.name(), "runtime type is not registered")
    })?;
    if let Some(transform) = entry.transform() {
        node.set_value(transform.write(value)?);
        return Ok(());
    }
    let Some(schema) = entry.schema() else {
        return Err(Error::instantiation(declared.name(), "registry entry has no schema"));
    };

    schema.hooks().persist(value)?;
    let written = write_body(ctx, node, value, schema);
    // The completion hook runs even when writing failed; the write error
    // still wins.
    let completed = schema.hooks().complete(value);
    written.and(completed)
}

fn write_body(
    ctx: &mut Context<'_>,
    node: &mut Element,
    value: &dyn Any,
    schema: &ClassSchema,
) -> Result<()> {
    let strict = schema.is_strict();

    for (name, label) in schema.attributes().iter() {
        match label.contact().get(value)? {
            Some(field) => {
                let converter = label.converter(ctx.registry, strict)?;
                node.set_attribute(name, converter.write_text(field.as_ref())?);
            }
            None if label.required() => return Err(Error::required(name)),
            None => {}
        }
    }

    for (name, label) in schema.elements().iter() {
        let Some(field) = label.contact().get(value)? else {
            if label.required() {
                return Err(Error::required(name));
            }
            continue;
        };
        let converter = label.converter(ctx.registry, strict)?;
        if converter.is_inline() {
            // Inline entries land directly on the owning element; there is
            // no wrapper to open.
            converter.write_inline(ctx, node, field.as_ref())?;
        } else {
            let mut child = Element::new(name.to_string());
            converter.write(ctx, &mut child, field.as_ref())?;
            node.push_child(child);
        }
    }

    if let Some(label) = schema.text() {
        match label.contact().get(value)? {
            Some(field) => {
                let converter = label.converter(ctx.registry, strict)?;
                node.set_value(converter.write_text(field.as_ref())?);
            }
            None if label.required() => return Err(Error::required(label.name())),
            None => {}
        }
    }

    Ok(())
}
