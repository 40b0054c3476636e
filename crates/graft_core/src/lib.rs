//! Declarative binding between typed object graphs and tree-structured
//! documents.
//!
//! The engine works from explicit schemas: a [`SchemaBuilder`] declares
//! how one type's fields map onto attributes, child elements, collections
//! and text; the [`Registry`] stores the sealed schemas and the scalar
//! [`Transform`]s; a [`Binder`] drives the recursive conversion between
//! values and [`Element`](graft_node::Element) trees, steered by a
//! pluggable resolution [`Strategy`].
//!
//! ## Menu
//!
//! - [`SchemaBuilder`]: declare the bindings of one type.
//! - [`Registry`] / [`global`]: where sealed schemas live.
//! - [`Binder`]: read and write documents.
//! - [`Strategy`], [`TreeStrategy`], [`CycleStrategy`]: polymorphism and
//!   object identity.
//! - [`Transform`]: scalar codecs between node text and typed values.

// -----------------------------------------------------------------------------
// Modules

pub mod builder;
pub mod contact;
pub mod convert;
pub mod error;
pub mod label;
pub mod marker;
pub mod ops;
pub mod registry;
pub mod scanner;
pub mod schema;
pub mod strategy;
pub mod transform;

mod binder;
mod util;

// -----------------------------------------------------------------------------
// Exports

pub use binder::Binder;
pub use builder::{ArrayField, ListField, MapField, SchemaBuilder};
pub use contact::Contact;
pub use error::{Error, Result};
pub use ops::{MapOps, SequenceOps, SharedAccess};
#[cfg(feature = "auto_register")]
pub use registry::Registration;
pub use registry::{Registry, RegistryArc, TypeRef, global};
pub use scanner::MarkerSet;
pub use strategy::{CycleStrategy, Session, Strategy, TreeStrategy, Value};
pub use transform::Transform;
