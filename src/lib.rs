#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use graft_core as core;
pub use graft_node as node;

pub use graft_core::{
    ArrayField, Binder, Contact, CycleStrategy, Error, ListField, MapField, MarkerSet, Registry,
    RegistryArc, Result, SchemaBuilder, SharedAccess, Strategy, Transform, TreeStrategy, TypeRef,
    global,
};
pub use graft_node::{Element, Position};

#[cfg(feature = "auto_register")]
pub use graft_core::Registration;
