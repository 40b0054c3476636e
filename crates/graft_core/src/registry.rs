//! The process-wide registry of bindable types.
//!
//! This is the central store the converter engine resolves against: every
//! type is either a **composite** (carries a [`ClassSchema`]) or a
//! **primitive** (carries a [`Transform`]). Registering a type populates a
//! [`TypeEntry`] at most once; later registrations of the same type are
//! ignored, so concurrent first use is safe.
//!
//! ## Menu
//!
//! - [`TypeRef`]: type identity plus a printable name.
//! - [`TypeEntry`]: one registered type.
//! - [`Registry`]: the store itself.
//! - [`RegistryArc`]: shared `Arc<RwLock<Registry>>` wrapper.
//! - [`global`]: the process-wide registry instance.
//!
//! ## auto_register
//!
//! With the `auto_register` feature, registration functions submitted via
//! [`inventory`] (see [`Registration`]) are folded into the global
//! registry when it is first touched. Platforms without `inventory`
//! support simply skip this step.

use core::any::TypeId;
use core::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::Lazy;

use crate::builder::SchemaBuilder;
use crate::error::Result;
use crate::ops::SharedAccess;
use crate::schema::ClassSchema;
use crate::transform::Transform;
use crate::util::{HashMap, HashSet, TypeIdMap};

// -----------------------------------------------------------------------------
// TypeRef

/// Type identity paired with a printable type name.
///
/// `of` accepts unsized types, so an abstract field can be declared as
/// `TypeRef::of::<dyn Trait>()`.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    id: TypeId,
    name: &'static str,
}

impl TypeRef {
    /// The reference for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: core::any::type_name::<T>(),
        }
    }

    /// The `TypeId`.
    #[inline]
    pub const fn id(&self) -> TypeId {
        self.id
    }

    /// The full type name.
    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The last path segment of the type name.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// -----------------------------------------------------------------------------
// TypeEntry

/// How a registered type participates in binding.
pub enum EntryKind {
    /// A non-primitive type with a class schema; read and written by the
    /// composite converter.
    Composite(Arc<ClassSchema>),
    /// A leaf type read and written through a scalar transform.
    Primitive(Transform),
}

/// One registered type.
pub struct TypeEntry {
    ty: TypeRef,
    kind: EntryKind,
    shared: Option<SharedAccess>,
}

impl TypeEntry {
    /// The type this entry describes.
    #[inline]
    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    /// Whether the type is a registered primitive.
    #[inline]
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, EntryKind::Primitive(_))
    }

    /// The class schema, for composite entries.
    pub fn schema(&self) -> Option<&Arc<ClassSchema>> {
        match &self.kind {
            EntryKind::Composite(schema) => Some(schema),
            EntryKind::Primitive(_) => None,
        }
    }

    /// The scalar transform, for primitive entries.
    pub fn transform(&self) -> Option<&Transform> {
        match &self.kind {
            EntryKind::Composite(_) => None,
            EntryKind::Primitive(transform) => Some(transform),
        }
    }

    /// The declared root wire name, for composite entries.
    pub fn root_name(&self) -> Option<&'static str> {
        self.schema().map(|schema| schema.name())
    }

    /// Shared-handle access, when the type registered one.
    #[inline]
    pub fn shared(&self) -> Option<&SharedAccess> {
        self.shared.as_ref()
    }
}

// -----------------------------------------------------------------------------
// Registry

/// The registry of bindable types.
///
/// Composite registrations index their root wire name so that a resolution
/// strategy can map a node's type annotation back to a concrete type. A
/// root name claimed by two different types becomes ambiguous and resolves
/// to neither.
pub struct Registry {
    entries: TypeIdMap<TypeEntry>,
    name_to_id: HashMap<&'static str, TypeId>,
    ambiguous_names: HashSet<&'static str>,
}

impl Registry {
    /// Creates an empty registry with no registrations at all.
    pub fn empty() -> Self {
        Self {
            entries: TypeIdMap::new(),
            name_to_id: HashMap::default(),
            ambiguous_names: HashSet::default(),
        }
    }

    /// Creates a registry with the built-in primitive transforms.
    ///
    /// - `bool` `char`
    /// - `i8` - `i128`, `isize`
    /// - `u8` - `u128`, `usize`
    /// - `f32` `f64`
    /// - `String`
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_primitive::<bool>(Transform::of::<bool>());
        registry.register_primitive::<char>(Transform::of::<char>());
        registry.register_primitive::<u8>(Transform::of::<u8>());
        registry.register_primitive::<u16>(Transform::of::<u16>());
        registry.register_primitive::<u32>(Transform::of::<u32>());
        registry.register_primitive::<u64>(Transform::of::<u64>());
        registry.register_primitive::<u128>(Transform::of::<u128>());
        registry.register_primitive::<usize>(Transform::of::<usize>());
        registry.register_primitive::<i8>(Transform::of::<i8>());
        registry.register_primitive::<i16>(Transform::of::<i16>());
        registry.register_primitive::<i32>(Transform::of::<i32>());
        registry.register_primitive::<i64>(Transform::of::<i64>());
        registry.register_primitive::<i128>(Transform::of::<i128>());
        registry.register_primitive::<isize>(Transform::of::<isize>());
        registry.register_primitive::<f32>(Transform::of::<f32>());
        registry.register_primitive::<f64>(Transform::of::<f64>());
        registry.register_primitive::<String>(Transform::of::<String>());
        registry
    }

    /// Registers a composite type from its schema builder.
    ///
    /// If the type is already registered this does nothing (first writer
    /// wins). Building validates the whole schema, so dependency types
    /// whose root names are needed for inline labels must be registered
    /// first.
    pub fn register<T: 'static>(&mut self, builder: SchemaBuilder<T>) -> Result<()> {
        let ty = TypeRef::of::<T>();
        if self.entries.contains(&ty.id()) {
            return Ok(());
        }
        let (schema, shared) = builder.finish(self)?;
        let schema = Arc::new(schema);
        tracing::debug!(ty = ty.name(), root = schema.name(), "registered composite");
        self.index_root_name(schema.name(), ty.id());
        self.entries.insert(
            ty.id(),
            TypeEntry {
                ty,
                kind: EntryKind::Composite(schema),
                shared,
            },
        );
        Ok(())
    }

    /// Registers a primitive type with its scalar transform.
    ///
    /// If the type is already registered this does nothing.
    pub fn register_primitive<T: 'static>(&mut self, transform: Transform) {
        let ty = TypeRef::of::<T>();
        self.entries.try_insert(ty.id(), || {
            tracing::debug!(ty = ty.name(), "registered primitive");
            TypeEntry {
                ty,
                kind: EntryKind::Primitive(transform),
                shared: None,
            }
        });
    }

    // The root name index tolerates collisions by refusing to resolve an
    // ambiguous name at all, same as an unregistered one.
    fn index_root_name(&mut self, name: &'static str, id: TypeId) {
        if self.ambiguous_names.contains(name) {
            return;
        }
        if self.name_to_id.contains_key(name) {
            self.name_to_id.remove(name);
            self.ambiguous_names.insert(name);
        } else {
            self.name_to_id.insert(name, id);
        }
    }

    /// Whether the type with the given [`TypeId`] has been registered.
    #[inline]
    pub fn contains(&self, id: TypeId) -> bool {
        self.entries.contains(&id)
    }

    /// The entry for the type with the given [`TypeId`].
    #[inline]
    pub fn get(&self, id: TypeId) -> Option<&TypeEntry> {
        self.entries.get(&id)
    }

    /// The entry for the composite with the given root wire name.
    ///
    /// Returns `None` when the name is unknown or ambiguous.
    pub fn get_with_name(&self, name: &str) -> Option<&TypeEntry> {
        match self.name_to_id.get(name) {
            Some(id) => self.get(*id),
            None => None,
        }
    }

    /// Whether the given root name matches more than one registered type.
    #[inline]
    pub fn is_ambiguous(&self, name: &str) -> bool {
        self.ambiguous_names.contains(name)
    }

    /// Whether the type is registered as a primitive.
    pub fn is_primitive(&self, id: TypeId) -> bool {
        self.get(id).is_some_and(TypeEntry::is_primitive)
    }

    /// The transform of a registered primitive.
    pub fn transform(&self, id: TypeId) -> Option<&Transform> {
        self.get(id).and_then(TypeEntry::transform)
    }

    /// The class schema of a registered composite.
    pub fn schema(&self, id: TypeId) -> Option<&Arc<ClassSchema>> {
        self.get(id).and_then(TypeEntry::schema)
    }

    /// The declared root wire name of a registered composite.
    pub fn root_name(&self, id: TypeId) -> Option<&'static str> {
        self.get(id).and_then(TypeEntry::root_name)
    }

    /// Shared-handle access of a registered type.
    pub fn shared(&self, id: TypeId) -> Option<&SharedAccess> {
        self.get(id).and_then(TypeEntry::shared)
    }

    /// Iterates over the registered entries.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &TypeEntry> {
        self.entries.values()
    }
}

impl Default for Registry {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// -----------------------------------------------------------------------------
// RegistryArc

/// Shared handle to a [`Registry`].
///
/// Lookups take a read lock and never block each other; registration takes
/// the write lock. A binding call holds one read guard for its whole
/// duration.
#[derive(Clone)]
pub struct RegistryArc {
    internal: Arc<RwLock<Registry>>,
}

impl RegistryArc {
    /// Takes a read lock on the underlying [`Registry`].
    pub fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.internal.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a write lock on the underlying [`Registry`].
    pub fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.internal
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl From<Registry> for RegistryArc {
    fn from(registry: Registry) -> Self {
        Self {
            internal: Arc::new(RwLock::new(registry)),
        }
    }
}

impl Default for RegistryArc {
    fn default() -> Self {
        Self::from(Registry::new())
    }
}

impl fmt::Debug for RegistryArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.read().name_to_id.keys().fmt(f)
    }
}

// -----------------------------------------------------------------------------
// Global registry

/// A registration function submitted for automatic collection.
///
/// ```ignore
/// inventory::submit! {
///     graft_core::Registration::new(|registry| {
///         registry.register(Server::schema())
///     })
/// }
/// ```
#[cfg(feature = "auto_register")]
pub struct Registration {
    register: fn(&mut Registry) -> Result<()>,
}

#[cfg(feature = "auto_register")]
impl Registration {
    /// Wraps a registration function for submission.
    pub const fn new(register: fn(&mut Registry) -> Result<()>) -> Self {
        Self { register }
    }
}

#[cfg(feature = "auto_register")]
inventory::collect!(Registration);

static GLOBAL: Lazy<RegistryArc> = Lazy::new(|| {
    #[allow(unused_mut)]
    let mut registry = Registry::new();
    #[cfg(feature = "auto_register")]
    for submission in inventory::iter::<Registration> {
        if let Err(error) = (submission.register)(&mut registry) {
            tracing::error!(%error, "auto-registration failed; type skipped");
        }
    }
    RegistryArc::from(registry)
});

/// The process-wide registry.
///
/// Created on first access; with the `auto_register` feature, submitted
/// registrations are folded in at that point.
pub fn global() -> &'static RegistryArc {
    &GLOBAL
}
