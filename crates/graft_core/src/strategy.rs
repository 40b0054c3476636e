//! Resolution strategies: pluggable type resolution and graph maintenance.
//!
//! A strategy sees every element before the schema pass on read and after
//! population on write. It may redirect the element to a different
//! concrete type, short-circuit it with an already materialized instance,
//! or stamp bookkeeping attributes of its own. Bookkeeping attributes are
//! removed on read so the schema pass never sees them.
//!
//! Two strategies ship with the engine:
//!
//! - [`TreeStrategy`] annotates polymorphic elements with a `class`
//!   attribute and otherwise leaves the document alone. Graphs must be
//!   trees; a shared object is written once per occurrence.
//! - [`CycleStrategy`] additionally maintains `id`/`ref` attributes so
//!   shared and cyclic handles survive a round trip.

use core::any::{Any, TypeId};

use graft_node::Element;

use crate::error::{Error, Result};
use crate::registry::{Registry, TypeRef};
use crate::util::{HashMap, TypeIdMap};

// -----------------------------------------------------------------------------
// Session

/// Per-call scratch storage for strategies.
///
/// A session lives exactly as long as one read or write call and is
/// dropped with it. Strategies keep their working state here, keyed by
/// the state's own type, so a stateless strategy value can serve
/// concurrent calls.
#[derive(Default)]
pub struct Session {
    values: TypeIdMap<Box<dyn Any>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state slot for `T`, created on first access.
    pub fn entry<T: Any + Default>(&mut self) -> &mut T {
        self.values
            .try_insert(TypeId::of::<T>(), || Box::new(T::default()));
        // The slot is keyed by T's own TypeId, so the downcast holds.
        match self.values.get_mut(&TypeId::of::<T>()) {
            Some(slot) => slot.downcast_mut::<T>().unwrap_or_else(|| unreachable!()),
            None => unreachable!(),
        }
    }

    /// The state slot for `T`, if one was created.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.downcast_ref::<T>())
    }
}

// -----------------------------------------------------------------------------
// Strategy

/// A read-side resolution: the type to materialize and, for back
/// references, the instance itself.
#[derive(Debug)]
pub struct Value {
    ty: TypeRef,
    instance: Option<Box<dyn Any>>,
}

impl Value {
    /// Resolves the element to a different concrete type.
    pub fn of(ty: TypeRef) -> Self {
        Self { ty, instance: None }
    }

    /// Short-circuits the element with an already materialized instance.
    pub fn reference(ty: TypeRef, instance: Box<dyn Any>) -> Self {
        Self {
            ty,
            instance: Some(instance),
        }
    }

    /// The resolved type.
    #[inline]
    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    /// Takes the materialized instance, if this value carries one.
    #[inline]
    pub(crate) fn into_instance(self) -> (TypeRef, Option<Box<dyn Any>>) {
        (self.ty, self.instance)
    }
}

/// Pluggable type resolution around the schema pass.
///
/// Implementations must be stateless across calls; per-call state lives in
/// the [`Session`].
pub trait Strategy: Send + Sync {
    /// Called for every element on read, before the schema pass.
    ///
    /// `Ok(None)` keeps the declared type. Bookkeeping attributes must be
    /// removed from `node` here.
    fn read_element(
        &self,
        declared: TypeRef,
        node: &mut Element,
        registry: &Registry,
        session: &mut Session,
    ) -> Result<Option<Value>>;

    /// Called for the document root on read. Defaults to
    /// [`read_element`](Self::read_element).
    fn read_root(
        &self,
        declared: TypeRef,
        node: &mut Element,
        registry: &Registry,
        session: &mut Session,
    ) -> Result<Option<Value>> {
        self.read_element(declared, node, registry, session)
    }

    /// Called for every element on write, before the schema pass.
    ///
    /// Returning `true` claims the element as fully written: the engine
    /// skips the schema pass for it. Annotations (type markers, identity
    /// attributes) are stamped on `node` here.
    fn write_element(
        &self,
        declared: TypeRef,
        value: &dyn Any,
        node: &mut Element,
        registry: &Registry,
        session: &mut Session,
    ) -> Result<bool>;

    /// Called for the document root on write. Defaults to
    /// [`write_element`](Self::write_element).
    fn write_root(
        &self,
        declared: TypeRef,
        value: &dyn Any,
        node: &mut Element,
        registry: &Registry,
        session: &mut Session,
    ) -> Result<bool> {
        self.write_element(declared, value, node, registry, session)
    }

    /// Called right after an instance was constructed on read, before any
    /// field is populated. This is the only point where a cycle-aware
    /// strategy can capture the instance's handle, since back references
    /// to it may occur inside its own subtree.
    fn materialized(
        &self,
        value: &dyn Any,
        registry: &Registry,
        session: &mut Session,
    ) -> Result<()> {
        let (_, _, _) = (value, registry, session);
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// TreeStrategy

/// The default strategy: type annotations only, documents are trees.
///
/// On write, an element whose runtime type differs from its declared type
/// is stamped with the runtime type's root name. On read the annotation is
/// removed and resolved back through the registry's name index.
pub struct TreeStrategy {
    attribute: &'static str,
}

impl TreeStrategy {
    /// A tree strategy annotating with the conventional `class` attribute.
    pub fn new() -> Self {
        Self { attribute: "class" }
    }

    /// A tree strategy annotating with a custom attribute name.
    pub fn with_attribute(attribute: &'static str) -> Self {
        Self { attribute }
    }
}

impl Default for TreeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for TreeStrategy {
    fn read_element(
        &self,
        _declared: TypeRef,
        node: &mut Element,
        registry: &Registry,
        _session: &mut Session,
    ) -> Result<Option<Value>> {
        match node.remove_attribute(self.attribute) {
            Some(name) => resolve_annotation(registry, &name).map(Some),
            None => Ok(None),
        }
    }

    fn write_element(
        &self,
        declared: TypeRef,
        value: &dyn Any,
        node: &mut Element,
        registry: &Registry,
        _session: &mut Session,
    ) -> Result<bool> {
        annotate_actual_type(self.attribute, declared, value, node, registry)?;
        Ok(false)
    }
}

fn resolve_annotation(registry: &Registry, name: &str) -> Result<Value> {
    match registry.get_with_name(name) {
        Some(entry) => Ok(Value::of(entry.ty())),
        None if registry.is_ambiguous(name) => Err(Error::instantiation(
            name,
            "type annotation is ambiguous; more than one registered type claims this root name",
        )),
        None => Err(Error::instantiation(
            name,
            "type annotation does not name a registered type",
        )),
    }
}

fn annotate_actual_type(
    attribute: &'static str,
    declared: TypeRef,
    value: &dyn Any,
    node: &mut Element,
    registry: &Registry,
) -> Result<()> {
    if value.type_id() == declared.id() {
        return Ok(());
    }
    let name = registry.root_name(value.type_id()).ok_or_else(|| {
        Error::instantiation(
            declared.name(),
            "runtime type has no registered root name to annotate with",
        )
    })?;
    tracing::trace!(declared = declared.name(), actual = name, "annotating element");
    node.set_attribute(attribute, name);
    Ok(())
}

// -----------------------------------------------------------------------------
// CycleStrategy

/// A strategy that maintains object identity across the document.
///
/// Every shared-capable value (one whose type registered a
/// [`SharedAccess`](crate::ops::SharedAccess)) is stamped with a fresh
/// `id` attribute the first time it is written; later occurrences of the
/// same object write a bare `ref` element pointing back at it. On read,
/// `id` elements are captured as soon as their instance exists and `ref`
/// elements short-circuit to a clone of the captured handle.
pub struct CycleStrategy {
    mark: &'static str,
    refer: &'static str,
    annotation: &'static str,
}

/// Read-side identity table plus the id waiting for its instance.
#[derive(Default)]
struct ReadGraph {
    captured: HashMap<String, (TypeRef, Box<dyn Any>)>,
    pending: Option<String>,
}

/// Write-side identity table: object identity to issued id.
#[derive(Default)]
struct WriteGraph {
    issued: HashMap<usize, usize>,
    next: usize,
}

impl CycleStrategy {
    /// A cycle strategy using the conventional `id`, `ref` and `class`
    /// attribute names.
    pub fn new() -> Self {
        Self {
            mark: "id",
            refer: "ref",
            annotation: "class",
        }
    }

    /// A cycle strategy using custom mark and reference attribute names.
    pub fn with_attributes(mark: &'static str, refer: &'static str) -> Self {
        Self {
            mark,
            refer,
            annotation: "class",
        }
    }
}

impl Default for CycleStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for CycleStrategy {
    fn read_element(
        &self,
        _declared: TypeRef,
        node: &mut Element,
        registry: &Registry,
        session: &mut Session,
    ) -> Result<Option<Value>> {
        if let Some(id) = node.remove_attribute(self.refer) {
            let graph = session.entry::<ReadGraph>();
            let (ty, handle) = graph.captured.get(&id).ok_or_else(|| {
                Error::instantiation(
                    format!("ref {id}"),
                    "reference points at an id that has not been read yet",
                )
            })?;
            let ty = *ty;
            let access = registry.shared(ty.id()).ok_or_else(|| {
                Error::instantiation(ty.name(), "referenced type has no shared access registered")
            })?;
            let clone = access.clone_handle(handle.as_ref()).ok_or_else(|| {
                Error::instantiation(ty.name(), "captured handle has a mismatched type")
            })?;
            return Ok(Some(Value::reference(ty, clone)));
        }

        let resolved = match node.remove_attribute(self.annotation) {
            Some(name) => Some(resolve_annotation(registry, &name)?),
            None => None,
        };
        if let Some(id) = node.remove_attribute(self.mark) {
            session.entry::<ReadGraph>().pending = Some(id);
        }
        Ok(resolved)
    }

    fn write_element(
        &self,
        declared: TypeRef,
        value: &dyn Any,
        node: &mut Element,
        registry: &Registry,
        session: &mut Session,
    ) -> Result<bool> {
        if let Some(access) = registry.shared(value.type_id())
            && let Some(identity) = access.identity(value)
        {
            let graph = session.entry::<WriteGraph>();
            if let Some(&issued) = graph.issued.get(&identity) {
                node.set_attribute(self.refer, issued.to_string());
                return Ok(true);
            }
            let fresh = graph.next;
            graph.next += 1;
            graph.issued.insert(identity, fresh);
            node.set_attribute(self.mark, fresh.to_string());
        }
        annotate_actual_type(self.annotation, declared, value, node, registry)?;
        Ok(false)
    }

    fn materialized(
        &self,
        value: &dyn Any,
        registry: &Registry,
        session: &mut Session,
    ) -> Result<()> {
        let Some(id) = session.entry::<ReadGraph>().pending.take() else {
            return Ok(());
        };
        let entry = registry.get(value.type_id()).ok_or_else(|| {
            Error::instantiation("marked element", "materialized type is not registered")
        })?;
        let access = entry.shared().ok_or_else(|| {
            Error::instantiation(
                entry.ty().name(),
                "element carries an id but its type has no shared access registered",
            )
        })?;
        let handle = access.clone_handle(value).ok_or_else(|| {
            Error::instantiation(entry.ty().name(), "marked value has a mismatched handle type")
        })?;
        session
            .entry::<ReadGraph>()
            .captured
            .insert(id, (entry.ty(), handle));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use core::cell::RefCell;
    use std::rc::Rc;

    use graft_node::Element;

    use super::{CycleStrategy, Session, Strategy, TreeStrategy};
    use crate::ops::SharedAccess;
    use crate::registry::{Registry, TypeRef};

    #[test]
    fn session_slots_are_keyed_by_type() {
        let mut session = Session::new();
        *session.entry::<u32>() = 7;
        session.entry::<String>().push('x');
        assert_eq!(session.get::<u32>(), Some(&7));
        assert_eq!(session.get::<String>().map(String::as_str), Some("x"));
        assert!(session.get::<i64>().is_none());
    }

    #[test]
    fn tree_strategy_leaves_unannotated_elements_alone() {
        let registry = Registry::new();
        let mut session = Session::new();
        let strategy = TreeStrategy::new();
        let mut node = Element::new("value");
        let resolved = strategy
            .read_element(TypeRef::of::<i32>(), &mut node, &registry, &mut session)
            .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn tree_strategy_rejects_unknown_annotations() {
        let registry = Registry::new();
        let mut session = Session::new();
        let strategy = TreeStrategy::new();
        let mut node = Element::new("value").with_attribute("class", "mystery");
        let error = strategy
            .read_element(TypeRef::of::<i32>(), &mut node, &registry, &mut session)
            .unwrap_err();
        assert!(error.to_string().contains("mystery"));
        // The annotation is consumed even though resolution failed.
        assert_eq!(node.attribute("class"), None);
    }

    #[test]
    fn cycle_strategy_skips_types_without_shared_access() {
        type Handle = Rc<RefCell<i32>>;

        let registry = Registry::new();
        let strategy = CycleStrategy::new();
        let mut session = Session::new();

        let shared: Handle = Rc::new(RefCell::new(1));
        let access = SharedAccess::rc_refcell::<i32>();
        assert!(access.identity(&shared).is_some());

        // Handle registered no shared access, so no id is issued and the
        // repeated occurrence is written in full rather than by reference.
        for _ in 0..2 {
            let mut node = Element::new("node");
            let handled = strategy
                .write_element(
                    TypeRef::of::<Handle>(),
                    &shared,
                    &mut node,
                    &registry,
                    &mut session,
                )
                .unwrap();
            assert!(!handled);
            assert_eq!(node.attribute("id"), None);
            assert_eq!(node.attribute("ref"), None);
        }
    }

    #[test]
    fn unseen_reference_is_an_error() {
        let registry = Registry::new();
        let strategy = CycleStrategy::new();
        let mut session = Session::new();
        let mut node = Element::new("node").with_attribute("ref", "3");
        let error = strategy
            .read_element(TypeRef::of::<i32>(), &mut node, &registry, &mut session)
            .unwrap_err();
        assert!(error.to_string().contains("has not been read yet"));
    }
}
