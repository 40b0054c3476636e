//! The schema builder: the typed declaration surface over one bindable
//! type.
//!
//! A builder collects contacts, markers, hooks and ordering for one type
//! and seals them into a [`ClassSchema`] when the type is registered. The
//! typed methods wrap plain field closures into erased contacts, so user
//! code never touches `dyn Any`.
//!
//! # Examples
//!
//! ```
//! use graft_core::{Registry, SchemaBuilder};
//!
//! #[derive(Default)]
//! struct Example {
//!     name: String,
//!     value: i32,
//! }
//!
//! let schema = SchemaBuilder::<Example>::new("example")
//!     .attribute("name", |e: &Example| Some(e.name.clone()), |e, v| e.name = v)
//!     .element("value", |e: &Example| Some(e.value), |e, v| e.value = v);
//!
//! let mut registry = Registry::new();
//! registry.register(schema).unwrap();
//! assert!(registry.get_with_name("example").is_some());
//! ```

use core::any::Any;
use core::hash::Hash;
use core::marker::PhantomData;
use std::collections::HashMap;
use std::sync::Arc;

use crate::contact::Contact;
use crate::error::{Error, Result};
use crate::marker::{ArrayMarker, EntryConfig, ListMarker, MapMarker, Marker, Order};
use crate::ops::{MapOps, SequenceOps, SharedAccess};
use crate::registry::{Registry, TypeRef};
use crate::scanner::{MarkerSet, Scanner};
use crate::schema::{ClassSchema, InstantiateFn};

// -----------------------------------------------------------------------------
// SchemaBuilder

/// Collects the bindings of one type `S`.
///
/// Bindings are declared strict by default: wire content with no matching
/// label fails the call. [`lenient`](Self::lenient) relaxes that to
/// skip-and-continue.
pub struct SchemaBuilder<S> {
    name: &'static str,
    strict: bool,
    set: MarkerSet,
    bases: Vec<MarkerSet>,
    shared: Option<SharedAccess>,
    instantiate: InstantiateFn,
    _ty: PhantomData<fn() -> S>,
}

impl<S: Any> SchemaBuilder<S> {
    /// A builder for a type with a `Default` constructor, bound to the
    /// given root wire name.
    pub fn new(name: &'static str) -> Self
    where
        S: Default,
    {
        Self::new_with(name, S::default)
    }

    /// A builder with an explicit constructor, for types without a usable
    /// `Default`.
    pub fn new_with(
        name: &'static str,
        instantiate: impl Fn() -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            strict: true,
            set: MarkerSet::new(),
            bases: Vec::new(),
            shared: None,
            instantiate: Box::new(move || Box::new(instantiate())),
            _ty: PhantomData,
        }
    }

    /// Skips unmatched wire content instead of failing the call.
    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    // -------------------------------------------------------------------------
    // Scalar bindings

    /// Binds a required attribute.
    pub fn attribute<T: Any>(
        self,
        name: &'static str,
        get: impl Fn(&S) -> Option<T> + Send + Sync + 'static,
        set: impl Fn(&mut S, T) + Send + Sync + 'static,
    ) -> Self {
        self.push(
            Contact::new(name, get, set),
            Marker::Attribute { required: true },
        )
    }

    /// Binds an optional attribute.
    pub fn optional_attribute<T: Any>(
        self,
        name: &'static str,
        get: impl Fn(&S) -> Option<T> + Send + Sync + 'static,
        set: impl Fn(&mut S, T) + Send + Sync + 'static,
    ) -> Self {
        self.push(
            Contact::new(name, get, set),
            Marker::Attribute { required: false },
        )
    }

    /// Binds a required child element.
    pub fn element<T: Any>(
        self,
        name: &'static str,
        get: impl Fn(&S) -> Option<T> + Send + Sync + 'static,
        set: impl Fn(&mut S, T) + Send + Sync + 'static,
    ) -> Self {
        self.push(
            Contact::new(name, get, set),
            Marker::Element { required: true },
        )
    }

    /// Binds an optional child element.
    pub fn optional_element<T: Any>(
        self,
        name: &'static str,
        get: impl Fn(&S) -> Option<T> + Send + Sync + 'static,
        set: impl Fn(&mut S, T) + Send + Sync + 'static,
    ) -> Self {
        self.push(
            Contact::new(name, get, set),
            Marker::Element { required: false },
        )
    }

    /// Binds a required child element whose declared type is abstract.
    ///
    /// The getter hands out an erased clone of whatever concrete value the
    /// field holds; the setter receives the concrete value the resolution
    /// strategy produced and places it behind the field's indirection.
    pub fn element_erased(
        self,
        name: &'static str,
        declared: TypeRef,
        get: impl Fn(&S) -> Option<Box<dyn Any>> + Send + Sync + 'static,
        set: impl Fn(&mut S, Box<dyn Any>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.push(
            Contact::erased(name, declared, get, set),
            Marker::Element { required: true },
        )
    }

    /// Binds an optional abstract child element.
    pub fn optional_element_erased(
        self,
        name: &'static str,
        declared: TypeRef,
        get: impl Fn(&S) -> Option<Box<dyn Any>> + Send + Sync + 'static,
        set: impl Fn(&mut S, Box<dyn Any>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.push(
            Contact::erased(name, declared, get, set),
            Marker::Element { required: false },
        )
    }

    /// Binds the element's text value, required.
    pub fn text<T: Any>(
        self,
        get: impl Fn(&S) -> Option<T> + Send + Sync + 'static,
        set: impl Fn(&mut S, T) + Send + Sync + 'static,
    ) -> Self {
        self.push(Contact::new("text", get, set), Marker::Text { required: true })
    }

    /// Binds the element's text value, optional.
    pub fn optional_text<T: Any>(
        self,
        get: impl Fn(&S) -> Option<T> + Send + Sync + 'static,
        set: impl Fn(&mut S, T) + Send + Sync + 'static,
    ) -> Self {
        self.push(Contact::new("text", get, set), Marker::Text { required: false })
    }

    // -------------------------------------------------------------------------
    // Collection bindings

    /// Binds a `Vec<T>` field as repeated entry elements.
    pub fn list<T: Any>(
        self,
        field: ListField,
        get: impl Fn(&S) -> Option<Vec<T>> + Send + Sync + 'static,
        set: impl Fn(&mut S, Vec<T>) + Send + Sync + 'static,
    ) -> Self {
        let name = field.name;
        let marker = field.into_marker(TypeRef::of::<T>(), SequenceOps::of::<T>());
        self.push(Contact::new(name, get, set), marker)
    }

    /// Binds a `Vec<Box<dyn Any>>` field as repeated entries that stay
    /// erased, for unions whose entries the caller places itself.
    pub fn list_erased(
        self,
        field: ListField,
        entry: TypeRef,
        get: impl Fn(&S) -> Option<Vec<Box<dyn Any>>> + Send + Sync + 'static,
        set: impl Fn(&mut S, Vec<Box<dyn Any>>) + Send + Sync + 'static,
    ) -> Self {
        let name = field.name;
        let marker = field.into_marker(entry, SequenceOps::erased());
        self.push(Contact::new(name, get, set), marker)
    }

    /// Binds a `Vec<T>` field as a length-validated array.
    pub fn array<T: Any>(
        self,
        field: ArrayField,
        get: impl Fn(&S) -> Option<Vec<T>> + Send + Sync + 'static,
        set: impl Fn(&mut S, Vec<T>) + Send + Sync + 'static,
    ) -> Self {
        let name = field.name;
        let marker = Marker::ElementArray(ArrayMarker {
            entry: TypeRef::of::<T>(),
            entry_name: field.entry_name,
            length: field.length,
            required: field.required,
            ops: SequenceOps::of::<T>(),
        });
        self.push(Contact::new(name, get, set), marker)
    }

    /// Binds a `HashMap<K, V>` field as key/value entry elements.
    pub fn map<K, V>(
        self,
        field: MapField,
        get: impl Fn(&S) -> Option<HashMap<K, V>> + Send + Sync + 'static,
        set: impl Fn(&mut S, HashMap<K, V>) + Send + Sync + 'static,
    ) -> Self
    where
        K: Any + Eq + Hash,
        V: Any,
    {
        let name = field.name;
        let marker = Marker::ElementMap(MapMarker {
            key: TypeRef::of::<K>(),
            value: TypeRef::of::<V>(),
            entry: EntryConfig {
                entry: field.entry_name,
                key: field.key_name,
                value: field.value_name,
                key_attribute: field.key_attribute,
                value_text: field.value_text,
            },
            inline: field.inline,
            required: field.required,
            ops: MapOps::of::<K, V>(),
        });
        self.push(Contact::new(name, get, set), marker)
    }

    // -------------------------------------------------------------------------
    // Schema-wide declarations

    /// Overrides the wire order. Listed names come first, unlisted labels
    /// follow in declaration order.
    pub fn order(mut self, attributes: &[&'static str], elements: &[&'static str]) -> Self {
        self.set.order = Some(Order {
            attributes: attributes.to_vec(),
            elements: elements.to_vec(),
        });
        self
    }

    /// Registers shared-handle access, enabling identity tracking for
    /// values of this type under a cycle-aware strategy.
    pub fn shared(mut self, access: SharedAccess) -> Self {
        self.shared = Some(access);
        self
    }

    /// Appends a base declaration level. Labels and hooks already declared
    /// on this builder shadow the base's.
    pub fn merge(mut self, base: MarkerSet) -> Self {
        self.bases.push(base);
        self
    }

    /// Surrenders this builder's own declarations for merging into
    /// another builder.
    pub fn into_parts(self) -> MarkerSet {
        self.set
    }

    // -------------------------------------------------------------------------
    // Hooks

    /// Runs before a value of this type is written.
    pub fn on_persist(
        mut self,
        hook: impl Fn(&S) -> core::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.set.hooks.persist = Some(Arc::new(move |value| {
            hook(expect_ref::<S>(value, "persist")?).map_err(|reason| hook_error::<S>("persist", reason))
        }));
        self
    }

    /// Runs after a node was fully read into a value, before `commit`.
    pub fn on_validate(
        mut self,
        hook: impl Fn(&mut S) -> core::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.set.hooks.validate = Some(Arc::new(move |value| {
            hook(expect_mut::<S>(value, "validate")?)
                .map_err(|reason| hook_error::<S>("validate", reason))
        }));
        self
    }

    /// Runs after `validate`, sealing the freshly read value.
    pub fn on_commit(
        mut self,
        hook: impl Fn(&mut S) -> core::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.set.hooks.commit = Some(Arc::new(move |value| {
            hook(expect_mut::<S>(value, "commit")?).map_err(|reason| hook_error::<S>("commit", reason))
        }));
        self
    }

    /// Runs after a value of this type was written, even when writing
    /// failed.
    pub fn on_complete(
        mut self,
        hook: impl Fn(&S) -> core::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.set.hooks.complete = Some(Arc::new(move |value| {
            hook(expect_ref::<S>(value, "complete")?)
                .map_err(|reason| hook_error::<S>("complete", reason))
        }));
        self
    }

    /// May substitute the freshly read value with another one, the last
    /// step of reading.
    pub fn on_resolve(
        mut self,
        hook: impl Fn(S) -> core::result::Result<S, String> + Send + Sync + 'static,
    ) -> Self {
        self.set.hooks.resolve = Some(Arc::new(move |value| {
            let value = value
                .downcast::<S>()
                .map_err(|_| hook_error::<S>("resolve", "instance has a mismatched type"))?;
            hook(*value)
                .map(|resolved| Box::new(resolved) as Box<dyn Any>)
                .map_err(|reason| hook_error::<S>("resolve", reason))
        }));
        self
    }

    /// May substitute the value about to be written, the first step of
    /// writing.
    pub fn on_replace(
        mut self,
        hook: impl Fn(&S) -> core::result::Result<Option<S>, String> + Send + Sync + 'static,
    ) -> Self {
        self.set.hooks.replace = Some(Arc::new(move |value| {
            hook(expect_ref::<S>(value, "replace")?)
                .map(|substitute| substitute.map(|value| Box::new(value) as Box<dyn Any>))
                .map_err(|reason| hook_error::<S>("replace", reason))
        }));
        self
    }

    // -------------------------------------------------------------------------
    // Sealing

    /// Scans the collected declarations into an immutable schema.
    ///
    /// Wire names of inline labels resolve against `registry`, so types
    /// whose root names they borrow must already be registered.
    pub(crate) fn finish(self, registry: &Registry) -> Result<(ClassSchema, Option<SharedAccess>)> {
        let mut sets = Vec::with_capacity(1 + self.bases.len());
        sets.push(self.set);
        sets.extend(self.bases);
        let schema = Scanner::new(registry).scan(
            TypeRef::of::<S>(),
            self.name,
            self.strict,
            sets,
            self.instantiate,
        )?;
        Ok((schema, self.shared))
    }

    fn push(mut self, contact: Contact, marker: Marker) -> Self {
        self.set.items.push((contact, marker));
        self
    }
}

fn hook_error<S>(hook: &'static str, reason: impl Into<String>) -> Error {
    Error::Hook {
        hook,
        type_name: core::any::type_name::<S>(),
        reason: reason.into(),
    }
}

fn expect_ref<'a, S: Any>(value: &'a dyn Any, hook: &'static str) -> Result<&'a S> {
    value
        .downcast_ref::<S>()
        .ok_or_else(|| hook_error::<S>(hook, "instance has a mismatched type"))
}

fn expect_mut<'a, S: Any>(value: &'a mut dyn Any, hook: &'static str) -> Result<&'a mut S> {
    value
        .downcast_mut::<S>()
        .ok_or_else(|| hook_error::<S>(hook, "instance has a mismatched type"))
}

// -----------------------------------------------------------------------------
// Field configurations

/// Configuration of a list binding.
///
/// ```
/// use graft_core::ListField;
///
/// let field = ListField::new("servers").entry("server").inline().optional();
/// ```
#[derive(Copy, Clone, Debug)]
pub struct ListField {
    name: &'static str,
    entry_name: Option<&'static str>,
    inline: bool,
    union: bool,
    required: bool,
}

impl ListField {
    /// A required, wrapped list declared under the given property name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry_name: None,
            inline: false,
            union: false,
            required: true,
        }
    }

    /// Overrides the entry element name. Without an override, entries use
    /// the entry type's registered root name.
    pub fn entry(mut self, name: &'static str) -> Self {
        self.entry_name = Some(name);
        self
    }

    /// Entries repeat directly on the owning element, with no wrapper.
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// Entries resolve polymorphically and the run extends to the end of
    /// the owning element. Implies [`inline`](Self::inline).
    pub fn union(mut self) -> Self {
        self.union = true;
        self.inline = true;
        self
    }

    /// A missing list is left at its default instead of failing the call.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn into_marker(self, entry: TypeRef, ops: SequenceOps) -> Marker {
        Marker::ElementList(ListMarker {
            entry,
            entry_name: self.entry_name,
            inline: self.inline,
            union: self.union,
            required: self.required,
            ops,
        })
    }
}

/// Configuration of an array binding.
#[derive(Copy, Clone, Debug)]
pub struct ArrayField {
    name: &'static str,
    entry_name: Option<&'static str>,
    length: Option<usize>,
    required: bool,
}

impl ArrayField {
    /// A required array declared under the given property name.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry_name: None,
            length: None,
            required: true,
        }
    }

    /// Overrides the entry element name.
    pub fn entry(mut self, name: &'static str) -> Self {
        self.entry_name = Some(name);
        self
    }

    /// Declares a fixed element count, validated on both read and write.
    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    /// A missing array is left at its default instead of failing the call.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Configuration of a map binding.
///
/// ```
/// use graft_core::MapField;
///
/// // <entry key="k"><value>v</value></entry>
/// let field = MapField::new("settings").attribute_keys();
/// ```
#[derive(Copy, Clone, Debug)]
pub struct MapField {
    name: &'static str,
    entry_name: &'static str,
    key_name: &'static str,
    value_name: &'static str,
    key_attribute: bool,
    value_text: bool,
    inline: bool,
    required: bool,
}

impl MapField {
    /// A required, wrapped map declared under the given property name,
    /// with the conventional `entry`, `key` and `value` node names.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entry_name: "entry",
            key_name: "key",
            value_name: "value",
            key_attribute: false,
            value_text: false,
            inline: false,
            required: true,
        }
    }

    /// Overrides the entry element name.
    pub fn entry(mut self, name: &'static str) -> Self {
        self.entry_name = name;
        self
    }

    /// Overrides the key node name.
    pub fn key(mut self, name: &'static str) -> Self {
        self.key_name = name;
        self
    }

    /// Overrides the value node name.
    pub fn value(mut self, name: &'static str) -> Self {
        self.value_name = name;
        self
    }

    /// Places keys as an attribute of the entry element. Requires a
    /// primitive key type.
    pub fn attribute_keys(mut self) -> Self {
        self.key_attribute = true;
        self
    }

    /// Places values as the entry element's text. Requires a primitive
    /// value type.
    pub fn text_values(mut self) -> Self {
        self.value_text = true;
        self
    }

    /// Entry elements repeat directly on the owning element.
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    /// A missing map is left at its default instead of failing the call.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}
