//! Class schemas: the immutable output of scanning, and the consumable
//! per-call working copy.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::label::Label;
use crate::registry::TypeRef;

// -----------------------------------------------------------------------------
// Hooks

type RefHook = Arc<dyn Fn(&dyn Any) -> Result<()> + Send + Sync>;
type MutHook = Arc<dyn Fn(&mut dyn Any) -> Result<()> + Send + Sync>;
type ResolveHook = Arc<dyn Fn(Box<dyn Any>) -> Result<Box<dyn Any>> + Send + Sync>;
type ReplaceHook = Arc<dyn Fn(&dyn Any) -> Result<Option<Box<dyn Any>>> + Send + Sync>;

/// Optional lifecycle hooks attached to a class schema.
///
/// Read side: `validate` then `commit` run after a node was fully
/// consumed; `resolve` may then substitute the materialized instance.
/// Write side: `replace` may substitute the value to serialize, `persist`
/// runs before any node is written, and `complete` runs afterwards even
/// when writing failed.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) persist: Option<RefHook>,
    pub(crate) validate: Option<MutHook>,
    pub(crate) commit: Option<MutHook>,
    pub(crate) complete: Option<RefHook>,
    pub(crate) resolve: Option<ResolveHook>,
    pub(crate) replace: Option<ReplaceHook>,
}

impl Hooks {
    /// Fills empty hook slots from `base`. An already present hook wins,
    /// which gives derived declarations precedence over base ones.
    pub(crate) fn inherit(&mut self, base: &Hooks) {
        macro_rules! keep_first {
            ($($slot:ident),*) => {$(
                if self.$slot.is_none() {
                    self.$slot = base.$slot.clone();
                }
            )*};
        }
        keep_first!(persist, validate, commit, complete, resolve, replace);
    }

    pub(crate) fn persist(&self, value: &dyn Any) -> Result<()> {
        match &self.persist {
            Some(hook) => hook(value),
            None => Ok(()),
        }
    }

    pub(crate) fn validate(&self, value: &mut dyn Any) -> Result<()> {
        match &self.validate {
            Some(hook) => hook(value),
            None => Ok(()),
        }
    }

    pub(crate) fn commit(&self, value: &mut dyn Any) -> Result<()> {
        match &self.commit {
            Some(hook) => hook(value),
            None => Ok(()),
        }
    }

    pub(crate) fn complete(&self, value: &dyn Any) -> Result<()> {
        match &self.complete {
            Some(hook) => hook(value),
            None => Ok(()),
        }
    }

    pub(crate) fn resolve(&self, value: Box<dyn Any>) -> Result<Box<dyn Any>> {
        match &self.resolve {
            Some(hook) => hook(value),
            None => Ok(value),
        }
    }

    pub(crate) fn replace(&self, value: &dyn Any) -> Result<Option<Box<dyn Any>>> {
        match &self.replace {
            Some(hook) => hook(value),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("persist", &self.persist.is_some())
            .field("validate", &self.validate.is_some())
            .field("commit", &self.commit.is_some())
            .field("complete", &self.complete.is_some())
            .field("resolve", &self.resolve.is_some())
            .field("replace", &self.replace.is_some())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// LabelMap

/// An insertion-ordered map from resolved wire name to label.
///
/// Attribute maps ignore the ordering; element maps rely on it for output
/// order. Labels are shared (`Arc`) so a per-call copy is a vector of
/// pointer clones.
#[derive(Clone, Default)]
pub struct LabelMap {
    entries: Vec<(String, Arc<Label>)>,
}

impl LabelMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a label; `false` signals the name was already claimed.
    pub(crate) fn insert(&mut self, name: String, label: Arc<Label>) -> bool {
        if self.contains(&name) {
            return false;
        }
        self.entries.push((name, label));
        true
    }

    /// Whether the map claims the given wire name.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Looks up a label without consuming it.
    pub fn get(&self, name: &str) -> Option<&Arc<Label>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, label)| label)
    }

    /// Removes and returns the label with the given name.
    ///
    /// The take semantics are what per-call validation is built on: a
    /// label still present at the end of a pass was never satisfied.
    pub fn take(&mut self, name: &str) -> Option<Arc<Label>> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    /// Iterates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Label>)> {
        self.entries.iter().map(|(n, label)| (n.as_str(), label))
    }

    /// Number of labels.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map holds no labels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves the listed names to the front, in the listed order. Every
    /// listed name must exist.
    pub(crate) fn reorder(&mut self, listed: &[&'static str]) -> core::result::Result<(), &'static str> {
        let mut ordered = Vec::with_capacity(self.entries.len());
        for &name in listed {
            match self.take(name) {
                Some(label) => ordered.push((name.to_string(), label)),
                None => return Err(name),
            }
        }
        ordered.append(&mut self.entries);
        self.entries = ordered;
        Ok(())
    }
}

impl fmt::Debug for LabelMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(name, _)| name))
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ClassSchema

pub(crate) type InstantiateFn = Box<dyn Fn() -> Box<dyn Any> + Send + Sync>;

/// The immutable schema of one composite type.
///
/// Built once by the scanner, stored in the registry, shared by every
/// call. Invariant: a text label excludes element labels.
pub struct ClassSchema {
    ty: TypeRef,
    name: &'static str,
    strict: bool,
    attributes: LabelMap,
    elements: LabelMap,
    text: Option<Arc<Label>>,
    hooks: Hooks,
    instantiate: InstantiateFn,
}

impl ClassSchema {
    pub(crate) fn new(
        ty: TypeRef,
        name: &'static str,
        strict: bool,
        attributes: LabelMap,
        elements: LabelMap,
        text: Option<Arc<Label>>,
        hooks: Hooks,
        instantiate: InstantiateFn,
    ) -> Self {
        debug_assert!(text.is_none() || elements.is_empty());
        Self {
            ty,
            name,
            strict,
            attributes,
            elements,
            text,
            hooks,
            instantiate,
        }
    }

    /// The described type.
    #[inline]
    pub fn ty(&self) -> TypeRef {
        self.ty
    }

    /// The root wire name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether unknown wire nodes are errors.
    #[inline]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The attribute labels.
    #[inline]
    pub fn attributes(&self) -> &LabelMap {
        &self.attributes
    }

    /// The element labels, in output order.
    #[inline]
    pub fn elements(&self) -> &LabelMap {
        &self.elements
    }

    /// The text label, if any.
    #[inline]
    pub fn text(&self) -> Option<&Arc<Label>> {
        self.text.as_ref()
    }

    /// The lifecycle hooks.
    #[inline]
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Constructs a fresh, empty instance of the type.
    pub fn instance(&self) -> Box<dyn Any> {
        (self.instantiate)()
    }

    /// Creates the consumable working copy for one read pass.
    pub fn calls(&self) -> CallSchema {
        CallSchema {
            ty: self.ty,
            attributes: self.attributes.clone(),
            elements: self.elements.clone(),
            text: self.text.clone(),
        }
    }
}

impl fmt::Debug for ClassSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassSchema")
            .field("ty", &self.ty)
            .field("name", &self.name)
            .field("strict", &self.strict)
            .field("attributes", &self.attributes)
            .field("elements", &self.elements)
            .field("text", &self.text.is_some())
            .finish_non_exhaustive()
    }
}

// -----------------------------------------------------------------------------
// CallSchema

/// A working copy of a class schema's label maps for one read pass.
///
/// Labels are taken as their wire nodes are visited; whatever remains when
/// the node is exhausted either defaults (optional) or fails the call
/// (required). Dropped with the call.
#[derive(Debug)]
pub struct CallSchema {
    ty: TypeRef,
    attributes: LabelMap,
    elements: LabelMap,
    text: Option<Arc<Label>>,
}

impl CallSchema {
    /// Takes the attribute label matching a wire name.
    pub fn take_attribute(&mut self, name: &str) -> Option<Arc<Label>> {
        self.attributes.take(name)
    }

    /// Takes the element label matching a wire name.
    pub fn take_element(&mut self, name: &str) -> Option<Arc<Label>> {
        self.elements.take(name)
    }

    /// Takes the text label.
    pub fn take_text(&mut self) -> Option<Arc<Label>> {
        self.text.take()
    }

    /// Fails with [`Error::FieldRequired`] if any unvisited label is
    /// required.
    pub fn require_satisfied(&self) -> Result<()> {
        let unvisited = self
            .attributes
            .iter()
            .chain(self.elements.iter())
            .chain(self.text.iter().map(|label| (label.name(), label)));
        for (name, label) in unvisited {
            if label.required() {
                tracing::trace!(ty = self.ty.name(), name, "required label unsatisfied");
                return Err(Error::required(name));
            }
        }
        Ok(())
    }
}
