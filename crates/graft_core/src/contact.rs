//! Field descriptors: the uniform read/write surface over one field.

use core::any::Any;
use core::fmt;

use crate::error::{Error, Result};
use crate::registry::TypeRef;

// -----------------------------------------------------------------------------
// Contact

type GetFn = Box<dyn Fn(&dyn Any) -> Result<Option<Box<dyn Any>>> + Send + Sync>;
type SetFn = Box<dyn Fn(&mut dyn Any, Box<dyn Any>) -> Result<()> + Send + Sync>;

/// A uniform accessor over one field of a bindable type.
///
/// A contact reads a field as an owned clone (`None` meaning the field is
/// null) and writes a converted value back. It also remembers the field's
/// declared type so the converter factory can classify it.
///
/// The common constructor is [`Contact::new`], which wraps plain typed
/// closures. [`Contact::erased`] supports trait-object-typed fields, where
/// the declared type is abstract and the setter receives whatever concrete
/// type the resolution strategy produced.
///
/// # Examples
///
/// ```
/// use graft_core::Contact;
///
/// struct Example {
///     name: String,
/// }
///
/// let contact = Contact::new::<Example, String>(
///     "name",
///     |e| Some(e.name.clone()),
///     |e, value| e.name = value,
/// );
///
/// let mut example = Example { name: String::new() };
/// contact.set(&mut example, Box::new("x".to_string())).unwrap();
/// assert_eq!(example.name, "x");
/// ```
pub struct Contact {
    name: &'static str,
    declared: TypeRef,
    erased: bool,
    get: GetFn,
    set: SetFn,
}

impl Contact {
    /// Creates a contact over a typed field.
    ///
    /// `get` clones the current value out (`None` = null); `set` stores a
    /// converted value. The declared type is `T`.
    pub fn new<S, T>(
        name: &'static str,
        get: impl Fn(&S) -> Option<T> + Send + Sync + 'static,
        set: impl Fn(&mut S, T) + Send + Sync + 'static,
    ) -> Self
    where
        S: Any,
        T: Any,
    {
        Self {
            name,
            declared: TypeRef::of::<T>(),
            erased: false,
            get: Box::new(move |instance| {
                let instance = downcast_ref::<S>(instance, name)?;
                Ok(get(instance).map(|value| Box::new(value) as Box<dyn Any>))
            }),
            set: Box::new(move |instance, value| {
                let instance = downcast_mut::<S>(instance, name)?;
                match value.downcast::<T>() {
                    Ok(value) => {
                        set(instance, *value);
                        Ok(())
                    }
                    Err(_) => Err(Error::instantiation(
                        core::any::type_name::<T>(),
                        format!("value set on contact `{name}` has a mismatched type"),
                    )),
                }
            }),
        }
    }

    /// Creates a contact over a field whose declared type is abstract.
    ///
    /// `declared` is the abstract type identity, typically
    /// `TypeRef::of::<dyn Trait>()`. The getter produces an already erased
    /// clone of the field value; the setter receives the concrete value the
    /// strategy resolved and is responsible for placing it behind the
    /// field's own indirection.
    pub fn erased<S>(
        name: &'static str,
        declared: TypeRef,
        get: impl Fn(&S) -> Option<Box<dyn Any>> + Send + Sync + 'static,
        set: impl Fn(&mut S, Box<dyn Any>) -> Result<()> + Send + Sync + 'static,
    ) -> Self
    where
        S: Any,
    {
        Self {
            name,
            declared,
            erased: true,
            get: Box::new(move |instance| Ok(get(downcast_ref::<S>(instance, name)?))),
            set: Box::new(move |instance, value| set(downcast_mut::<S>(instance, name)?, value)),
        }
    }

    /// The property name this contact was declared under.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared type of the field.
    #[inline]
    pub fn declared(&self) -> TypeRef {
        self.declared
    }

    /// Whether the declared type is abstract (trait-object field).
    #[inline]
    pub fn is_erased(&self) -> bool {
        self.erased
    }

    /// Reads the field from `instance` as an owned clone.
    ///
    /// `Ok(None)` means the field is null.
    #[inline]
    pub fn get(&self, instance: &dyn Any) -> Result<Option<Box<dyn Any>>> {
        (self.get)(instance)
    }

    /// Stores a converted value on `instance`.
    #[inline]
    pub fn set(&self, instance: &mut dyn Any, value: Box<dyn Any>) -> Result<()> {
        (self.set)(instance, value)
    }
}

impl fmt::Debug for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contact")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("erased", &self.erased)
            .finish_non_exhaustive()
    }
}

fn downcast_ref<'a, S: Any>(instance: &'a dyn Any, contact: &'static str) -> Result<&'a S> {
    instance.downcast_ref::<S>().ok_or_else(|| {
        Error::instantiation(
            core::any::type_name::<S>(),
            format!("instance passed to contact `{contact}` has a mismatched type"),
        )
    })
}

fn downcast_mut<'a, S: Any>(instance: &'a mut dyn Any, contact: &'static str) -> Result<&'a mut S> {
    instance.downcast_mut::<S>().ok_or_else(|| {
        Error::instantiation(
            core::any::type_name::<S>(),
            format!("instance passed to contact `{contact}` has a mismatched type"),
        )
    })
}

#[cfg(test)]
mod tests {
    use core::any::Any;

    use super::Contact;
    use crate::registry::TypeRef;

    #[derive(Default)]
    struct Sample {
        value: i32,
        label: Option<String>,
    }

    #[test]
    fn typed_contact_round_trips() {
        let contact = Contact::new::<Sample, i32>("value", |s| Some(s.value), |s, v| s.value = v);
        let mut sample = Sample::default();

        contact.set(&mut sample, Box::new(7_i32)).unwrap();
        assert_eq!(sample.value, 7);

        let read = contact.get(&sample).unwrap().unwrap();
        assert_eq!(*read.downcast::<i32>().unwrap(), 7);
    }

    #[test]
    fn optional_field_reads_null() {
        let contact = Contact::new::<Sample, String>(
            "label",
            |s| s.label.clone(),
            |s, v| s.label = Some(v),
        );
        let sample = Sample::default();
        assert!(contact.get(&sample).unwrap().is_none());
    }

    #[test]
    fn mismatched_value_type_is_rejected() {
        let contact = Contact::new::<Sample, i32>("value", |s| Some(s.value), |s, v| s.value = v);
        let mut sample = Sample::default();
        let error = contact
            .set(&mut sample, Box::new("seven".to_string()))
            .unwrap_err();
        assert!(error.to_string().contains("mismatched type"));
    }

    trait Shape: Any {}

    #[test]
    fn erased_contact_reports_abstract_declared_type() {
        struct Holder;
        let contact = Contact::erased::<Holder>(
            "shape",
            TypeRef::of::<dyn Shape>(),
            |_| None,
            |_, _| Ok(()),
        );
        assert!(contact.is_erased());
        assert_eq!(contact.declared(), TypeRef::of::<dyn Shape>());
    }
}
