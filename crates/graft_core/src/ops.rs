//! Type-erased operation tables for container and handle types.
//!
//! Converters never see concrete container types; they drive a small fn
//! table built once, at registration time, by a generic constructor. The
//! tables are plain function pointers, so they are `Copy` and cost nothing
//! to hand to a converter built for one field.

use core::any::Any;
use core::cell::RefCell;
use core::hash::Hash;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Error, Result};

// -----------------------------------------------------------------------------
// SequenceOps

/// Erased operations over a `Vec`-shaped collection.
#[derive(Copy, Clone)]
pub struct SequenceOps {
    new: fn() -> Box<dyn Any>,
    push: fn(&mut dyn Any, Box<dyn Any>) -> Result<()>,
    each: fn(&dyn Any, &mut dyn FnMut(&dyn Any) -> Result<()>) -> Result<()>,
    len: fn(&dyn Any) -> usize,
}

impl SequenceOps {
    /// Operations over `Vec<T>`.
    pub fn of<T: Any>() -> Self {
        Self {
            new: new_vec::<T>,
            push: push_vec::<T>,
            each: each_vec::<T>,
            len: len_vec::<T>,
        }
    }

    /// Operations over `Vec<Box<dyn Any>>`, used for union collections
    /// whose entries stay erased until the caller places them.
    pub fn erased() -> Self {
        Self {
            new: || Box::new(Vec::<Box<dyn Any>>::new()),
            push: |seq, item| {
                expect_mut::<Vec<Box<dyn Any>>>(seq)?.push(item);
                Ok(())
            },
            each: |seq, f| {
                for item in expect_ref::<Vec<Box<dyn Any>>>(seq)? {
                    f(item.as_ref())?;
                }
                Ok(())
            },
            len: |seq| {
                seq.downcast_ref::<Vec<Box<dyn Any>>>()
                    .map_or(0, |vec| vec.len())
            },
        }
    }

    /// Creates an empty collection.
    #[inline]
    pub fn new_value(&self) -> Box<dyn Any> {
        (self.new)()
    }

    /// Appends one entry.
    #[inline]
    pub fn push(&self, sequence: &mut dyn Any, entry: Box<dyn Any>) -> Result<()> {
        (self.push)(sequence, entry)
    }

    /// Visits every entry in order.
    #[inline]
    pub fn each(
        &self,
        sequence: &dyn Any,
        f: &mut dyn FnMut(&dyn Any) -> Result<()>,
    ) -> Result<()> {
        (self.each)(sequence, f)
    }

    /// Number of entries.
    #[inline]
    pub fn len(&self, sequence: &dyn Any) -> usize {
        (self.len)(sequence)
    }
}

fn new_vec<T: Any>() -> Box<dyn Any> {
    Box::new(Vec::<T>::new())
}

fn push_vec<T: Any>(sequence: &mut dyn Any, entry: Box<dyn Any>) -> Result<()> {
    let vec = expect_mut::<Vec<T>>(sequence)?;
    match entry.downcast::<T>() {
        Ok(entry) => {
            vec.push(*entry);
            Ok(())
        }
        Err(_) => Err(Error::instantiation(
            core::any::type_name::<T>(),
            "collection entry has a mismatched type",
        )),
    }
}

fn each_vec<T: Any>(sequence: &dyn Any, f: &mut dyn FnMut(&dyn Any) -> Result<()>) -> Result<()> {
    for entry in expect_ref::<Vec<T>>(sequence)? {
        f(entry)?;
    }
    Ok(())
}

fn len_vec<T: Any>(sequence: &dyn Any) -> usize {
    sequence.downcast_ref::<Vec<T>>().map_or(0, |vec| vec.len())
}

// -----------------------------------------------------------------------------
// MapOps

/// Erased operations over a `HashMap`-shaped collection.
#[derive(Copy, Clone)]
pub struct MapOps {
    new: fn() -> Box<dyn Any>,
    insert: fn(&mut dyn Any, Box<dyn Any>, Box<dyn Any>) -> Result<()>,
    each: fn(&dyn Any, &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<()>) -> Result<()>,
    len: fn(&dyn Any) -> usize,
}

impl MapOps {
    /// Operations over `std::collections::HashMap<K, V>`.
    pub fn of<K, V>() -> Self
    where
        K: Any + Eq + Hash,
        V: Any,
    {
        Self {
            new: || Box::new(HashMap::<K, V>::new()),
            insert: insert_map::<K, V>,
            each: each_map::<K, V>,
            len: |map| map.downcast_ref::<HashMap<K, V>>().map_or(0, |m| m.len()),
        }
    }

    /// Creates an empty map.
    #[inline]
    pub fn new_value(&self) -> Box<dyn Any> {
        (self.new)()
    }

    /// Inserts one pair.
    #[inline]
    pub fn insert(&self, map: &mut dyn Any, key: Box<dyn Any>, value: Box<dyn Any>) -> Result<()> {
        (self.insert)(map, key, value)
    }

    /// Visits every pair. Iteration order is the map's own.
    #[inline]
    pub fn each(
        &self,
        map: &dyn Any,
        f: &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<()>,
    ) -> Result<()> {
        (self.each)(map, f)
    }

    /// Number of pairs.
    #[inline]
    pub fn len(&self, map: &dyn Any) -> usize {
        (self.len)(map)
    }
}

fn insert_map<K, V>(map: &mut dyn Any, key: Box<dyn Any>, value: Box<dyn Any>) -> Result<()>
where
    K: Any + Eq + Hash,
    V: Any,
{
    let map = expect_mut::<HashMap<K, V>>(map)?;
    let key = key.downcast::<K>().map_err(|_| {
        Error::instantiation(core::any::type_name::<K>(), "map key has a mismatched type")
    })?;
    let value = value.downcast::<V>().map_err(|_| {
        Error::instantiation(
            core::any::type_name::<V>(),
            "map value has a mismatched type",
        )
    })?;
    map.insert(*key, *value);
    Ok(())
}

fn each_map<K, V>(map: &dyn Any, f: &mut dyn FnMut(&dyn Any, &dyn Any) -> Result<()>) -> Result<()>
where
    K: Any + Eq + Hash,
    V: Any,
{
    for (key, value) in expect_ref::<HashMap<K, V>>(map)? {
        f(key, value)?;
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// SharedAccess

/// Erased identity and cloning for shared-handle types.
///
/// A cycle-aware strategy needs two things from a value: a stable identity
/// (so repeated occurrences of the same object are recognised) and a cheap
/// handle clone (so a back-reference can hand out the already materialized
/// instance). Types that want to participate in reference resolution
/// register one of these alongside their schema.
#[derive(Copy, Clone)]
pub struct SharedAccess {
    identity: fn(&dyn Any) -> Option<usize>,
    clone_handle: fn(&dyn Any) -> Option<Box<dyn Any>>,
}

impl SharedAccess {
    /// Access for `Rc<RefCell<T>>` handles, the usual shape of nodes in a
    /// cyclic graph.
    pub fn rc_refcell<T: Any>() -> Self {
        Self {
            identity: |value| {
                value
                    .downcast_ref::<Rc<RefCell<T>>>()
                    .map(|rc| Rc::as_ptr(rc) as usize)
            },
            clone_handle: |value| {
                value
                    .downcast_ref::<Rc<RefCell<T>>>()
                    .map(|rc| Box::new(Rc::clone(rc)) as Box<dyn Any>)
            },
        }
    }

    /// Access built from custom identity and clone functions.
    pub fn with(
        identity: fn(&dyn Any) -> Option<usize>,
        clone_handle: fn(&dyn Any) -> Option<Box<dyn Any>>,
    ) -> Self {
        Self {
            identity,
            clone_handle,
        }
    }

    /// A stable identity for the object behind `value`, if `value` has the
    /// registered handle type.
    #[inline]
    pub fn identity(&self, value: &dyn Any) -> Option<usize> {
        (self.identity)(value)
    }

    /// A cheap clone of the handle, if `value` has the registered handle
    /// type.
    #[inline]
    pub fn clone_handle(&self, value: &dyn Any) -> Option<Box<dyn Any>> {
        (self.clone_handle)(value)
    }
}

fn expect_ref<T: Any>(value: &dyn Any) -> Result<&T> {
    value.downcast_ref::<T>().ok_or_else(|| {
        Error::instantiation(
            core::any::type_name::<T>(),
            "container passed to erased ops has a mismatched type",
        )
    })
}

fn expect_mut<T: Any>(value: &mut dyn Any) -> Result<&mut T> {
    value.downcast_mut::<T>().ok_or_else(|| {
        Error::instantiation(
            core::any::type_name::<T>(),
            "container passed to erased ops has a mismatched type",
        )
    })
}

#[cfg(test)]
mod tests {
    use core::any::Any;
    use core::cell::RefCell;
    use std::rc::Rc;

    use super::{MapOps, SequenceOps, SharedAccess};

    #[test]
    fn sequence_ops_build_and_walk_a_vec() {
        let ops = SequenceOps::of::<i32>();
        let mut seq = ops.new_value();
        ops.push(seq.as_mut(), Box::new(1_i32)).unwrap();
        ops.push(seq.as_mut(), Box::new(2_i32)).unwrap();
        assert_eq!(ops.len(seq.as_ref()), 2);

        let mut seen = Vec::new();
        ops.each(seq.as_ref(), &mut |entry| {
            seen.push(*entry.downcast_ref::<i32>().unwrap());
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![1, 2]);

        assert_eq!(*seq.downcast::<Vec<i32>>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn sequence_push_rejects_wrong_entry_type() {
        let ops = SequenceOps::of::<i32>();
        let mut seq = ops.new_value();
        assert!(ops.push(seq.as_mut(), Box::new("x".to_string())).is_err());
    }

    #[test]
    fn map_ops_insert_and_walk() {
        let ops = MapOps::of::<String, f64>();
        let mut map = ops.new_value();
        ops.insert(map.as_mut(), Box::new("pi".to_string()), Box::new(3.14_f64))
            .unwrap();
        assert_eq!(ops.len(map.as_ref()), 1);

        ops.each(map.as_ref(), &mut |key, value| {
            assert_eq!(key.downcast_ref::<String>().unwrap(), "pi");
            assert_eq!(*value.downcast_ref::<f64>().unwrap(), 3.14);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn shared_access_tracks_identity() {
        let access = SharedAccess::rc_refcell::<i32>();
        let a = Rc::new(RefCell::new(1_i32));
        let b = Rc::clone(&a);
        let a: Box<dyn Any> = Box::new(a);
        let b: Box<dyn Any> = Box::new(b);

        assert_eq!(access.identity(a.as_ref()), access.identity(b.as_ref()));

        let clone = access.clone_handle(a.as_ref()).unwrap();
        let clone = clone.downcast::<Rc<RefCell<i32>>>().unwrap();
        *clone.borrow_mut() = 5;
        let original = a.downcast::<Rc<RefCell<i32>>>().unwrap();
        assert_eq!(*original.borrow(), 5);
    }
}
