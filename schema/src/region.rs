use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::sync::Arc;

use crate::schema::{RegionSchema, StructId};
use crate::value::Value;

/// An untyped handle to an object in a region: the struct it belongs to and
/// its pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instance {
    pub ty:    StructId,
    pub index: usize,
}

impl Instance {
    pub fn new(ty: StructId, index: usize) -> Instance {
        Instance { ty, index }
    }
}

/// A typed reference to an object of type `T`, stored as its pool index.
pub struct Ref<T> {
    index:  usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Ref<T> {
    pub fn new(index: usize) -> Ref<T> {
        Ref { index, marker: PhantomData }
    }

    pub fn index(self) -> usize {
        self.index
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ref<T> {}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Ref<T> {}

impl<T> Hash for Ref<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// An append-only pool of objects. An object's index is the pool length at
/// the moment it was pushed, so indices are dense and never change.
#[derive(Debug, Clone, PartialEq)]
pub struct Pool<T> {
    objects: Vec<T>,
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Pool { objects: Vec::new() }
    }
}

impl<T> Pool<T> {
    pub fn new() -> Pool<T> {
        Pool::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn push(&mut self, object: T) -> Ref<T> {
        let r = Ref::new(self.objects.len());
        self.objects.push(object);
        r
    }

    pub fn get(&self, r: Ref<T>) -> Option<&T> {
        self.objects.get(r.index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.objects.iter_mut()
    }

    /// References to every object, in allocation order.
    pub fn refs(&self) -> impl Iterator<Item = Ref<T>> {
        (0..self.objects.len()).map(Ref::new)
    }
}

impl<T> Index<Ref<T>> for Pool<T> {
    type Output = T;

    fn index(&self, r: Ref<T>) -> &T {
        &self.objects[r.index]
    }
}

impl<T> IndexMut<Ref<T>> for Pool<T> {
    fn index_mut(&mut self, r: Ref<T>) -> &mut T {
        &mut self.objects[r.index]
    }
}

/// The interface the binder needs from a region.
///
/// Allocation is the only way objects enter a region; there is no removal.
/// Fields are addressed by their declaration-order ID
/// ([FieldSchema::id](struct.FieldSchema.html#structfield.id)).
pub trait Region {
    fn schema(&self) -> &Arc<RegionSchema>;

    /// Allocate a new object of the struct called `name`. Returns `None` if
    /// the region has no such struct.
    fn allocate(&mut self, name: &str) -> Option<Instance>;

    /// Store a bound value into field `field` of `instance`.
    ///
    /// # Panics
    ///
    /// Panics if the value does not fit the field's declared type. The binder
    /// only assigns values it has checked against the schema, so a mismatch
    /// means the region and its schema disagree.
    fn assign(&mut self, instance: Instance, field: usize, value: Value);

    /// Number of objects currently allocated for `ty`.
    fn pool_len(&self, ty: StructId) -> usize;
}
