//! Generic arena for ID-indexed storage of circuit entities.
//!
//! The [`Arena`] provides O(1) insertion, lookup and removal by opaque
//! [`ArenaId`] keys. Removal leaves a vacant slot behind, so an ID is never
//! handed out twice and a stale ID can be detected with [`Arena::contains`].

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Trait for opaque ID types used as arena keys.
///
/// Implementors must provide a bijection between `u32` indices and the ID type.
pub trait ArenaId: Copy {
    /// Creates an ID from a raw `u32` index.
    fn from_raw(index: u32) -> Self;

    /// Returns the raw `u32` index.
    fn as_raw(self) -> u32;
}

/// An ID-indexed container whose IDs stay stable across removals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Arena<I: ArenaId, T> {
    slots: Vec<Option<T>>,
    live: usize,
    #[serde(skip)]
    _marker: PhantomData<I>,
}

impl<I: ArenaId, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: ArenaId, T> Arena<I, T> {
    /// Creates a new, empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            live: 0,
            _marker: PhantomData,
        }
    }

    /// Allocates a new item in the arena and returns its ID.
    pub fn alloc(&mut self, item: T) -> I {
        let id = I::from_raw(self.slots.len() as u32);
        self.slots.push(Some(item));
        self.live += 1;
        id
    }

    /// Allocates an item whose construction needs its own ID.
    pub fn alloc_with(&mut self, make: impl FnOnce(I) -> T) -> I {
        let id = I::from_raw(self.slots.len() as u32);
        self.slots.push(Some(make(id)));
        self.live += 1;
        id
    }

    /// Removes the item with the given ID, leaving its slot vacant.
    pub fn remove(&mut self, id: I) -> Option<T> {
        let item = self.slots.get_mut(id.as_raw() as usize)?.take();
        if item.is_some() {
            self.live -= 1;
        }
        item
    }

    /// Returns `true` if the ID refers to a live item.
    pub fn contains(&self, id: I) -> bool {
        self.try_get(id).is_some()
    }

    /// Returns the item with the given ID, or `None` if it was removed or never existed.
    pub fn try_get(&self, id: I) -> Option<&T> {
        self.slots.get(id.as_raw() as usize)?.as_ref()
    }

    /// Mutable variant of [`try_get`](Self::try_get).
    pub fn try_get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots.get_mut(id.as_raw() as usize)?.as_mut()
    }

    /// Returns a reference to the item with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is out of bounds or was removed.
    pub fn get(&self, id: I) -> &T {
        match self.try_get(id) {
            Some(item) => item,
            None => panic!("stale or invalid arena id {}", id.as_raw()),
        }
    }

    /// Returns a mutable reference to the item with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID is out of bounds or was removed.
    pub fn get_mut(&mut self, id: I) -> &mut T {
        let raw = id.as_raw();
        match self.try_get_mut(id) {
            Some(item) => item,
            None => panic!("stale or invalid arena id {raw}"),
        }
    }

    /// Returns the number of live items in the arena.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the arena contains no live items.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterates over `(ID, &T)` pairs of live items in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|item| (I::from_raw(i as u32), item)))
    }

    /// Iterates over the IDs of live items in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = I> + '_ {
        self.iter().map(|(id, _)| id)
    }

    /// Iterates over references to live items in allocation order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}

impl<I: ArenaId, T> Index<I> for Arena<I, T> {
    type Output = T;

    fn index(&self, id: I) -> &T {
        self.get(id)
    }
}

impl<I: ArenaId, T> IndexMut<I> for Arena<I, T> {
    fn index_mut(&mut self, id: I) -> &mut T {
        self.get_mut(id)
    }
}
