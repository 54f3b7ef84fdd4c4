use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use anyhow::Result;

use crate::agires::resource::ResourceID;

struct Slot<T> {
    value: Rc<T>,
    pins: usize,
}

type Slots<T> = RefCell<HashMap<ResourceID, Slot<T>>>;

/// Decoded resources keyed by id. A slot is pinned while any handle to it is
/// alive; unpinned slots stay resident until `evict_unused`.
pub struct ResourceCache<T> {
    slots: Rc<Slots<T>>,
}

pub struct CacheHandle<T> {
    id: ResourceID,
    value: Rc<T>,
    slots: Weak<Slots<T>>,
}

impl<T> ResourceCache<T> {
    pub fn new() -> Self {
        ResourceCache{ slots: Rc::new(RefCell::new(HashMap::new())) }
    }

    /// Returns the cached value, running `loader` on first use. A failing
    /// loader leaves the table untouched.
    pub fn acquire<F>(&self, id: ResourceID, loader: F) -> Result<CacheHandle<T>>
        where F: FnOnce(&ResourceID) -> Result<T>
    {
        if let Some(slot) = self.slots.borrow_mut().get_mut(&id) {
            slot.pins += 1;
            return Ok(CacheHandle{ id, value: slot.value.clone(), slots: Rc::downgrade(&self.slots) });
        }

        let value = Rc::new(loader(&id)?);
        self.slots.borrow_mut().insert(id, Slot{ value: value.clone(), pins: 1 });
        Ok(CacheHandle{ id, value, slots: Rc::downgrade(&self.slots) })
    }

    pub fn release(&self, handle: CacheHandle<T>) {
        drop(handle);
    }

    pub fn contains(&self, id: &ResourceID) -> bool {
        self.slots.borrow().contains_key(id)
    }

    pub fn is_pinned(&self, id: &ResourceID) -> bool {
        self.slots.borrow().get(id).map_or(false, |s| s.pins > 0)
    }

    /// Drops every slot without a live handle, returning how many went
    pub fn evict_unused(&self) -> usize {
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|_, s| s.pins > 0);
        before - slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

impl<T> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CacheHandle<T> {
    pub fn id(&self) -> ResourceID {
        self.id
    }
}

impl<T> Deref for CacheHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Clone for CacheHandle<T> {
    fn clone(&self) -> Self {
        if let Some(slots) = self.slots.upgrade() {
            if let Some(slot) = slots.borrow_mut().get_mut(&self.id) {
                slot.pins += 1;
            }
        }
        CacheHandle{ id: self.id, value: self.value.clone(), slots: self.slots.clone() }
    }
}

impl<T> Drop for CacheHandle<T> {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.upgrade() {
            if let Some(slot) = slots.borrow_mut().get_mut(&self.id) {
                slot.pins = slot.pins.saturating_sub(1);
            }
        }
    }
}
