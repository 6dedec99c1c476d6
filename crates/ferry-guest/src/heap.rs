//! Reference-counted object heap
//!
//! Objects live in generation-checked slots. A [`Handle`] names a slot and
//! the generation it was allocated in, so a handle to a freed object never
//! resolves to a later occupant of the same slot.
//!
//! Reference counts are explicit: the heap never frees an object on its own
//! initiative. Releasing the last reference frees the object and releases
//! every handle it holds, iteratively, so long chains do not recurse.

use crate::object::Object;

/// Handle to a heap slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Stable numeric identity of the object for as long as it lives
    pub fn id(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }
}

struct Entry {
    refcount: usize,
    object: Object,
}

struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

/// Slot heap with explicit reference counts
pub(crate) struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Heap {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Allocate an object with a reference count of one
    pub(crate) fn allocate(&mut self, object: Object) -> Handle {
        let entry = Some(Entry {
            refcount: 1,
            object,
        });
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entry = entry;
            return Handle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entry,
        });
        Handle {
            index,
            generation: 0,
        }
    }

    fn entry(&self, handle: Handle) -> Option<&Entry> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_ref()
    }

    fn entry_mut(&mut self, handle: Handle) -> Option<&mut Entry> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.entry.as_mut()
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&Object> {
        self.entry(handle).map(|e| &e.object)
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut Object> {
        self.entry_mut(handle).map(|e| &mut e.object)
    }

    pub(crate) fn refcount(&self, handle: Handle) -> Option<usize> {
        self.entry(handle).map(|e| e.refcount)
    }

    /// Acquire one reference. Returns false for a stale handle.
    pub(crate) fn incref(&mut self, handle: Handle) -> bool {
        match self.entry_mut(handle) {
            Some(entry) => {
                entry.refcount += 1;
                true
            }
            None => false,
        }
    }

    /// Release one reference. Freed objects are moved into `freed` so the
    /// caller can drop them after releasing any lock around the heap.
    pub(crate) fn decref(&mut self, handle: Handle, freed: &mut Vec<Object>) {
        let mut pending = vec![handle];

        while let Some(handle) = pending.pop() {
            let Some(slot) = self.slots.get_mut(handle.index as usize) else {
                continue;
            };
            if slot.generation != handle.generation {
                continue;
            }
            let Some(entry) = slot.entry.as_mut() else {
                continue;
            };

            entry.refcount -= 1;
            if entry.refcount > 0 {
                continue;
            }

            if let Some(entry) = slot.entry.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(handle.index);
                self.live -= 1;
                pending.extend(entry.object.children());
                freed.push(entry.object);
            }
        }
    }

    /// Number of live objects
    pub(crate) fn live_count(&self) -> usize {
        self.live
    }

    /// Remove every object regardless of reference counts
    pub(crate) fn drain(&mut self) -> Vec<Object> {
        let objects = std::mem::take(&mut self.slots)
            .into_iter()
            .filter_map(|slot| slot.entry.map(|e| e.object))
            .collect();
        self.free.clear();
        self.live = 0;
        objects
    }
}
