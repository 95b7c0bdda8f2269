use log::{debug, warn};

use crate::error::MemoryError;
use crate::memory::Page;

pub type SlotId = usize;

/// A stored page plus whether it still belongs to someone
struct Slot {
    page: Page,
    present: bool,
}

/// Backing store shared by every process.
///
/// A page occupies a slot only while it is swapped out: `fetch` frees the
/// slot again, and the next `allocate` may overwrite it. Slots are reused
/// lowest index first; the pool only grows while no freed slot exists.
pub struct BackingStore {
    slots: Vec<Slot>,
    capacity: usize,
}

impl BackingStore {
    pub fn new(capacity: usize) -> Self {
        BackingStore { slots: Vec::new(), capacity }
    }

    /// Store a page in the lowest free slot, growing the pool if needed
    pub fn allocate(&mut self, page: Page) -> Result<SlotId, MemoryError> {
        if let Some(id) = self.slots.iter().position(|slot| !slot.present) {
            self.slots[id] = Slot { page, present: true };
            debug!("swap: page stored in reused slot {}", id);
            return Ok(id);
        }

        if self.slots.len() >= self.capacity {
            warn!("swap: backing store is full ({} slots)", self.capacity);
            return Err(MemoryError::SwapFull);
        }

        self.slots.push(Slot { page, present: true });
        let id = self.slots.len() - 1;
        debug!("swap: page stored in new slot {}", id);
        Ok(id)
    }

    /// Take a page back out. The slot is free afterwards but keeps its
    /// content until the next allocation overwrites it.
    pub fn fetch(&mut self, id: SlotId) -> Page {
        let slot = &mut self.slots[id];
        slot.present = false;
        debug!("swap: slot {} fetched", id);
        slot.page.clone()
    }

    /// Drop a page without reading it (owner destroyed)
    pub fn release(&mut self, id: SlotId) {
        self.slots[id].present = false;
    }

    pub fn is_present(&self, id: SlotId) -> bool {
        self.slots.get(id).is_some_and(|slot| slot.present)
    }

    /// Slots currently holding a page
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|slot| slot.present).count()
    }

    /// Slots ever created (present or reusable)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pages that can still be stored, reusing freed slots or growing
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.in_use())
    }
}
