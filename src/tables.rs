use std::collections::BTreeMap;

use crate::clock::{ReferenceBits, ResidentPage};
use crate::constants::Pid;
use crate::swap::SlotId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageTableEntry {
    /// Frame holding the page, `None` while it is swapped out
    pub frame: Option<usize>,
    pub referenced: bool,
}

impl PageTableEntry {
    #[inline]
    pub fn is_resident(&self) -> bool {
        self.frame.is_some()
    }
}

/// Page table and disk-allocation table of one process.
///
/// For every page exactly one of `pages[p].frame` and `slots[p]` is set:
/// a page lives in main memory or in the backing store, never both.
#[derive(Debug, Clone, Default)]
pub struct AddressSpace {
    pages: Vec<PageTableEntry>,
    slots: Vec<Option<SlotId>>,
}

impl AddressSpace {
    /// Tables for pages that all start out in the given swap slots
    pub fn swapped(slots: Vec<SlotId>) -> Self {
        AddressSpace {
            pages: vec![PageTableEntry::default(); slots.len()],
            slots: slots.into_iter().map(Some).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[inline]
    pub fn entry(&self, page: usize) -> &PageTableEntry {
        &self.pages[page]
    }

    #[inline]
    pub fn entry_mut(&mut self, page: usize) -> &mut PageTableEntry {
        &mut self.pages[page]
    }

    /// Swap slot of a page, `None` while it is resident
    #[inline]
    pub fn slot(&self, page: usize) -> Option<SlotId> {
        self.slots[page]
    }

    /// Clear and return the swap slot of a page that is being paged in
    pub fn take_slot(&mut self, page: usize) -> Option<SlotId> {
        self.slots[page].take()
    }

    pub fn set_slot(&mut self, page: usize, slot: SlotId) {
        self.slots[page] = Some(slot);
    }

    pub fn page_table(&self) -> &[PageTableEntry] {
        &self.pages
    }

    pub fn allocation_table(&self) -> &[Option<SlotId>] {
        &self.slots
    }

    /// Frames owned by resident pages, in page order
    pub fn resident_frames(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.pages
            .iter()
            .enumerate()
            .filter_map(|(page, entry)| entry.frame.map(|frame| (page, frame)))
    }

    /// Swap slots owned by swapped-out pages
    pub fn swapped_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.slots.iter().flatten().copied()
    }
}

/// Every process's tables, keyed by the owning pid
#[derive(Debug, Default)]
pub struct AddressSpaces {
    spaces: BTreeMap<Pid, AddressSpace>,
}

impl AddressSpaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: Pid, space: AddressSpace) {
        self.spaces.insert(pid, space);
    }

    pub fn remove(&mut self, pid: Pid) -> Option<AddressSpace> {
        self.spaces.remove(&pid)
    }

    pub fn get(&self, pid: Pid) -> Option<&AddressSpace> {
        self.spaces.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut AddressSpace> {
        self.spaces.get_mut(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.spaces.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }
}

impl ReferenceBits for AddressSpaces {
    fn take_referenced(&mut self, page: &ResidentPage) -> bool {
        match self.spaces.get_mut(&page.space) {
            Some(space) => std::mem::take(&mut space.entry_mut(page.page).referenced),
            None => false,
        }
    }
}
