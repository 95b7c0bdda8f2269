use log::{debug, info, warn};

use crate::clock::{Clock, ResidentPage};
use crate::config::Config;
use crate::constants::Pid;
use crate::error::{LoadError, MemoryError};
use crate::io::{ProgramSource, paginate};
use crate::memory::{MainMemory, empty_page};
use crate::process::Pcb;
use crate::swap::{BackingStore, SlotId};
use crate::tables::{AddressSpace, AddressSpaces, PageTableEntry};
use crate::translation::VirtualAddress;

/// Owns main memory, the backing store, the clock and every address space,
/// and moves pages between memory and swap.
pub struct MemoryManager {
    config: Config,
    memory: MainMemory,
    swap: BackingStore,
    clock: Clock,
    spaces: AddressSpaces,
}

impl MemoryManager {
    /// Panics on a zero page size; `Config::validate` rules that out.
    pub fn new(config: Config) -> Self {
        assert!(config.page_size > 0, "page size must be at least 1");
        MemoryManager {
            memory: MainMemory::new(&config),
            swap: BackingStore::new(config.swap_capacity),
            clock: Clock::new(),
            spaces: AddressSpaces::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &MainMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MainMemory {
        &mut self.memory
    }

    pub fn swap(&self) -> &BackingStore {
        &self.swap
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn space(&self, pid: Pid) -> Option<&AddressSpace> {
        self.spaces.get(pid)
    }

    pub fn entry_mut(&mut self, space: Pid, page: usize) -> Result<&mut PageTableEntry, MemoryError> {
        self.spaces
            .get_mut(space)
            .map(|tables| tables.entry_mut(page))
            .ok_or(MemoryError::UnknownSpace(space))
    }

    /// Load a program into fresh tables for `pcb`.
    ///
    /// Every page, including the blank ones that fill the address space up
    /// to its full size, goes straight to the backing store: nothing is
    /// resident until the first access faults it in. On failure no tables
    /// exist and no swap slot stays taken.
    pub fn load_program(&mut self, source: &ProgramSource, pcb: &mut Pcb) -> Result<(), LoadError> {
        let page_size = self.config.page_size;
        let limit = self.config.address_space_size;

        let (size, body) = source.split().inspect_err(|e| {
            warn!("load of {} failed: {}", source.name(), e);
        })?;
        if size / page_size > limit {
            warn!("load of {} failed: declared size {} is too large", source.name(), size);
            return Err(LoadError::TooLarge { pages: size / page_size, limit });
        }

        let mut pages = paginate(&body, page_size);
        if pages.len() > limit {
            warn!("load of {} failed: text spans {} pages", source.name(), pages.len());
            return Err(LoadError::TooLarge { pages: pages.len(), limit });
        }
        if limit > self.swap.available() {
            warn!(
                "load of {} failed: {} pages do not fit in {} free swap slots",
                source.name(),
                limit,
                self.swap.available()
            );
            return Err(LoadError::SwapFull);
        }
        let text_pages = pages.len();
        pages.resize_with(limit, || empty_page(page_size));

        let mut slots: Vec<SlotId> = Vec::with_capacity(limit);
        for page in pages {
            match self.swap.allocate(page) {
                Ok(slot) => slots.push(slot),
                Err(_) => {
                    for slot in slots {
                        self.swap.release(slot);
                    }
                    warn!("load of {} failed: backing store is full", source.name());
                    return Err(LoadError::SwapFull);
                }
            }
        }

        // a reload replaces whatever the pid owned before
        self.release(pcb.pid);
        self.spaces.insert(pcb.pid, AddressSpace::swapped(slots));
        pcb.space = Some(pcb.pid);
        pcb.registers.program_counter = Some(VirtualAddress::default());

        info!(
            "loaded {} (size {}) for process {}: {} of {} pages hold text",
            source.name(),
            size,
            pcb.pid,
            text_pages,
            limit
        );
        Ok(())
    }

    /// Bring `page` of `space` into main memory and return its frame.
    ///
    /// The page leaves the backing store first, which frees its slot, so
    /// writing back an evicted page always finds room.
    pub fn page_fault(&mut self, space: Pid, page: usize) -> Result<usize, MemoryError> {
        let tables = self.spaces.get_mut(space).ok_or(MemoryError::UnknownSpace(space))?;
        if let Some(frame) = tables.entry(page).frame {
            return Ok(frame);
        }

        if self.memory.free_frame().is_none() && self.clock.is_empty() {
            warn!("page fault: no frame for page {} of process {}", page, space);
            return Err(MemoryError::NoFrame);
        }

        let slot = tables
            .take_slot(page)
            .unwrap_or_else(|| panic!("page {} of process {} is neither resident nor swapped", page, space));
        let content = self.swap.fetch(slot);
        debug!("page fault: page {} of process {} read from slot {}", page, space, slot);

        let frame = match self.memory.free_frame() {
            Some(frame) => frame,
            None => {
                debug!("page fault: main memory is full, running clock");
                match self.evict() {
                    Ok(frame) => frame,
                    Err(e) => {
                        // the slot freed by fetch is still free, so this cannot fail
                        let slot = self.swap.allocate(content)?;
                        if let Some(tables) = self.spaces.get_mut(space) {
                            tables.set_slot(page, slot);
                        }
                        return Err(e);
                    }
                }
            }
        };

        self.memory.load_frame(frame, content);
        let tables = self.spaces.get_mut(space).ok_or(MemoryError::UnknownSpace(space))?;
        tables.entry_mut(page).frame = Some(frame);
        self.clock.insert(ResidentPage { space, page });

        debug!("page fault: page {} of process {} now in frame {}", page, space, frame);
        Ok(frame)
    }

    /// Write the clock's victim back to swap and return the frame it held
    fn evict(&mut self) -> Result<usize, MemoryError> {
        let victim = self.clock.select_victim(&mut self.spaces).ok_or(MemoryError::NoFrame)?;
        let tables = self
            .spaces
            .get_mut(victim.space)
            .ok_or(MemoryError::UnknownSpace(victim.space))?;
        let frame = tables
            .entry(victim.page)
            .frame
            .expect("clock holds a page that is not resident");

        let slot = match self.swap.allocate(self.memory.read_frame(frame)) {
            Ok(slot) => slot,
            Err(e) => {
                // still resident, so it goes back on the ring
                self.clock.insert(victim);
                return Err(e);
            }
        };
        tables.set_slot(victim.page, slot);
        tables.entry_mut(victim.page).frame = None;

        debug!(
            "evicted page {} of process {} from frame {} to slot {}",
            victim.page, victim.space, frame, slot
        );
        Ok(frame)
    }

    /// Drop an address space: free its frames, its swap slots and its clock
    /// entries. Returns false when the pid owned no tables.
    pub fn release(&mut self, space: Pid) -> bool {
        let Some(tables) = self.spaces.remove(space) else {
            return false;
        };

        for (_, frame) in tables.resident_frames() {
            self.memory.release_frame(frame);
        }
        for slot in tables.swapped_slots() {
            self.swap.release(slot);
        }
        self.clock.retain(|page| page.space != space);

        debug!("released address space of process {}", space);
        true
    }
}
