use log::{debug, warn};

use crate::config::Config;
use crate::constants::Pid;
use crate::error::MemoryError;
use crate::manager::MemoryManager;

/// A virtual address split into page number and offset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VirtualAddress {
    pub page: usize,
    pub offset: usize,
}

impl VirtualAddress {
    pub fn new(page: usize, offset: usize) -> Self {
        VirtualAddress { page, offset }
    }

    /// The following cell, rolling over into the next page
    pub fn next(self, page_size: usize) -> Self {
        if self.offset + 1 < page_size {
            VirtualAddress { offset: self.offset + 1, ..self }
        } else {
            VirtualAddress { page: self.page + 1, offset: 0 }
        }
    }
}

impl std::fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(p={}, w={})", self.page, self.offset)
    }
}

/// Fixed-width decimal encoding of virtual addresses.
///
/// The offset takes as many digits as the page size has, the page number as
/// many as the address-space size has; both are zero padded. With page size
/// 4 and 32 pages, page 2 offset 1 is written `021`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressFormat {
    page_size: usize,
    address_space_size: usize,
    offset_digits: usize,
    page_digits: usize,
}

impl AddressFormat {
    pub fn new(config: &Config) -> Self {
        AddressFormat {
            page_size: config.page_size,
            address_space_size: config.address_space_size,
            offset_digits: config.offset_digits(),
            page_digits: config.page_digits(),
        }
    }

    /// Decode an address. The last `offset_digits` digits are the offset and
    /// whatever precedes them the page, so a short page part such as `21`
    /// for `021` is accepted.
    pub fn parse(&self, text: &str) -> Result<VirtualAddress, MemoryError> {
        let violation = || MemoryError::AccessViolation { address: text.to_string() };

        if text.len() < self.offset_digits || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(violation());
        }

        let split = text.len() - self.offset_digits;
        let offset = text[split..].parse::<usize>().map_err(|_| violation())?;
        let page = match &text[..split] {
            "" => 0,
            digits => digits.parse::<usize>().map_err(|_| violation())?,
        };

        self.check(VirtualAddress { page, offset }).map_err(|_| violation())
    }

    /// Encode an address at full width
    pub fn format(&self, va: VirtualAddress) -> String {
        format!(
            "{:0pw$}{:0ow$}",
            va.page,
            va.offset,
            pw = self.page_digits,
            ow = self.offset_digits
        )
    }

    /// Address of the `index`-th cell of a program
    pub fn from_index(&self, index: usize) -> VirtualAddress {
        VirtualAddress { page: index / self.page_size, offset: index % self.page_size }
    }

    /// Reject offsets past the page and pages past the address space
    pub fn check(&self, va: VirtualAddress) -> Result<VirtualAddress, MemoryError> {
        if va.offset >= self.page_size || va.page >= self.address_space_size {
            return Err(MemoryError::AccessViolation { address: self.format(va) });
        }
        Ok(va)
    }
}

/// Address translator.
///
/// Every access goes through the page table of the address space named by
/// the caller. Pages that are not resident are faulted in on the spot, so
/// a translation only fails for addresses outside the address space.
pub struct Mmu {
    manager: MemoryManager,
    format: AddressFormat,
}

impl Mmu {
    pub fn new(manager: MemoryManager) -> Self {
        let format = AddressFormat::new(manager.config());
        Mmu { manager, format }
    }

    pub fn manager(&self) -> &MemoryManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut MemoryManager {
        &mut self.manager
    }

    pub fn format(&self) -> &AddressFormat {
        &self.format
    }

    /// Translate an encoded virtual address to a physical one
    pub fn resolve(&mut self, space: Pid, address: &str) -> Result<usize, MemoryError> {
        let va = self.format.parse(address).inspect_err(|_| {
            warn!("MMU: access violation, virtual address {} does not exist", address);
        })?;
        self.translate(space, va)
    }

    /// Translate a decoded virtual address to a physical one
    pub fn translate(&mut self, space: Pid, va: VirtualAddress) -> Result<usize, MemoryError> {
        let va = self.format.check(va)?;

        let entry = self.manager.entry_mut(space, va.page)?;
        entry.referenced = true;
        let resident = entry.frame;
        let frame = match resident {
            Some(frame) => frame,
            None => {
                debug!("MMU: page fault for {} in process {}", self.format.format(va), space);
                let frame = self.manager.page_fault(space, va.page)?;
                self.manager.entry_mut(space, va.page)?.referenced = true;
                frame
            }
        };

        Ok(frame * self.format.page_size + va.offset)
    }

    pub fn read_cell(&mut self, space: Pid, address: &str) -> Result<String, MemoryError> {
        let pa = self.resolve(space, address)?;
        Ok(self.manager.memory().read(pa).to_string())
    }

    pub fn write_cell(
        &mut self,
        space: Pid,
        address: &str,
        value: impl Into<String>,
    ) -> Result<(), MemoryError> {
        let pa = self.resolve(space, address)?;
        self.manager.memory_mut().write(pa, value);
        Ok(())
    }

    /// Write straight to a physical address, bypassing translation.
    ///
    /// Only for delivering I/O results to a destination that was resolved
    /// when the request was issued.
    pub fn write_absolute(&mut self, physical: usize, value: impl Into<String>) {
        self.manager.memory_mut().write(physical, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ProgramSource;
    use crate::process::Pcb;

    const INIT: &str = include_str!("../programs/init");

    fn format() -> AddressFormat {
        AddressFormat::new(&Config::default())
    }

    /// Two frames of four cells, init loaded as process 1
    fn setup_mmu(frames: usize) -> Mmu {
        let mut manager = MemoryManager::new(Config::default().with_frames(frames).unwrap());
        let mut pcb = Pcb::new(1);
        manager.load_program(&ProgramSource::new("init", INIT), &mut pcb).unwrap();
        Mmu::new(manager)
    }

    // =========================================================================
    // Address encoding
    // =========================================================================

    #[test]
    fn test_parse_full_width() {
        let format = format();
        assert_eq!(format.parse("000").unwrap(), VirtualAddress::new(0, 0));
        assert_eq!(format.parse("021").unwrap(), VirtualAddress::new(2, 1));
        assert_eq!(format.parse("313").unwrap(), VirtualAddress::new(31, 3));
    }

    #[test]
    fn test_parse_short_page_part() {
        let format = format();
        assert_eq!(format.parse("21").unwrap(), VirtualAddress::new(2, 1));
        assert_eq!(format.parse("3").unwrap(), VirtualAddress::new(0, 3));
    }

    #[test]
    fn test_parse_out_of_range() {
        let format = format();
        // offset 4 with page size 4
        assert!(format.parse("004").is_err());
        // page 32 of 32
        assert!(format.parse("320").is_err());
    }

    #[test]
    fn test_parse_garbage() {
        let format = format();
        for text in ["", "a1", "1-2", " 01", "99999999999999999999999999"] {
            assert!(
                matches!(format.parse(text), Err(MemoryError::AccessViolation { .. })),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn test_format_pads_both_parts() {
        let format = format();
        assert_eq!(format.format(VirtualAddress::new(0, 0)), "000");
        assert_eq!(format.format(VirtualAddress::new(2, 1)), "021");
        assert_eq!(format.format(VirtualAddress::new(31, 3)), "313");

        let wide = AddressFormat::new(&Config { page_size: 16, ..Config::default() });
        assert_eq!(wide.format(VirtualAddress::new(3, 7)), "0307");
        assert_eq!(wide.parse("0307").unwrap(), VirtualAddress::new(3, 7));
    }

    #[test]
    fn test_from_index() {
        let format = format();
        assert_eq!(format.from_index(0), VirtualAddress::new(0, 0));
        assert_eq!(format.from_index(11), VirtualAddress::new(2, 3));
        assert_eq!(format.from_index(20), VirtualAddress::new(5, 0));
    }

    #[test]
    fn test_next_rolls_over() {
        assert_eq!(VirtualAddress::new(0, 2).next(4), VirtualAddress::new(0, 3));
        assert_eq!(VirtualAddress::new(0, 3).next(4), VirtualAddress::new(1, 0));
    }

    #[test]
    fn test_display() {
        let display = format!("{}", VirtualAddress::new(2, 1));
        assert!(display.contains("p=2"));
        assert!(display.contains("w=1"));
    }

    // =========================================================================
    // Translation
    // =========================================================================

    #[test]
    fn test_resolve_address() {
        let mut mmu = setup_mmu(2);

        assert_eq!(mmu.read_cell(1, "03").unwrap(), "write_val >");
        assert_eq!(mmu.resolve(1, "00").unwrap(), 0);
        assert_eq!(mmu.resolve(1, "10").unwrap(), 4);
        // both frames taken: page 0 loses its frame to page 2
        assert_eq!(mmu.resolve(1, "21").unwrap(), 1);
        let frame = mmu.manager().space(1).unwrap().entry(2).frame.unwrap();
        assert_eq!(mmu.resolve(1, "21").unwrap(), frame * 4 + 1);
    }

    #[test]
    fn test_resolve_marks_referenced() {
        let mut mmu = setup_mmu(2);
        mmu.resolve(1, "10").unwrap();

        let entry = *mmu.manager().space(1).unwrap().entry(1);
        assert!(entry.referenced);
        assert_eq!(entry.frame, Some(0));
    }

    #[test]
    fn test_resident_page_does_not_fault() {
        let mut mmu = setup_mmu(2);
        mmu.resolve(1, "000").unwrap();
        let in_use = mmu.manager().swap().in_use();

        assert_eq!(mmu.read_cell(1, "000").unwrap(), "create_console");
        assert_eq!(mmu.manager().swap().in_use(), in_use);
        assert_eq!(mmu.manager().clock().len(), 1);
    }

    #[test]
    fn test_get_and_set_memory_cell() {
        let mut mmu = setup_mmu(2);

        assert_eq!(mmu.read_cell(1, "000").unwrap(), "create_console");
        assert_eq!(mmu.read_cell(1, "010").unwrap(), "read 20");
        assert_eq!(mmu.read_cell(1, "020").unwrap(), "create_process 20");

        mmu.write_cell(1, "000", "1. Befehl").unwrap();
        assert_eq!(mmu.read_cell(1, "000").unwrap(), "1. Befehl");
    }

    #[test]
    fn test_written_cell_survives_eviction() {
        let mut mmu = setup_mmu(1);
        mmu.write_cell(1, "050", "hello").unwrap();
        for page in 0..4 {
            mmu.resolve(1, &format!("0{}0", page)).unwrap();
        }
        assert_eq!(mmu.read_cell(1, "050").unwrap(), "hello");
    }

    #[test]
    fn test_access_violation() {
        let mut mmu = setup_mmu(2);
        assert!(matches!(mmu.resolve(1, "004"), Err(MemoryError::AccessViolation { .. })));
        assert!(matches!(mmu.resolve(1, "330"), Err(MemoryError::AccessViolation { .. })));
        assert!(matches!(
            mmu.translate(1, VirtualAddress::new(32, 0)),
            Err(MemoryError::AccessViolation { .. })
        ));
        // nothing was faulted in
        assert!(mmu.manager().clock().is_empty());
    }

    #[test]
    fn test_unknown_space() {
        let mut mmu = setup_mmu(2);
        assert_eq!(mmu.resolve(7, "000"), Err(MemoryError::UnknownSpace(7)));
    }

    #[test]
    fn test_write_absolute() {
        let mut mmu = setup_mmu(2);
        let pa = mmu.resolve(1, "013").unwrap();
        mmu.write_absolute(pa, "exit");
        assert_eq!(mmu.read_cell(1, "013").unwrap(), "exit");
    }
}
