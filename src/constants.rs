pub const PAGE_SIZE: usize = 4;
pub const FRAME_COUNT: usize = 8;
pub const MEMORY_SIZE: usize = PAGE_SIZE * FRAME_COUNT;
pub const ADDRESS_SPACE_SIZE: usize = 32;

// room for ten full address spaces
pub const SWAP_CAPACITY: usize = 320;

pub type Pid = u32;

pub const IDLE_PID: Pid = 0;
pub const INIT_PID: Pid = 1;

/// Instructions a process may run before `timeslice_over` is due
pub const TIMESLICE: usize = 9;

/// Output value written for an address that could not be translated
pub const INVALID_ADDRESS: i64 = -1;

/// Priority assigned when a process joins the ready queue
pub const DEFAULT_PRIORITY: u32 = 4;
