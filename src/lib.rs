pub mod clock;
pub mod config;
pub mod constants;
pub mod device;
pub mod error;
pub mod event;
pub mod io;
pub mod kernel;
pub mod manager;
pub mod memory;
pub mod process;
pub mod scheduler;
pub mod swap;
pub mod tables;
pub mod translation;

// Re-export commonly used items for convenience
pub use config::Config;
pub use constants::*;
pub use error::{ConfigError, LoadError, MemoryError};
pub use event::{Event, EventKind};
pub use kernel::{Kernel, SystemState};
pub use process::{Pcb, ProcessState};
pub use translation::{AddressFormat, Mmu, VirtualAddress};
