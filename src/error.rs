use std::fmt;

use crate::constants::Pid;

/// Failures raised while touching a process's memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// Offset or page number outside the address space, or an address that
    /// is not a decimal number at all
    AccessViolation { address: String },
    UnknownSpace(Pid),
    SwapFull,
    /// No free frame and nothing resident to evict
    NoFrame,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::AccessViolation { address } => {
                write!(f, "access violation at virtual address '{}'", address)
            }
            MemoryError::UnknownSpace(pid) => write!(f, "no address space for process {}", pid),
            MemoryError::SwapFull => write!(f, "backing store is full"),
            MemoryError::NoFrame => write!(f, "no frame available for page-in"),
        }
    }
}

impl std::error::Error for MemoryError {}

/// Reasons a program could not be loaded into a fresh address space
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Unreadable { path: String, reason: String },
    MissingSize,
    InvalidSize(String),
    TooLarge { pages: usize, limit: usize },
    SwapFull,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Unreadable { path, reason } => {
                write!(f, "failed to read program {}: {}", path, reason)
            }
            LoadError::MissingSize => write!(f, "program has no size header"),
            LoadError::InvalidSize(line) => write!(f, "cannot read program size from '{}'", line),
            LoadError::TooLarge { pages, limit } => {
                write!(f, "program needs {} pages but the address space holds {}", pages, limit)
            }
            LoadError::SwapFull => write!(f, "backing store is full"),
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroPageSize,
    ZeroAddressSpace,
    MemoryTooSmall { memory_size: usize, page_size: usize },
    MemoryOverflow { frames: usize, page_size: usize },
    ZeroSwapCapacity,
    Unreadable { path: String, reason: String },
    Malformed(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPageSize => write!(f, "page size must be at least 1"),
            ConfigError::ZeroAddressSpace => write!(f, "address space must hold at least 1 page"),
            ConfigError::MemoryTooSmall { memory_size, page_size } => write!(
                f,
                "memory size {} does not fit a single page of {} cells",
                memory_size, page_size
            ),
            ConfigError::MemoryOverflow { frames, page_size } => write!(
                f,
                "{} frames of {} cells do not fit in memory",
                frames, page_size
            ),
            ConfigError::ZeroSwapCapacity => write!(f, "swap capacity must be at least 1 slot"),
            ConfigError::Unreadable { path, reason } => {
                write!(f, "failed to read config {}: {}", path, reason)
            }
            ConfigError::Malformed(reason) => write!(f, "malformed config: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}
