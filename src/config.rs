use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Boot parameters shared by the memory manager, the MMU and process creation.
///
/// Fixed once the kernel is built; every component receives its own copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cells per page
    pub page_size: usize,
    /// Pages per virtual address space
    pub address_space_size: usize,
    /// Cells of main memory
    pub memory_size: usize,
    /// Slots in the backing store
    pub swap_capacity: usize,
    /// Instructions per time slice
    pub timeslice: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            page_size: PAGE_SIZE,
            address_space_size: ADDRESS_SPACE_SIZE,
            memory_size: MEMORY_SIZE,
            swap_capacity: SWAP_CAPACITY,
            timeslice: TIMESLICE,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Unreadable {
            path: path.as_ref().display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        if self.address_space_size == 0 {
            return Err(ConfigError::ZeroAddressSpace);
        }
        if self.memory_size < self.page_size {
            return Err(ConfigError::MemoryTooSmall {
                memory_size: self.memory_size,
                page_size: self.page_size,
            });
        }
        if self.swap_capacity == 0 {
            return Err(ConfigError::ZeroSwapCapacity);
        }
        Ok(())
    }

    /// Number of whole frames in main memory
    #[inline]
    pub fn frame_count(&self) -> usize {
        self.memory_size / self.page_size
    }

    /// Digits used for the offset part of an encoded virtual address
    #[inline]
    pub fn offset_digits(&self) -> usize {
        decimal_digits(self.page_size)
    }

    /// Digits used for the page part of an encoded virtual address
    #[inline]
    pub fn page_digits(&self) -> usize {
        decimal_digits(self.address_space_size)
    }

    /// Resize main memory to hold exactly `frames` frames
    pub fn with_frames(mut self, frames: usize) -> Result<Self, ConfigError> {
        self.memory_size = frames
            .checked_mul(self.page_size)
            .ok_or(ConfigError::MemoryOverflow { frames, page_size: self.page_size })?;
        Ok(self)
    }
}

fn decimal_digits(value: usize) -> usize {
    value.to_string().len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_boot_parameters() {
        let config = Config::default();
        assert_eq!(config.page_size, 4);
        assert_eq!(config.address_space_size, 32);
        assert_eq!(config.frame_count(), 8);
        assert_eq!(config.swap_capacity, 320);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_digit_widths() {
        let config = Config::default();
        // pageSize 4 -> one offset digit, 32 pages -> two page digits
        assert_eq!(config.offset_digits(), 1);
        assert_eq!(config.page_digits(), 2);

        let config = Config { page_size: 10, address_space_size: 100, ..Config::default() };
        assert_eq!(config.offset_digits(), 2);
        assert_eq!(config.page_digits(), 3);
    }

    #[test]
    fn test_with_frames() {
        let config = Config::default().with_frames(2).unwrap();
        assert_eq!(config.memory_size, 8);
        assert_eq!(config.frame_count(), 2);
    }

    #[test]
    fn test_with_frames_overflow() {
        let err = Config::default().with_frames(usize::MAX).unwrap_err();
        assert_eq!(err, ConfigError::MemoryOverflow { frames: usize::MAX, page_size: 4 });
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let config = Config { page_size: 0, ..Config::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPageSize));

        let config = Config { address_space_size: 0, ..Config::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroAddressSpace));

        let config = Config { memory_size: 3, ..Config::default() };
        assert!(matches!(config.validate(), Err(ConfigError::MemoryTooSmall { .. })));

        let config = Config { swap_capacity: 0, ..Config::default() };
        assert_eq!(config.validate(), Err(ConfigError::ZeroSwapCapacity));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{ "memory_size": 8 }"#).unwrap();
        assert_eq!(config.frame_count(), 2);
        assert_eq!(config.page_size, 4);
        assert_eq!(config.address_space_size, 32);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("simos-config-{}.json", std::process::id()));
        fs::write(&path, r#"{ "page_size": 8, "memory_size": 64 }"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.page_size, 8);
        assert_eq!(config.frame_count(), 8);

        fs::remove_file(&path).unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Unreadable { .. })));
    }
}
