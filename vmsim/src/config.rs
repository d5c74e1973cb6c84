//! Sizing of the simulated MMU, fixed at construction time.

use std::error::Error;
use std::fmt;

/// Size of a page (and of a frame) in bytes. Only used to turn
/// (page, offset) pairs into logical and physical addresses for reporting.
pub const PAGE_SIZE: usize = 256;

/// Immutable dimensions of the simulated memory system.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub num_pages: usize,
    pub num_frames: usize,
    pub tlb_size: usize,
}

impl Config {
    /// Validates the dimensions. All three must be positive; the engine is
    /// never built from a partially valid configuration.
    pub fn new(
        num_pages: usize,
        num_frames: usize,
        tlb_size: usize,
    ) -> Result<Config, ConfigError> {
        if num_pages == 0 {
            return Err(ConfigError::ZeroPages);
        }
        if num_frames == 0 {
            return Err(ConfigError::ZeroFrames);
        }
        if tlb_size == 0 {
            return Err(ConfigError::ZeroTlbSlots);
        }

        Ok(Config {
            num_pages,
            num_frames,
            tlb_size,
        })
    }
}

/// A configuration value the engine cannot operate with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    ZeroPages,
    ZeroFrames,
    ZeroTlbSlots,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPages => write!(f, "number of pages must be positive"),
            ConfigError::ZeroFrames => write!(f, "number of frames must be positive"),
            ConfigError::ZeroTlbSlots => write!(f, "TLB size must be positive"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_positive_dimensions() {
        let config = Config::new(256, 128, 16).unwrap();

        assert_eq!(config.num_pages, 256);
        assert_eq!(config.num_frames, 128);
        assert_eq!(config.tlb_size, 16);
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert_eq!(Config::new(0, 128, 16), Err(ConfigError::ZeroPages));
        assert_eq!(Config::new(256, 0, 16), Err(ConfigError::ZeroFrames));
        assert_eq!(Config::new(256, 128, 0), Err(ConfigError::ZeroTlbSlots));
    }

    #[test]
    fn errors_name_the_offending_dimension() {
        assert!(ConfigError::ZeroPages.to_string().contains("pages"));
        assert!(ConfigError::ZeroFrames.to_string().contains("frames"));
        assert!(ConfigError::ZeroTlbSlots.to_string().contains("TLB"));
    }
}
