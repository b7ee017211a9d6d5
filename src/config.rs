//! Configuration
//!
//! Audio and video settings for a badge session. Everything has a sensible
//! default, so a JSON file only needs the fields it wants to change:
//!
//! ```json
//! { "psg": { "sample_rate": 22050, "better_drums": true },
//!   "video": { "part_count": 8 } }
//! ```

use crate::sync::DEFAULT_QUEUE_CAPACITY;
use crate::{BadgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// NTSC Master System CPU clock
pub const SMS_CPU_CLOCK_HZ: u32 = 3_579_545;

/// Default audio callback rate
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Master System active display width
pub const SMS_SCREEN_WIDTH: u16 = 256;

/// Master System active display height
pub const SMS_SCREEN_HEIGHT: u16 = 192;

/// Transport tag the display controller expects in front of pixel data
pub const PIXEL_DATA_TAG: u8 = 0xF3;

/// PSG engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsgConfig {
    /// Audio callbacks per second
    pub sample_rate: u32,
    /// Emulated CPU clock; cycles passed to `advance` are in this unit
    pub cpu_clock_hz: u32,
    /// Use short noise periods (16/32/64 instead of 256/512/1024 cycles)
    pub better_drums: bool,
    /// Capacity of the register-write queue, rounded up to a power of two
    pub queue_capacity: usize,
}

impl Default for PsgConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl PsgConfig {
    /// Default settings at the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        PsgConfig {
            sample_rate,
            cpu_clock_hz: SMS_CPU_CLOCK_HZ,
            better_drums: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// 11025 Hz, for hosts with little CPU to spare for audio
    pub fn low_rate() -> Self {
        Self::new(11_025)
    }

    /// Enable or disable the short noise periods
    pub fn with_better_drums(mut self, enabled: bool) -> Self {
        self.better_drums = enabled;
        self
    }

    /// Emulated cycles between two audio callbacks
    pub fn callback_period(&self) -> u32 {
        self.cpu_clock_hz / self.sample_rate.max(1)
    }

    /// Check the settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(BadgeError::ConfigError(
                "sample_rate must be greater than 0".into(),
            ));
        }
        if self.sample_rate > self.cpu_clock_hz {
            return Err(BadgeError::ConfigError(format!(
                "sample_rate {} exceeds cpu_clock_hz {}",
                self.sample_rate, self.cpu_clock_hz
            )));
        }
        if self.queue_capacity == 0 {
            return Err(BadgeError::ConfigError(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Video buffer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Frame width in pixels
    pub width: u16,
    /// Frame height in pixels
    pub height: u16,
    /// Number of parts a frame is split into
    pub part_count: usize,
    /// Additional parts of the same size for pipelined rendering
    pub extra_parts: usize,
    /// Transport tag written in front of every part
    pub prefix_tag: u8,
}

impl Default for VideoConfig {
    fn default() -> Self {
        VideoConfig {
            width: SMS_SCREEN_WIDTH,
            height: SMS_SCREEN_HEIGHT,
            part_count: 4,
            extra_parts: 0,
            prefix_tag: PIXEL_DATA_TAG,
        }
    }
}

impl VideoConfig {
    /// Total frame size in bytes (16-bit pixels)
    pub fn frame_size(&self) -> usize {
        usize::from(self.width) * usize::from(self.height) * 2
    }

    /// Check the settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BadgeError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.part_count == 0 {
            return Err(BadgeError::InvalidPartCount(self.part_count));
        }
        if self.frame_size() % self.part_count != 0 {
            return Err(BadgeError::UnevenPartition {
                size: self.frame_size(),
                part_count: self.part_count,
            });
        }
        Ok(())
    }
}

/// Full session configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BadgeConfig {
    /// Audio settings
    pub psg: PsgConfig,
    /// Video settings
    pub video: VideoConfig,
}

impl BadgeConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: BadgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check both sections
    pub fn validate(&self) -> Result<()> {
        self.psg.validate()?;
        self.video.validate()
    }
}
