//! PSG Output Mixer
//!
//! Per-channel samples handed to the audio callback, plus the channel enable
//! mask. On the Game Gear each channel can be routed to the left/right
//! speaker; the Master System output is mono and keeps every channel on.

use bitflags::bitflags;

/// Loudest level a single channel can produce
pub const MAX_CHANNEL_LEVEL: u8 = 0x0F;

bitflags! {
    /// Channel enable flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelMask: u8 {
        /// Tone channel 0
        const TONE0 = 0x01;
        /// Tone channel 1
        const TONE1 = 0x02;
        /// Tone channel 2
        const TONE2 = 0x04;
        /// Noise channel
        const NOISE = 0x08;
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        ChannelMask::all()
    }
}

impl ChannelMask {
    /// Flag for channel index 0-3
    pub fn channel(index: usize) -> Self {
        ChannelMask::from_bits_truncate(1 << (index & 0x3))
    }

    /// Check if channel index 0-3 is enabled
    pub fn is_enabled(&self, index: usize) -> bool {
        self.contains(Self::channel(index))
    }
}

/// One sample of all four channels, each in `0..=15`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApuSample {
    /// Tone channel 0
    pub tone0: u8,
    /// Tone channel 1
    pub tone1: u8,
    /// Tone channel 2
    pub tone2: u8,
    /// Noise channel
    pub noise: u8,
}

impl ApuSample {
    /// Build from channel-ordered levels
    pub fn from_levels(levels: [u8; 4]) -> Self {
        ApuSample {
            tone0: levels[0],
            tone1: levels[1],
            tone2: levels[2],
            noise: levels[3],
        }
    }

    /// Channel-ordered levels
    pub fn levels(&self) -> [u8; 4] {
        [self.tone0, self.tone1, self.tone2, self.noise]
    }

    /// Check if every channel is at zero
    pub fn is_silent(&self) -> bool {
        self.levels().iter().all(|&l| l == 0)
    }

    /// Sum all channels into a mono level in `0.0..=1.0`
    pub fn mix_mono(&self) -> f32 {
        let sum: u32 = self.levels().iter().map(|&l| u32::from(l)).sum();
        sum as f32 / (4.0 * f32::from(MAX_CHANNEL_LEVEL))
    }
}

/// Level of one channel: polarity times inverted attenuation (0xF = off)
#[inline]
pub fn channel_level(polarity: u8, volume: u8) -> u8 {
    polarity * (MAX_CHANNEL_LEVEL - (volume & 0x0F))
}
