//! SN76489 PSG Emulation
//!
//! Chip state and the fixed-step simulation that runs inside the PSG worker.
//! The emulation thread never touches [`Psg`] directly: it feeds cycles and
//! register bytes through a [`PsgHandle`] and the worker applies them.

pub mod engine;
pub mod generators;
pub mod mixer;
pub mod registers;

pub use engine::{AudioSink, PsgEngine, PsgHandle};
pub use generators::{Lfsr, NoiseGenerator, NoiseMode, NoiseRate, ToneGenerator};
pub use mixer::{ApuSample, ChannelMask};
pub use registers::{Latch, LatchType, RegisterWrite};

use generators::NUM_TONE_CHANNELS;
use mixer::channel_level;

/// CPU cycles simulated per PSG step
///
/// The PSG runs 16x slower than the CPU, so nothing observable happens in
/// between.
pub const STEP: u32 = 16;

/// Attenuation value that silences a channel
pub const VOLUME_OFF: u8 = 0x0F;

/// Noise multiplier for accurate rates (256/512/1024 cycles)
pub const ACCURATE_DRUM_MULTIPLIER: i32 = 16;

/// Noise multiplier for "better drums" (16/32/64 cycles)
pub const BETTER_DRUM_MULTIPLIER: i32 = 1;

/// Complete PSG chip state
#[derive(Debug, Clone)]
pub struct Psg {
    tones: [ToneGenerator; NUM_TONE_CHANNELS],
    noise: NoiseGenerator,
    /// Attenuation per channel (0 = loudest, 0xF = off)
    volume: [u8; 4],
    channel_mask: ChannelMask,
    latch: Latch,
    drum_multiplier: i32,
}

impl Default for Psg {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Psg {
    /// Create a PSG in its power-on state
    pub fn new(better_drums: bool) -> Self {
        Psg {
            tones: Default::default(),
            noise: NoiseGenerator::new(),
            volume: [VOLUME_OFF; 4],
            channel_mask: ChannelMask::all(),
            latch: Latch::default(),
            drum_multiplier: if better_drums {
                BETTER_DRUM_MULTIPLIER
            } else {
                ACCURATE_DRUM_MULTIPLIER
            },
        }
    }

    /// Return to the power-on state.
    ///
    /// The drum setting and channel mask are host settings and survive.
    pub fn reset(&mut self) {
        *self = Psg {
            drum_multiplier: self.drum_multiplier,
            channel_mask: self.channel_mask,
            ..Psg::default()
        };
    }

    /// Apply one raw port byte
    pub fn write(&mut self, value: u8) {
        match RegisterWrite::decode(value) {
            RegisterWrite::Latch {
                channel,
                kind,
                data,
            } => {
                self.latch = Latch { channel, kind };
                self.apply(data, true);
            }
            RegisterWrite::Data(data) => self.apply(data, false),
        }
    }

    fn apply(&mut self, data: u8, latched: bool) {
        let channel = self.latch.channel as usize;
        match (self.latch.kind, channel) {
            (LatchType::Volume, _) => self.volume[channel] = data & 0x0F,
            (LatchType::Tone, 3) => self.noise.program(data),
            (LatchType::Tone, _) if latched => self.tones[channel].set_period_low(data),
            (LatchType::Tone, _) => self.tones[channel].set_period_high(data),
        }
    }

    /// Advance every generator by one [`STEP`] and sample the result
    pub fn step(&mut self) -> ApuSample {
        let cycles = STEP as i32;
        for tone in &mut self.tones {
            tone.tick(cycles);
        }
        let tone2_period = self.tones[2].period();
        self.noise
            .tick(cycles, tone2_period, self.drum_multiplier);
        self.sample()
    }

    /// Current output of all four channels
    pub fn sample(&self) -> ApuSample {
        ApuSample::from_levels(std::array::from_fn(|ch| {
            if self.channel_mask.is_enabled(ch) {
                channel_level(self.polarity(ch), self.volume[ch])
            } else {
                0
            }
        }))
    }

    fn polarity(&self, channel: usize) -> u8 {
        match channel {
            0..=2 => self.tones[channel].polarity(),
            _ => self.noise.polarity(),
        }
    }

    /// Tone generator for channel 0-2
    pub fn tone(&self, channel: usize) -> &ToneGenerator {
        &self.tones[channel]
    }

    /// Noise generator
    pub fn noise(&self) -> &NoiseGenerator {
        &self.noise
    }

    /// Attenuation of channel 0-3
    pub fn volume(&self, channel: usize) -> u8 {
        self.volume[channel]
    }

    /// Currently latched channel/register
    pub fn latch(&self) -> Latch {
        self.latch
    }

    /// Channel enable flags
    pub fn channel_mask(&self) -> ChannelMask {
        self.channel_mask
    }

    /// Set channel enable flags
    pub fn set_channel_mask(&mut self, mask: ChannelMask) {
        self.channel_mask = mask;
    }

    /// Switch between accurate and "better drums" noise rates
    pub fn set_better_drums(&mut self, enabled: bool) {
        self.drum_multiplier = if enabled {
            BETTER_DRUM_MULTIPLIER
        } else {
            ACCURATE_DRUM_MULTIPLIER
        };
    }
}

#[cfg(test)]
mod tests {
    use super::registers::{data_byte, latch_byte, tone_bytes};
    use super::*;

    #[test]
    fn test_power_on_is_silent() {
        let mut psg = Psg::default();
        for _ in 0..1000 {
            assert!(psg.step().is_silent());
        }
    }

    #[test]
    fn test_latch_then_data_round_trip() {
        for channel in 0..3u8 {
            for nibble in 0..16u8 {
                let mut psg = Psg::default();
                for b in tone_bytes(channel, 0x2A5) {
                    psg.write(b);
                }

                // Latch path replaces bits 0-3
                psg.write(latch_byte(channel, LatchType::Tone, nibble));
                let period = psg.tone(channel as usize).period();
                assert_eq!(period & 0x00F, u16::from(nibble));
                assert_eq!(period & 0x3F0, 0x2A0);

                // Data path replaces bits 4-9
                psg.write(data_byte(nibble));
                let period = psg.tone(channel as usize).period();
                assert_eq!((period >> 4) & 0x3F, u16::from(nibble));
                assert_eq!(period & 0x00F, u16::from(nibble));
            }
        }
    }

    #[test]
    fn test_volume_latch_and_data() {
        let mut psg = Psg::default();
        psg.write(latch_byte(1, LatchType::Volume, 0x3));
        assert_eq!(psg.volume(1), 0x3);
        assert_eq!(psg.latch().channel, 1);
        assert_eq!(psg.latch().kind, LatchType::Volume);

        psg.write(data_byte(0x2C));
        assert_eq!(psg.volume(1), 0xC);
    }

    #[test]
    fn test_noise_latch_and_data_converge() {
        let mut latched = Psg::default();
        latched.write(latch_byte(3, LatchType::Tone, 0x6));

        let mut via_data = Psg::default();
        via_data.write(latch_byte(3, LatchType::Tone, 0x0));
        for _ in 0..10 {
            via_data.step();
        }
        via_data.write(data_byte(0x6));

        for psg in [&latched, &via_data] {
            assert_eq!(psg.noise().rate(), NoiseRate::Div64);
            assert_eq!(psg.noise().mode(), NoiseMode::White);
            assert_eq!(psg.noise().lfsr().value(), generators::LFSR_RESET_VALUE);
        }
    }

    #[test]
    fn test_loud_square_wave() {
        let mut psg = Psg::default();
        for b in tone_bytes(0, 0x10) {
            psg.write(b);
        }
        psg.write(latch_byte(0, LatchType::Volume, 0x0));

        let levels: Vec<u8> = (0..64).map(|_| psg.step().tone0).collect();
        assert!(levels.contains(&15));
        assert!(levels.contains(&0));
        // 16 steps per half-wave
        assert_eq!(levels[0], 0);
        assert!(levels[1..16].iter().all(|&l| l == 0));
        assert!(levels[16..32].iter().all(|&l| l == 15));
    }

    #[test]
    fn test_pcm_mode_holds_dc_level() {
        let mut psg = Psg::default();
        for b in tone_bytes(1, 1) {
            psg.write(b);
        }
        for volume in (0..16u8).rev().chain(0..16) {
            psg.write(latch_byte(1, LatchType::Volume, volume));
            for _ in 0..4 {
                let sample = psg.step();
                assert_eq!(sample.tone1, 15 - volume);
            }
        }
    }

    #[test]
    fn test_channel_mask_silences() {
        let mut psg = Psg::default();
        psg.write(latch_byte(2, LatchType::Volume, 0x0));
        assert_eq!(psg.sample().tone2, 15);

        psg.set_channel_mask(ChannelMask::all() - ChannelMask::TONE2);
        assert_eq!(psg.sample().tone2, 0);
    }

    #[test]
    fn test_reset_restores_power_on() {
        let mut psg = Psg::new(true);
        psg.write(latch_byte(0, LatchType::Volume, 0x0));
        for b in tone_bytes(0, 0x123) {
            psg.write(b);
        }
        psg.step();

        psg.reset();
        assert_eq!(psg.volume(0), VOLUME_OFF);
        assert_eq!(psg.tone(0).period(), 0);
        assert_eq!(psg.latch(), Latch::default());
        assert_eq!(psg.drum_multiplier, BETTER_DRUM_MULTIPLIER);
    }

    #[test]
    fn test_reset_keeps_channel_mask() {
        let mut psg = Psg::default();
        let mask = ChannelMask::all() - ChannelMask::NOISE;
        psg.set_channel_mask(mask);
        psg.reset();
        assert_eq!(psg.channel_mask(), mask);
    }
}
