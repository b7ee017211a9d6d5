//! Sound generators for the SN76489 PSG
//!
//! This module contains the individual generator components:
//! - Tone generators (3 channels, 10-bit period)
//! - Noise generator (16-bit LFSR, clocked every second countdown)
//!
//! Counters run in CPU cycles. The PSG itself runs 16x slower than the CPU,
//! so every reload multiplies the period register by 16.

/// Number of tone channels
pub const NUM_TONE_CHANNELS: usize = 3;

/// Tone periods below this value are not reloaded from a drained counter.
///
/// Reloading a tiny period every step produces a high pitched screech while
/// the volume is still up.
pub const MIN_RELOAD_PERIOD: u16 = 8;

/// Value loaded into the LFSR whenever the noise register is written
pub const LFSR_RESET_VALUE: u16 = 0x8000;

/// Feedback taps for white noise (bits 0 and 3)
pub const TAPPED_BITS: u16 = 0x0009;

/// CPU cycles per PSG clock
pub const PSG_CLOCK_DIVIDER: i32 = 16;

/// Tone generator for a single channel
#[derive(Clone, Debug)]
pub struct ToneGenerator {
    /// 10-bit half-wavelength register
    period: u16,
    /// Countdown in CPU cycles
    counter: i32,
    /// Output polarity (0 or 1)
    polarity: u8,
}

impl Default for ToneGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneGenerator {
    /// Create a new tone generator
    pub fn new() -> Self {
        ToneGenerator {
            period: 0,
            counter: 0,
            polarity: 1,
        }
    }

    /// Set the full 10-bit period
    #[inline]
    pub fn set_period(&mut self, period: u16) {
        self.period = period & 0x3FF;
    }

    /// Replace the low 4 bits of the period
    #[inline]
    pub fn set_period_low(&mut self, data: u8) {
        self.period = (self.period & 0x3F0) | u16::from(data & 0x0F);
    }

    /// Replace the high 6 bits of the period
    #[inline]
    pub fn set_period_high(&mut self, data: u8) {
        self.period = (self.period & 0x00F) | (u16::from(data & 0x3F) << 4);
    }

    /// Get current period
    #[inline]
    pub fn period(&self) -> u16 {
        self.period
    }

    /// Get current countdown
    #[inline]
    pub fn counter(&self) -> i32 {
        self.counter
    }

    /// Get current output polarity
    #[inline]
    pub fn polarity(&self) -> u8 {
        self.polarity
    }

    /// A period of 1 holds the output at a DC level instead of toggling.
    ///
    /// Games use this to play PCM samples by rewriting the volume.
    #[inline]
    pub fn is_dc_offset(&self) -> bool {
        self.period == 1
    }

    /// Advance the generator by `cycles` CPU cycles
    #[inline]
    pub fn tick(&mut self, cycles: i32) {
        if self.counter <= 0 && self.period < MIN_RELOAD_PERIOD {
            return;
        }

        if self.counter > 0 {
            self.counter -= cycles;
        }

        if self.counter <= 0 {
            self.counter += i32::from(self.period) * PSG_CLOCK_DIVIDER;
            if !self.is_dc_offset() {
                self.polarity ^= 1;
            }
        }
    }

    /// Reset to power-on state
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Noise feedback mode (bit 2 of the noise register)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NoiseMode {
    /// Feed back the bit shifted out (16-step cycle)
    #[default]
    Periodic,
    /// Feed back the parity of the tapped bits
    White,
}

impl NoiseMode {
    /// Decode from the noise register
    pub fn from_register(data: u8) -> Self {
        if data & 0x04 != 0 {
            NoiseMode::White
        } else {
            NoiseMode::Periodic
        }
    }
}

/// Noise shift rate (bits 0-1 of the noise register)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NoiseRate {
    /// Fixed rate, multiplier 1
    #[default]
    Div16,
    /// Fixed rate, multiplier 2
    Div32,
    /// Fixed rate, multiplier 4
    Div64,
    /// Clocked by tone channel 2's period
    Tone2,
}

impl NoiseRate {
    /// Decode from the noise register
    pub fn from_register(data: u8) -> Self {
        match data & 0x03 {
            0 => NoiseRate::Div16,
            1 => NoiseRate::Div32,
            2 => NoiseRate::Div64,
            _ => NoiseRate::Tone2,
        }
    }
}

/// 16-bit linear-feedback shift register
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lfsr {
    value: u16,
}

impl Default for Lfsr {
    fn default() -> Self {
        Self::new()
    }
}

impl Lfsr {
    /// Create an LFSR at the reset value
    pub fn new() -> Self {
        Lfsr {
            value: LFSR_RESET_VALUE,
        }
    }

    /// Current register contents
    #[inline]
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Reload the reset value
    #[inline]
    pub fn reset(&mut self) {
        self.value = LFSR_RESET_VALUE;
    }

    /// Shift once, returning the bit shifted out (the mixer output)
    #[inline]
    pub fn clock(&mut self, mode: NoiseMode) -> u8 {
        let output = (self.value & 0x1) as u8;
        let feedback = match mode {
            NoiseMode::White => ((self.value & TAPPED_BITS).count_ones() & 0x1) as u16,
            NoiseMode::Periodic => self.value & 0x1,
        };
        self.value = (self.value >> 1) | (feedback << 15);
        output
    }
}

/// Noise generator
#[derive(Clone, Debug)]
pub struct NoiseGenerator {
    lfsr: Lfsr,
    rate: NoiseRate,
    mode: NoiseMode,
    /// Countdown in CPU cycles
    counter: i32,
    /// Half-rate toggle; the LFSR shifts when it flips to true
    flip_flop: bool,
    /// Output polarity (0 or 1)
    polarity: u8,
}

impl Default for NoiseGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl NoiseGenerator {
    /// Create a new noise generator
    pub fn new() -> Self {
        NoiseGenerator {
            lfsr: Lfsr::new(),
            rate: NoiseRate::Div16,
            mode: NoiseMode::Periodic,
            counter: 0,
            flip_flop: true,
            polarity: 1,
        }
    }

    /// Apply a noise register write: reset the LFSR, set rate and mode
    pub fn program(&mut self, data: u8) {
        self.lfsr.reset();
        self.rate = NoiseRate::from_register(data);
        self.mode = NoiseMode::from_register(data);
    }

    /// Get the shift rate
    pub fn rate(&self) -> NoiseRate {
        self.rate
    }

    /// Get the feedback mode
    pub fn mode(&self) -> NoiseMode {
        self.mode
    }

    /// Get the LFSR
    pub fn lfsr(&self) -> Lfsr {
        self.lfsr
    }

    /// Get current output polarity
    #[inline]
    pub fn polarity(&self) -> u8 {
        self.polarity
    }

    /// Get current countdown
    #[inline]
    pub fn counter(&self) -> i32 {
        self.counter
    }

    /// Advance the generator by `cycles` CPU cycles.
    ///
    /// `tone2_period` drives the [`NoiseRate::Tone2`] rate, `multiplier`
    /// scales the fixed rates (16 is accurate, 1 gives punchier drums).
    #[inline]
    pub fn tick(&mut self, cycles: i32, tone2_period: u16, multiplier: i32) {
        self.counter -= cycles;
        if self.counter > 0 {
            return;
        }

        self.counter += match self.rate {
            NoiseRate::Div16 => PSG_CLOCK_DIVIDER * multiplier,
            NoiseRate::Div32 => 2 * PSG_CLOCK_DIVIDER * multiplier,
            NoiseRate::Div64 => 4 * PSG_CLOCK_DIVIDER * multiplier,
            NoiseRate::Tone2 => i32::from(tone2_period) * PSG_CLOCK_DIVIDER,
        };
        // A zero tone 2 period reloads nothing: clock every step, no drift
        self.counter = self.counter.max(0);

        self.flip_flop = !self.flip_flop;
        if self.flip_flop {
            self.polarity = self.lfsr.clock(self.mode);
        }
    }

    /// Reset to power-on state
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
