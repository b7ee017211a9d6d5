//! PSG register write protocol
//!
//! The SN76489 has a single write port. A byte with bit 7 set is a *latch*
//! write: it selects a channel (bits 5-6) and register type (bit 4) and
//! carries 4 bits of data. A byte with bit 7 clear is a *data* write aimed at
//! whatever was last latched and carries up to 6 bits.
//!
//! ```text
//! latch: 1 c c t d d d d
//! data:  0 x d d d d d d
//! ```

use std::fmt;

/// Register type selected by a latch write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatchType {
    /// Tone period (channels 0-2) or noise control (channel 3)
    #[default]
    Tone,
    /// Attenuation
    Volume,
}

/// Currently latched channel and register type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Latch {
    /// Channel 0-3 (3 = noise)
    pub channel: u8,
    /// Register type
    pub kind: LatchType,
}

/// A decoded write to the PSG port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
    /// Latch a channel/register and write its low 4 bits
    Latch {
        /// Channel 0-3
        channel: u8,
        /// Register type
        kind: LatchType,
        /// 4-bit payload
        data: u8,
    },
    /// Write 6 bits to the latched register
    Data(u8),
}

impl RegisterWrite {
    /// Decode a raw port byte
    pub fn decode(value: u8) -> Self {
        if value & 0x80 != 0 {
            RegisterWrite::Latch {
                channel: (value >> 5) & 0x3,
                kind: if value & 0x10 != 0 {
                    LatchType::Volume
                } else {
                    LatchType::Tone
                },
                data: value & 0x0F,
            }
        } else {
            RegisterWrite::Data(value & 0x3F)
        }
    }

    /// Encode back to a raw port byte
    pub fn encode(&self) -> u8 {
        match *self {
            RegisterWrite::Latch {
                channel,
                kind,
                data,
            } => latch_byte(channel, kind, data),
            RegisterWrite::Data(data) => data_byte(data),
        }
    }
}

impl fmt::Display for RegisterWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterWrite::Latch {
                channel,
                kind: LatchType::Tone,
                data,
            } if *channel == 3 => write!(f, "LATCH noise ctrl={data:#x}"),
            RegisterWrite::Latch {
                channel,
                kind: LatchType::Tone,
                data,
            } => write!(f, "LATCH ch{channel} tone lo={data:#x}"),
            RegisterWrite::Latch {
                channel,
                kind: LatchType::Volume,
                data,
            } => write!(f, "LATCH ch{channel} vol={data:#x}"),
            RegisterWrite::Data(data) => write!(f, "DATA {data:#04x}"),
        }
    }
}

/// Build a latch byte
#[inline]
pub const fn latch_byte(channel: u8, kind: LatchType, data: u8) -> u8 {
    let kind_bit = match kind {
        LatchType::Tone => 0x00,
        LatchType::Volume => 0x10,
    };
    0x80 | ((channel & 0x3) << 5) | kind_bit | (data & 0x0F)
}

/// Build a data byte
#[inline]
pub const fn data_byte(data: u8) -> u8 {
    data & 0x3F
}

/// Both bytes needed to program a full 10-bit tone period
pub const fn tone_bytes(channel: u8, period: u16) -> [u8; 2] {
    [
        latch_byte(channel, LatchType::Tone, (period & 0x0F) as u8),
        data_byte(((period >> 4) & 0x3F) as u8),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_latch() {
        assert_eq!(
            RegisterWrite::decode(0x9F),
            RegisterWrite::Latch {
                channel: 0,
                kind: LatchType::Volume,
                data: 0xF
            }
        );
        assert_eq!(
            RegisterWrite::decode(0xE4),
            RegisterWrite::Latch {
                channel: 3,
                kind: LatchType::Tone,
                data: 0x4
            }
        );
        assert_eq!(
            RegisterWrite::decode(0xC5),
            RegisterWrite::Latch {
                channel: 2,
                kind: LatchType::Tone,
                data: 0x5
            }
        );
    }

    #[test]
    fn test_decode_data() {
        assert_eq!(RegisterWrite::decode(0x3F), RegisterWrite::Data(0x3F));
        assert_eq!(RegisterWrite::decode(0x7F), RegisterWrite::Data(0x3F));
    }

    #[test]
    fn test_encode_matches_decode() {
        for value in [0x80u8, 0x9F, 0xB3, 0xDF, 0xE7, 0xFF, 0x00, 0x15, 0x3F] {
            assert_eq!(RegisterWrite::decode(value).encode(), value);
        }
    }

    #[test]
    fn test_tone_bytes() {
        assert_eq!(tone_bytes(1, 0x3FE), [0xAE, 0x3F]);
        assert_eq!(tone_bytes(0, 0x0FE), [0x8E, 0x0F]);
    }

    #[test]
    fn test_display() {
        assert_eq!(RegisterWrite::decode(0xE4).to_string(), "LATCH noise ctrl=0x4");
        assert_eq!(RegisterWrite::decode(0x9A).to_string(), "LATCH ch0 vol=0xa");
        assert_eq!(RegisterWrite::decode(0x12).to_string(), "DATA 0x12");
    }
}
