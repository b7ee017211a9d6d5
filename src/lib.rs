//! Master System PSG Engine and Scatter/Gather Video Buffers
//!
//! Audio and video plumbing for running a Sega Master System / Game Gear
//! emulator on badge-class hardware. The emulation thread never blocks on
//! either subsystem: audio and video are handed to dedicated workers through
//! atomics and bounded, non-blocking channels.
//!
//! # Features
//! - SN76489-style PSG: 3 tone channels + 1 noise channel (16-bit LFSR)
//! - Lock-free cycle credit shared between emulation and PSG worker
//! - Bounded register-write queue with drop-newest backpressure
//! - Periodic audio callbacks at a configurable sample rate
//! - Frame buffers split into transport-tagged parts for zero-copy transfer
//! - Double-buffered presentation with at most one frame in flight
//! - Optional WAV export of the generated audio (`export` feature)
//!
//! # Quick start
//! ## PSG engine on a worker thread
//! ```no_run
//! use sms_badge::{ApuSample, PsgConfig, PsgEngine};
//!
//! let engine = PsgEngine::spawn(PsgConfig::new(44_100), |sample: ApuSample| {
//!     let _ = sample.mix_mono();
//! })
//! .unwrap();
//! engine.write_register(0x90); // channel 0 volume = loudest
//! engine.request_sync();
//! engine.advance(228); // one scanline worth of CPU cycles
//! engine.request_sync();
//! ```
//!
//! ## Double-buffered video
//! ```no_run
//! use sms_badge::video::{double_buffered, CountingTransport, VideoTransmitter};
//! use sms_badge::VideoConfig;
//!
//! let (mut presenter, receiver) = double_buffered(&VideoConfig::default()).unwrap();
//! let _tx = VideoTransmitter::spawn(receiver, CountingTransport::new()).unwrap();
//! presenter.drawable().fill(0xF800);
//! presenter.present();
//! ```

#![warn(missing_docs)]

pub mod config; // Engine / video configuration
#[cfg(feature = "export")]
pub mod export; // WAV export
pub mod psg; // PSG emulation and worker
pub mod sync; // Cross-thread primitives
pub mod video; // Scatter/gather frame buffers

/// Error types for the badge audio/video pipeline
#[derive(thiserror::Error, Debug)]
pub enum BadgeError {
    /// Frame dimensions of zero
    #[error("Invalid frame dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width in pixels
        width: u16,
        /// Requested height in pixels
        height: u16,
    },

    /// A buffer must have at least one part
    #[error("Invalid part count: {0}")]
    InvalidPartCount(usize),

    /// Frame size is not a whole multiple of the part count
    #[error("Frame of {size} bytes does not split evenly into {part_count} parts")]
    UnevenPartition {
        /// Total frame size in bytes
        size: usize,
        /// Requested number of parts
        part_count: usize,
    },

    /// Allocation of a buffer part failed
    #[error("Failed to allocate buffer part {part} ({bytes} bytes)")]
    AllocationFailed {
        /// Index of the part that could not be allocated
        part: usize,
        /// Requested size of that part
        bytes: usize,
    },

    /// Pixel write outside the frame
    #[error("Write of {len} bytes at offset {offset} exceeds {size}-byte frame")]
    OutOfBounds {
        /// Frame byte offset of the write
        offset: usize,
        /// Length of the write
        len: usize,
        /// Frame size in bytes
        size: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Display transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// IO error from filesystem or thread spawning
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration file
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error writing audio file
    #[cfg(feature = "export")]
    #[error("Audio file write error: {0}")]
    Wav(#[from] hound::Error),
}

/// Result type for badge operations
pub type Result<T> = std::result::Result<T, BadgeError>;

// Public API exports
pub use config::{BadgeConfig, PsgConfig, VideoConfig};
#[cfg(feature = "export")]
pub use export::WavSink;
pub use psg::{ApuSample, AudioSink, ChannelMask, Psg, PsgEngine, PsgHandle};
pub use video::{FramePresenter, FrameReceiver, FrameStats, VideoBuffer, VideoTransmitter};
