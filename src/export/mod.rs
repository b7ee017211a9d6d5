//! Audio export
//!
//! Renders the PSG callback stream to disk for offline inspection.

pub mod wav;

pub use wav::WavSink;
