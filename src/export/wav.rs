//! WAV file export of PSG output

use crate::psg::{ApuSample, AudioSink};
use crate::Result;
use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

type Writer = WavWriter<BufWriter<File>>;

/// Audio sink writing 16-bit mono PCM to a WAV file.
///
/// Cloning yields another handle to the same file: hand one clone to the
/// engine and keep one to [`finalize`](WavSink::finalize) when done.
///
/// # Examples
///
/// ```no_run
/// use sms_badge::{PsgConfig, PsgEngine, WavSink};
///
/// # fn main() -> sms_badge::Result<()> {
/// let wav = WavSink::create("out.wav", 44_100)?;
/// let engine = PsgEngine::inline(PsgConfig::new(44_100), wav.clone())?;
/// engine.advance(3_579_545);
/// engine.request_sync();
/// drop(engine);
/// wav.finalize()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WavSink {
    writer: Arc<Mutex<Option<Writer>>>,
    written: Arc<Mutex<u64>>,
}

impl WavSink {
    /// Create (or truncate) the output file
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self> {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path.as_ref(), spec)?;
        log::debug!("Writing WAV to {} at {} Hz", path.as_ref().display(), sample_rate);

        Ok(WavSink {
            writer: Arc::new(Mutex::new(Some(writer))),
            written: Arc::new(Mutex::new(0)),
        })
    }

    /// Samples written so far
    pub fn samples_written(&self) -> u64 {
        *self.written.lock()
    }

    /// Flush the header and close the file.
    ///
    /// Samples delivered afterwards are discarded. Calling it twice is a no-op.
    pub fn finalize(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().take() {
            writer.finalize()?;
            log::debug!("WAV finalized after {} samples", self.samples_written());
        }
        Ok(())
    }
}

/// Convert a mono level in `0.0..=1.0` to a 16-bit PCM sample
fn to_pcm(level: f32) -> i16 {
    (level.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl AudioSink for WavSink {
    fn on_sample(&mut self, sample: ApuSample) {
        let mut guard = self.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return;
        };
        match writer.write_sample(to_pcm(sample.mix_mono())) {
            Ok(()) => *self.written.lock() += 1,
            Err(e) => {
                log::error!("WAV write failed, closing file: {e}");
                *guard = None;
            }
        }
    }
}
