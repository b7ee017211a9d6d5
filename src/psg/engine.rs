//! PSG synchronization engine
//!
//! Decouples the emulation thread from sound generation. The emulation side
//! only adds cycle credit, queues register bytes and requests a sync; all
//! of these are non-blocking. A worker thread wakes on request, burns the
//! accumulated credit in [`STEP`]-cycle steps, applies at most one queued
//! register byte per step and fires the audio callback at the configured
//! rate.
//!
//! Register writes therefore land with step granularity (16 cycles), which is
//! the resolution of the real chip anyway.

use super::{ApuSample, ChannelMask, Psg, STEP};
use crate::config::PsgConfig;
use crate::sync::{CycleCredit, RegisterQueue, WakeSignal};
use crate::{BadgeError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Log only every Nth dropped register write after the first
const DROP_LOG_INTERVAL: u64 = 256;

/// Receiver of generated audio.
///
/// Called from the PSG worker thread; implementations must not block for
/// long or the worker falls behind the emulation.
pub trait AudioSink: Send {
    /// Deliver one sample of all four channels
    fn on_sample(&mut self, sample: ApuSample);
}

impl<F> AudioSink for F
where
    F: FnMut(ApuSample) + Send,
{
    fn on_sample(&mut self, sample: ApuSample) {
        self(sample)
    }
}

/// State owned by whichever thread is running a sync pass
struct SyncState {
    psg: Psg,
    sink: Box<dyn AudioSink>,
    callback_counter: u32,
    callback_period: u32,
}

struct Shared {
    credit: CycleCredit,
    queue: RegisterQueue,
    wake: WakeSignal,
    state: Mutex<SyncState>,
    reset_pending: AtomicBool,
    callbacks_fired: AtomicU64,
    inline: bool,
}

impl Shared {
    /// Drain all full steps of credit
    fn sync(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if self.reset_pending.swap(false, Ordering::AcqRel) {
            state.psg.reset();
            state.callback_counter = 0;
            self.queue.clear();
            let discarded = self.credit.take_and_reset();
            log::debug!("PSG reset, discarded {discarded} pending cycles");
        }

        while self.credit.has_step(STEP) {
            if let Some(value) = self.queue.try_pop() {
                state.psg.write(value);
            }

            let sample = state.psg.step();

            state.callback_counter += STEP;
            while state.callback_counter >= state.callback_period {
                state.callback_counter -= state.callback_period;
                state.sink.on_sample(sample);
                self.callbacks_fired.fetch_add(1, Ordering::Relaxed);
            }

            self.credit.consume(STEP);
        }
    }
}

/// Producer-side handle to a PSG engine.
///
/// Cheap to clone; every method is safe to call from any thread and never
/// waits for the worker.
#[derive(Clone)]
pub struct PsgHandle {
    shared: Arc<Shared>,
}

impl PsgHandle {
    /// Add emulated CPU cycles of credit
    pub fn advance(&self, cycles: u32) {
        self.shared.credit.advance(cycles);
    }

    /// Queue a raw register byte.
    ///
    /// When the queue is full the byte is dropped and counted; the caller
    /// never sees an error.
    pub fn write_register(&self, value: u8) {
        if !self.shared.queue.try_push(value) {
            let dropped = self.shared.queue.dropped();
            if dropped == 1 || dropped % DROP_LOG_INTERVAL == 0 {
                log::warn!("Dropping PSG register write {value:#04x} ({dropped} dropped so far)");
            }
        }
    }

    /// Ask the worker to drain pending credit and register writes.
    ///
    /// Requests made while a pass is running collapse into one more pass.
    /// In inline mode the pass runs on the calling thread.
    pub fn request_sync(&self) {
        if self.shared.inline {
            self.shared.sync();
        } else {
            self.shared.wake.notify();
        }
    }

    /// Request a return to power-on state.
    ///
    /// Applied at the start of the next sync pass; queued writes and pending
    /// credit are discarded.
    pub fn reset(&self) {
        self.shared.reset_pending.store(true, Ordering::Release);
    }

    /// Register bytes dropped because the queue was full
    pub fn dropped_writes(&self) -> u64 {
        self.shared.queue.dropped()
    }

    /// Register bytes waiting to be applied
    pub fn queued_writes(&self) -> usize {
        self.shared.queue.len()
    }

    /// Cycle credit not yet consumed
    pub fn pending_cycles(&self) -> u64 {
        self.shared.credit.get_cycles()
    }

    /// Audio callbacks fired since creation
    pub fn callbacks_fired(&self) -> u64 {
        self.shared.callbacks_fired.load(Ordering::Relaxed)
    }
}

/// PSG engine: chip state, sync state and (optionally) its worker thread
pub struct PsgEngine {
    handle: PsgHandle,
    worker: Option<JoinHandle<()>>,
}

impl PsgEngine {
    /// Create an engine with a dedicated worker thread
    pub fn spawn<S: AudioSink + 'static>(config: PsgConfig, sink: S) -> Result<Self> {
        let shared = Self::build_shared(config, Box::new(sink), false)?;

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name("psg-worker".into())
            .spawn(move || {
                log::info!("PSG worker started");
                while worker_shared.wake.wait() {
                    worker_shared.sync();
                }
                log::info!("PSG worker stopped");
            })?;

        Ok(PsgEngine {
            handle: PsgHandle { shared },
            worker: Some(worker),
        })
    }

    /// Create an engine without a worker; every `request_sync` runs the
    /// pass on the calling thread. Used for offline rendering.
    pub fn inline<S: AudioSink + 'static>(config: PsgConfig, sink: S) -> Result<Self> {
        let shared = Self::build_shared(config, Box::new(sink), true)?;
        Ok(PsgEngine {
            handle: PsgHandle { shared },
            worker: None,
        })
    }

    fn build_shared(
        config: PsgConfig,
        sink: Box<dyn AudioSink>,
        inline: bool,
    ) -> Result<Arc<Shared>> {
        config.validate()?;
        let queue = RegisterQueue::new(config.queue_capacity)
            .map_err(|e| BadgeError::ConfigError(e.to_string()))?;

        Ok(Arc::new(Shared {
            credit: CycleCredit::new(),
            queue,
            wake: WakeSignal::new(),
            state: Mutex::new(SyncState {
                psg: Psg::new(config.better_drums),
                sink,
                callback_counter: 0,
                callback_period: config.callback_period(),
            }),
            reset_pending: AtomicBool::new(false),
            callbacks_fired: AtomicU64::new(0),
            inline,
        }))
    }

    /// Get a producer handle for the emulation thread
    pub fn handle(&self) -> PsgHandle {
        self.handle.clone()
    }

    /// Add emulated CPU cycles of credit
    pub fn advance(&self, cycles: u32) {
        self.handle.advance(cycles);
    }

    /// Queue a raw register byte
    pub fn write_register(&self, value: u8) {
        self.handle.write_register(value);
    }

    /// Wake the worker (or sync inline)
    pub fn request_sync(&self) {
        self.handle.request_sync();
    }

    /// Request a return to power-on state
    pub fn reset(&self) {
        self.handle.reset();
    }

    /// Run a sync pass on the calling thread.
    ///
    /// Waits for a pass already running on the worker, then drains whatever
    /// credit is left.
    pub fn sync_now(&self) {
        self.handle.shared.sync();
    }

    /// Inspect the chip state
    pub fn with_psg<R>(&self, f: impl FnOnce(&Psg) -> R) -> R {
        f(&self.handle.shared.state.lock().psg)
    }

    /// Set channel enable flags
    pub fn set_channel_mask(&self, mask: ChannelMask) {
        self.handle.shared.state.lock().psg.set_channel_mask(mask);
    }

    /// Register bytes dropped because the queue was full
    pub fn dropped_writes(&self) -> u64 {
        self.handle.dropped_writes()
    }

    /// Cycle credit not yet consumed
    pub fn pending_cycles(&self) -> u64 {
        self.handle.pending_cycles()
    }

    /// Audio callbacks fired since creation
    pub fn callbacks_fired(&self) -> u64 {
        self.handle.callbacks_fired()
    }

    /// True if a worker thread is running the sync passes
    pub fn is_threaded(&self) -> bool {
        self.worker.is_some()
    }
}

impl Drop for PsgEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.handle.shared.wake.close();
            if worker.join().is_err() {
                log::error!("PSG worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::registers::{latch_byte, tone_bytes, LatchType};
    use super::*;

    const SMS_CLOCK_QUARTER: u32 = crate::config::SMS_CPU_CLOCK_HZ / 4;

    fn collecting(config: PsgConfig) -> (PsgEngine, Arc<Mutex<Vec<ApuSample>>>) {
        let samples = Arc::new(Mutex::new(Vec::new()));
        let sink_samples = Arc::clone(&samples);
        let engine = PsgEngine::inline(config, move |s: ApuSample| {
            sink_samples.lock().push(s);
        })
        .unwrap();
        (engine, samples)
    }

    #[test]
    fn test_single_callback_after_one_period() {
        let (engine, samples) = collecting(PsgConfig::low_rate());

        // 324 cycles per callback: 20 steps (320) are not enough
        for _ in 0..20 {
            engine.advance(16);
            engine.request_sync();
        }
        assert!(samples.lock().is_empty());

        engine.advance(16);
        engine.request_sync();
        let samples = samples.lock();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0], ApuSample::default());
        assert_eq!(engine.pending_cycles(), 0);
    }

    #[test]
    fn test_multiple_callbacks_per_step() {
        let config = PsgConfig {
            sample_rate: SMS_CLOCK_QUARTER,
            ..PsgConfig::default()
        };
        assert_eq!(config.callback_period(), 4);
        let (engine, samples) = collecting(config);

        engine.advance(32);
        engine.request_sync();
        assert_eq!(samples.lock().len(), 8);
    }

    #[test]
    fn test_partial_step_left_pending() {
        let (engine, _samples) = collecting(PsgConfig::default());
        engine.advance(40);
        engine.request_sync();
        assert_eq!(engine.pending_cycles(), 8);
    }

    #[test]
    fn test_one_register_write_per_step() {
        let (engine, _samples) = collecting(PsgConfig::default());
        for b in tone_bytes(0, 0x155) {
            engine.write_register(b);
        }
        engine.write_register(latch_byte(0, LatchType::Volume, 0x2));

        engine.advance(16);
        engine.request_sync();
        assert_eq!(engine.with_psg(|psg| psg.tone(0).period()), 0x005);
        assert_eq!(engine.handle().queued_writes(), 2);

        engine.advance(32);
        engine.request_sync();
        assert_eq!(engine.with_psg(|psg| psg.tone(0).period()), 0x155);
        assert_eq!(engine.with_psg(|psg| psg.volume(0)), 0x2);
        assert_eq!(engine.handle().queued_writes(), 0);
    }

    #[test]
    fn test_writes_without_credit_stay_queued() {
        let (engine, _samples) = collecting(PsgConfig::default());
        engine.write_register(0x90);
        engine.request_sync();
        assert_eq!(engine.with_psg(|psg| psg.volume(0)), 0xF);
        assert_eq!(engine.handle().queued_writes(), 1);
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let config = PsgConfig {
            queue_capacity: 4,
            ..PsgConfig::default()
        };
        let (engine, _samples) = collecting(config);
        for volume in 0..6u8 {
            engine.write_register(latch_byte(0, LatchType::Volume, volume));
        }
        assert_eq!(engine.dropped_writes(), 2);

        engine.advance(16 * 8);
        engine.request_sync();
        // Last applied write is the 4th one (volume 3)
        assert_eq!(engine.with_psg(|psg| psg.volume(0)), 0x3);
    }

    #[test]
    fn test_reset_discards_pending_work() {
        let (engine, samples) = collecting(PsgConfig::default());
        engine.write_register(0x90);
        engine.advance(16);
        engine.request_sync();
        assert_eq!(engine.with_psg(|psg| psg.volume(0)), 0x0);

        engine.write_register(0xB0);
        engine.advance(1000);
        engine.reset();
        engine.request_sync();

        assert_eq!(engine.with_psg(|psg| psg.volume(0)), 0xF);
        assert_eq!(engine.with_psg(|psg| psg.volume(1)), 0xF);
        assert_eq!(engine.pending_cycles(), 0);
        assert_eq!(engine.handle().queued_writes(), 0);
        assert!(samples.lock().is_empty());
    }

    #[test]
    fn test_queue_capacity_rounds_up() {
        let config = PsgConfig {
            queue_capacity: 1000,
            ..PsgConfig::default()
        };
        let (engine, _samples) = collecting(config);
        for _ in 0..1025 {
            engine.write_register(0x9F);
        }
        assert_eq!(engine.handle().queued_writes(), 1024);
        assert_eq!(engine.dropped_writes(), 1);
    }

    #[test]
    fn test_reset_keeps_channel_mask() {
        let (engine, _samples) = collecting(PsgConfig::default());
        engine.set_channel_mask(ChannelMask::TONE0);
        engine.reset();
        engine.request_sync();
        assert_eq!(engine.with_psg(|psg| psg.channel_mask()), ChannelMask::TONE0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PsgConfig {
            sample_rate: 0,
            ..PsgConfig::default()
        };
        assert!(PsgEngine::inline(config, |_s: ApuSample| {}).is_err());
    }
}
