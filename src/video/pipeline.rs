//! Double-buffered frame presentation
//!
//! Two [`VideoBuffer`]s alternate between "drawable" (owned by the renderer)
//! and "transmissible" (owned by the transport worker). At every vertical
//! blank the renderer calls [`FramePresenter::present`]:
//! - if the previous frame has been fully transmitted, the drawable buffer
//!   is handed to the worker and the renderer switches to the other one;
//! - otherwise the frame is dropped and counted, and the renderer keeps
//!   drawing into the same buffer. It never waits for the transport.
//!
//! At most one frame is in flight at any time.

use super::buffer::VideoBuffer;
use crate::config::VideoConfig;
use crate::sync::{Delivery, Mailbox};
use crate::Result;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Frame counts for one reporting interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameReport {
    /// Vertical blanks seen
    pub frames: u64,
    /// Frames dropped because the transport was busy
    pub dropped: u64,
}

impl FrameReport {
    /// Frames handed to the transport
    pub fn succeeded(&self) -> u64 {
        self.frames.saturating_sub(self.dropped)
    }
}

/// Frame and dropped-frame counters.
///
/// Both counts live under one lock so a report taken from another thread
/// always pairs them consistently (`dropped <= frames`).
#[derive(Debug, Default)]
pub struct FrameStats {
    counts: Mutex<FrameReport>,
}

impl FrameStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a presented frame
    fn record_presented(&self) {
        self.counts.lock().frames += 1;
    }

    /// Count a dropped frame (also counts as a frame)
    fn record_dropped(&self) {
        let mut counts = self.counts.lock();
        counts.frames += 1;
        counts.dropped += 1;
    }

    /// Vertical blanks seen in the current interval
    pub fn frames(&self) -> u64 {
        self.counts.lock().frames
    }

    /// Dropped frames in the current interval
    pub fn dropped(&self) -> u64 {
        self.counts.lock().dropped
    }

    /// Current interval's counts
    pub fn report(&self) -> FrameReport {
        *self.counts.lock()
    }

    /// Get the current interval's counts and start a new interval
    pub fn take(&self) -> FrameReport {
        std::mem::take(&mut *self.counts.lock())
    }
}

struct Buffers {
    slots: [Mutex<VideoBuffer>; 2],
    mailbox: Mailbox<usize>,
}

/// Allocate two buffers and connect a presenter to a receiver
pub fn double_buffered(config: &VideoConfig) -> Result<(FramePresenter, FrameReceiver)> {
    let front = VideoBuffer::allocate_with(config)?;
    let back = VideoBuffer::allocate_with(config)?;

    let buffers = Arc::new(Buffers {
        slots: [Mutex::new(front), Mutex::new(back)],
        mailbox: Mailbox::new(),
    });
    let stats = Arc::new(FrameStats::new());

    Ok((
        FramePresenter {
            buffers: Arc::clone(&buffers),
            drawable: 0,
            stats,
        },
        FrameReceiver { buffers },
    ))
}

/// Renderer side of the double buffer
pub struct FramePresenter {
    buffers: Arc<Buffers>,
    drawable: usize,
    stats: Arc<FrameStats>,
}

impl FramePresenter {
    /// Lock the buffer the renderer should draw into
    pub fn drawable(&self) -> MutexGuard<'_, VideoBuffer> {
        self.buffers.slots[self.drawable].lock()
    }

    /// Index (0 or 1) of the drawable buffer
    pub fn drawable_index(&self) -> usize {
        self.drawable
    }

    /// Hand the finished frame to the transport at vertical blank.
    ///
    /// Returns false if the previous frame was still in flight; the frame is
    /// dropped and the drawable buffer stays the same.
    pub fn present(&mut self) -> bool {
        match self.buffers.mailbox.try_send(self.drawable) {
            Ok(()) => {
                self.drawable ^= 1;
                self.stats.record_presented();
                true
            }
            Err(_) => {
                self.stats.record_dropped();
                false
            }
        }
    }

    /// True while a frame is queued or being transmitted
    pub fn frame_in_flight(&self) -> bool {
        self.buffers.mailbox.is_occupied()
    }

    /// Shared frame counters
    pub fn stats(&self) -> Arc<FrameStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for FramePresenter {
    fn drop(&mut self) {
        self.buffers.mailbox.close();
    }
}

/// Transport side of the double buffer
pub struct FrameReceiver {
    buffers: Arc<Buffers>,
}

impl FrameReceiver {
    /// Block until a frame is presented.
    ///
    /// Returns `None` once either side has been shut down.
    pub fn recv(&self) -> Option<Frame<'_>> {
        let delivery = self.buffers.mailbox.recv()?;
        Some(self.open(delivery))
    }

    /// Take a presented frame if one is waiting
    pub fn try_recv(&self) -> Option<Frame<'_>> {
        let delivery = self.buffers.mailbox.try_recv()?;
        Some(self.open(delivery))
    }

    fn open<'a>(&'a self, delivery: Delivery<'a, usize>) -> Frame<'a> {
        let index = *delivery.value();
        Frame {
            index,
            buffer: self.buffers.slots[index].lock(),
            _delivery: delivery,
        }
    }

    /// Stop accepting frames and release a blocked `recv`
    pub fn close(&self) {
        self.buffers.mailbox.close();
    }

    pub(crate) fn closer(&self) -> FrameReceiverCloser {
        FrameReceiverCloser {
            buffers: Arc::clone(&self.buffers),
        }
    }
}

/// Handle that can shut a [`FrameReceiver`] down from another thread
pub(crate) struct FrameReceiverCloser {
    buffers: Arc<Buffers>,
}

impl FrameReceiverCloser {
    pub(crate) fn close(&self) {
        self.buffers.mailbox.close();
    }
}

/// A presented frame, locked for transmission.
///
/// Dropping it marks the transmission complete and frees the slot for the
/// next frame.
pub struct Frame<'a> {
    index: usize,
    // Declared before the delivery: the buffer lock is released first
    buffer: MutexGuard<'a, VideoBuffer>,
    _delivery: Delivery<'a, usize>,
}

impl Frame<'_> {
    /// Index (0 or 1) of the buffer being transmitted
    pub fn index(&self) -> usize {
        self.index
    }
}

impl std::ops::Deref for Frame<'_> {
    type Target = VideoBuffer;

    fn deref(&self) -> &VideoBuffer {
        &self.buffer
    }
}
