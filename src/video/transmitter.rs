//! Video transmit worker
//!
//! Sleeps until a frame is presented, pushes each of its parts to the
//! display transport, then releases the frame so the renderer can present
//! the next one.

use super::buffer::VideoBuffer;
use super::pipeline::{FrameReceiver, FrameReceiverCloser};
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Bulk transfer to the display.
///
/// Called once per part with the tag byte and payload; may block until the
/// transfer is done.
pub trait DisplayTransport: Send {
    /// Transfer one part
    fn transmit(&mut self, data: &[u8]) -> Result<()>;
}

/// Send every frame part of `buffer` in scan order.
///
/// Returns the number of bytes transferred.
pub fn transmit_frame(buffer: &VideoBuffer, transport: &mut dyn DisplayTransport) -> Result<usize> {
    let mut sent = 0;
    for part in buffer.frame_parts() {
        transport.transmit(part.as_bytes())?;
        sent += part.as_bytes().len();
    }
    Ok(sent)
}

/// Transport that discards data and counts it, for headless runs
#[derive(Debug, Clone, Default)]
pub struct CountingTransport {
    transfers: Arc<AtomicU64>,
    bytes: Arc<AtomicU64>,
}

impl CountingTransport {
    /// Create a transport with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `transmit` calls
    pub fn transfers(&self) -> u64 {
        self.transfers.load(Ordering::Relaxed)
    }

    /// Total bytes received
    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

impl DisplayTransport for CountingTransport {
    fn transmit(&mut self, data: &[u8]) -> Result<()> {
        self.transfers.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}

/// Worker thread that feeds presented frames to a [`DisplayTransport`]
pub struct VideoTransmitter {
    closer: FrameReceiverCloser,
    transmitted: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}

impl VideoTransmitter {
    /// Start the worker
    pub fn spawn<T: DisplayTransport + 'static>(receiver: FrameReceiver, transport: T) -> Result<Self> {
        let closer = receiver.closer();
        let transmitted = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let worker = {
            let transmitted = Arc::clone(&transmitted);
            let failed = Arc::clone(&failed);
            let mut transport = transport;
            std::thread::Builder::new()
                .name("video-tx".into())
                .spawn(move || {
                    log::info!("Video transmit worker started");
                    while let Some(frame) = receiver.recv() {
                        match transmit_frame(&frame, &mut transport) {
                            Ok(_) => {
                                transmitted.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(e) => {
                                failed.fetch_add(1, Ordering::Relaxed);
                                log::warn!("Frame {} transmit failed: {e}", frame.index());
                            }
                        }
                    }
                    log::info!("Video transmit worker stopped");
                })?
        };

        Ok(VideoTransmitter {
            closer,
            transmitted,
            failed,
            worker: Some(worker),
        })
    }

    /// Frames fully transmitted
    pub fn transmitted_frames(&self) -> u64 {
        self.transmitted.load(Ordering::Relaxed)
    }

    /// Frames abandoned after a transport error
    pub fn failed_frames(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl Drop for VideoTransmitter {
    fn drop(&mut self) {
        self.closer.close();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Video transmit worker panicked");
            }
        }
    }
}
