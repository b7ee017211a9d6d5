//! Register-write queue
//!
//! Bounded ring of raw PSG register bytes between the emulation thread
//! (producer) and the PSG worker (consumer). Pushing never blocks: when the
//! ring is full the newest byte is dropped and counted.
//!
//! Positions are free-running counters, so all `capacity` slots are usable
//! and `write_pos - read_pos` is always the fill level.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default queue capacity in bytes
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Error type for queue construction
#[derive(Debug, Clone)]
pub struct RegisterQueueError(pub String);

impl std::fmt::Display for RegisterQueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for RegisterQueueError {}

/// Bounded single-producer/single-consumer byte queue
///
/// # Thread Safety
/// - One producer thread (emulation)
/// - One consumer thread (PSG worker)
/// - Slot storage is guarded by a `parking_lot::Mutex`, positions are atomics
#[derive(Debug)]
pub struct RegisterQueue {
    /// Slot storage
    buffer: Mutex<Vec<u8>>,
    /// Total bytes ever pushed
    write_pos: AtomicUsize,
    /// Total bytes ever popped
    read_pos: AtomicUsize,
    /// Bytes rejected because the queue was full
    dropped: AtomicU64,
    /// Capacity (power of 2)
    capacity: usize,
    /// Capacity mask: `pos & mask == pos % capacity`
    mask: usize,
}

impl RegisterQueue {
    /// Create a new queue.
    ///
    /// Capacity is rounded up to the next power of 2.
    pub fn new(requested_capacity: usize) -> Result<Self, RegisterQueueError> {
        if requested_capacity == 0 {
            return Err(RegisterQueueError(
                "Register queue capacity must be greater than 0".into(),
            ));
        }

        // Positions are compared with wrapping arithmetic, keep well below usize::MAX
        const MAX_CAPACITY: usize = 1 << 20;
        let capacity = requested_capacity.next_power_of_two();
        if capacity > MAX_CAPACITY {
            return Err(RegisterQueueError(format!(
                "Register queue capacity {capacity} exceeds maximum {MAX_CAPACITY}"
            )));
        }

        Ok(RegisterQueue {
            buffer: Mutex::new(vec![0; capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
            capacity,
            mask: capacity - 1,
        })
    }

    /// Queue capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued bytes
    pub fn len(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Check if the queue holds no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes dropped on overflow since creation
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Push a byte without blocking.
    ///
    /// Returns false if the queue was full; the byte is dropped.
    pub fn try_push(&self, value: u8) -> bool {
        let mut buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        if write_pos.wrapping_sub(read_pos) >= self.capacity {
            drop(buf);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        buf[write_pos & self.mask] = value;
        self.write_pos
            .store(write_pos.wrapping_add(1), Ordering::Release);
        true
    }

    /// Pop the oldest byte without blocking
    pub fn try_pop(&self) -> Option<u8> {
        let buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        if write_pos == read_pos {
            return None;
        }

        let value = buf[read_pos & self.mask];
        self.read_pos.store(read_pos.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Discard all queued bytes
    pub fn clear(&self) {
        let _buf = self.buffer.lock();
        let write_pos = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write_pos, Ordering::Release);
    }
}
