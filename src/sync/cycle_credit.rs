//! Cycle Credit
//!
//! Emulated-cycle credit shared between the emulation thread, which adds
//! cycles as the CPU runs, and the PSG worker, which consumes them in fixed
//! steps. The counter is only ever touched through atomics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic cycle credit accumulator
#[derive(Debug, Default)]
pub struct CycleCredit {
    /// Pending emulated cycles
    cycles: AtomicU64,
}

impl CycleCredit {
    /// Create an empty credit counter
    pub fn new() -> Self {
        CycleCredit {
            cycles: AtomicU64::new(0),
        }
    }

    /// Add `n` cycles of credit
    pub fn advance(&self, n: u32) {
        self.cycles.fetch_add(u64::from(n), Ordering::AcqRel);
    }

    /// Get the pending cycle count
    pub fn get_cycles(&self) -> u64 {
        self.cycles.load(Ordering::Acquire)
    }

    /// Check whether at least one full step is pending
    #[inline]
    pub fn has_step(&self, step: u32) -> bool {
        self.get_cycles() >= u64::from(step)
    }

    /// Consume one full step of credit.
    ///
    /// Returns false and leaves the credit untouched when less than `step`
    /// cycles are pending; the counter never goes below zero.
    #[inline]
    pub fn consume(&self, step: u32) -> bool {
        self.cycles
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                c.checked_sub(u64::from(step))
            })
            .is_ok()
    }

    /// Get pending cycles and reset to zero
    pub fn take_and_reset(&self) -> u64 {
        self.cycles.swap(0, Ordering::AcqRel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_credit() {
        let credit = CycleCredit::new();
        assert_eq!(credit.get_cycles(), 0);

        credit.advance(15);
        assert!(!credit.has_step(16));
        assert!(!credit.consume(16));
        assert_eq!(credit.get_cycles(), 15);

        credit.advance(17);
        assert!(credit.consume(16));
        assert!(credit.consume(16));
        assert!(!credit.consume(16));
        assert_eq!(credit.get_cycles(), 0);
    }

    #[test]
    fn test_consumed_never_exceeds_added() {
        let credit = CycleCredit::new();
        let mut added = 0u64;
        let mut consumed_steps = 0u64;

        for c in [3u32, 200, 16, 0, 1, 255, 31, 7, 228, 228] {
            credit.advance(c);
            added += u64::from(c);
            while credit.consume(16) {
                consumed_steps += 1;
            }
            assert!(consumed_steps * 16 <= added);
            assert_eq!(credit.get_cycles(), added - consumed_steps * 16);
        }
    }

    #[test]
    fn test_take_and_reset() {
        let credit = CycleCredit::new();
        credit.advance(100);
        assert_eq!(credit.take_and_reset(), 100);
        assert_eq!(credit.get_cycles(), 0);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        use std::sync::Arc;

        let credit = Arc::new(CycleCredit::new());
        let producer = {
            let credit = Arc::clone(&credit);
            std::thread::spawn(move || {
                for _ in 0..10_000 {
                    credit.advance(16);
                }
            })
        };

        let mut consumed = 0u64;
        while consumed < 10_000 {
            if credit.consume(16) {
                consumed += 1;
            } else {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert_eq!(credit.get_cycles(), 0);
    }
}
