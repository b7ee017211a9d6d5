//! Single-slot mailbox
//!
//! One-element handoff between a producer that must never block and a
//! consumer worker. The slot stays occupied from `try_send` until the
//! consumer drops the [`Delivery`] it received, so "occupied" covers both
//! "waiting to be picked up" and "being processed". Sending into an occupied
//! slot fails and is counted.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
struct Slot<T> {
    item: Option<T>,
    in_flight: bool,
    closed: bool,
}

/// Single-slot drop-on-occupied mailbox
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    condvar: Condvar,
    rejected: AtomicU64,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Mailbox {
            slot: Mutex::new(Slot {
                item: None,
                in_flight: false,
                closed: false,
            }),
            condvar: Condvar::new(),
            rejected: AtomicU64::new(0),
        }
    }

    /// Offer an item without blocking.
    ///
    /// Fails, handing the item back, when the slot is occupied or the
    /// mailbox has been closed.
    pub fn try_send(&self, value: T) -> Result<(), T> {
        let mut slot = self.slot.lock();
        if slot.closed || slot.item.is_some() || slot.in_flight {
            drop(slot);
            self.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(value);
        }
        slot.item = Some(value);
        drop(slot);
        self.condvar.notify_one();
        Ok(())
    }

    /// Block until an item arrives.
    ///
    /// Returns `None` once the mailbox is closed.
    pub fn recv(&self) -> Option<Delivery<'_, T>> {
        let mut slot = self.slot.lock();
        loop {
            if slot.closed {
                return None;
            }
            if let Some(value) = slot.item.take() {
                slot.in_flight = true;
                return Some(Delivery {
                    mailbox: self,
                    value,
                });
            }
            self.condvar.wait(&mut slot);
        }
    }

    /// Take an item if one is waiting
    pub fn try_recv(&self) -> Option<Delivery<'_, T>> {
        let mut slot = self.slot.lock();
        if slot.closed {
            return None;
        }
        let value = slot.item.take()?;
        slot.in_flight = true;
        Some(Delivery {
            mailbox: self,
            value,
        })
    }

    /// Check if the slot is waiting or in flight
    pub fn is_occupied(&self) -> bool {
        let slot = self.slot.lock();
        slot.item.is_some() || slot.in_flight
    }

    /// Number of rejected sends
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Close the mailbox and wake the consumer
    pub fn close(&self) {
        let mut slot = self.slot.lock();
        slot.closed = true;
        slot.item = None;
        drop(slot);
        self.condvar.notify_all();
    }

    fn complete(&self) {
        self.slot.lock().in_flight = false;
    }
}

/// An item received from a [`Mailbox`]
///
/// The mailbox slot stays occupied until this is dropped.
#[derive(Debug)]
pub struct Delivery<'a, T> {
    mailbox: &'a Mailbox<T>,
    value: T,
}

impl<T> Delivery<'_, T> {
    /// Access the delivered item
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Delivery<'_, T> {
    fn drop(&mut self) {
        self.mailbox.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_send_and_receive() {
        let mailbox = Mailbox::new();
        assert!(mailbox.try_send(7u32).is_ok());
        assert!(mailbox.is_occupied());

        let delivery = mailbox.try_recv().unwrap();
        assert_eq!(*delivery.value(), 7);
        assert!(mailbox.is_occupied());
        drop(delivery);
        assert!(!mailbox.is_occupied());
    }

    #[test]
    fn test_occupied_slot_rejects() {
        let mailbox = Mailbox::new();
        mailbox.try_send(1u8).unwrap();
        assert_eq!(mailbox.try_send(2), Err(2));

        let delivery = mailbox.try_recv().unwrap();
        // Still in flight
        assert_eq!(mailbox.try_send(3), Err(3));
        drop(delivery);

        assert!(mailbox.try_send(4).is_ok());
        assert_eq!(mailbox.rejected(), 2);
    }

    #[test]
    fn test_blocking_recv() {
        let mailbox = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            std::thread::spawn(move || mailbox.recv().map(|d| *d.value()))
        };
        mailbox.try_send(42u16).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn test_close_wakes_consumer() {
        let mailbox: Arc<Mailbox<u8>> = Arc::new(Mailbox::new());
        let consumer = {
            let mailbox = Arc::clone(&mailbox);
            std::thread::spawn(move || mailbox.recv().is_none())
        };
        mailbox.close();
        assert!(consumer.join().unwrap());
        assert!(mailbox.try_send(1).is_err());
    }
}
