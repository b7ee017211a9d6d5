//! Cross-thread primitives
//!
//! The only channels between the emulation thread and the audio/video
//! workers. None of them block the producer.

pub mod cycle_credit;
pub mod mailbox;
pub mod notify;
pub mod register_queue;

pub use cycle_credit::CycleCredit;
pub use mailbox::{Delivery, Mailbox};
pub use notify::WakeSignal;
pub use register_queue::{RegisterQueue, RegisterQueueError, DEFAULT_QUEUE_CAPACITY};
