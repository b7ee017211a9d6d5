//! Scatter/gather video output
//!
//! Frame buffers split into transport-tagged parts, the double-buffer
//! handoff driven by vertical blank, and the worker that pushes finished
//! frames to the display.

pub mod buffer;
pub mod pipeline;
pub mod transmitter;

pub use buffer::{deallocate, Part, VideoBuffer, BYTES_PER_PIXEL, PREFIX_LEN};
pub use pipeline::{double_buffered, Frame, FramePresenter, FrameReceiver, FrameReport, FrameStats};
pub use transmitter::{transmit_frame, CountingTransport, DisplayTransport, VideoTransmitter};
