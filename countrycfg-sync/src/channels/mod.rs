//! Channel implementations for the broadcast transport.
//!
//! - [`WindowChannel`]: direct posts to a parent or opener context
//! - [`BusChannel`]: same-origin fan-out over an [`OriginBus`]
//! - [`StorageChannel`]: envelopes written to a shared store slot

mod bus;
mod storage;
mod window;

pub use bus::{BusChannel, BusFrame, OriginBus};
pub use storage::StorageChannel;
pub use window::{WindowChannel, WindowHandle, WindowMessage};
