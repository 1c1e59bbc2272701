//! Edge-triggered "value changed" notifications
//!
//! While a client is subscribed, [`NotificationScheduler`] polls an
//! [`OutputMonitor`] on a fixed interval and tells the transport, through a
//! [`ValueChangedSink`], that output is waiting to be read. The event carries
//! only a sentinel; the output itself is fetched by the client's next read.

pub mod scheduler;

pub use scheduler::{NotificationScheduler, VALUE_CHANGED_SENTINEL};

use crate::transport::TransportError;

/// Something that can report whether new output arrived since it was last
/// acknowledged.
pub trait OutputMonitor: Send + Sync {
    fn has_pending_output(&self) -> bool;

    /// Lower the pending flags once a notification has been sent for them
    fn acknowledge_pending(&self);
}

/// Outbound "value changed" signal to the transport layer.
///
/// Implementations must not block; the scheduler calls this from its
/// polling task.
pub trait ValueChangedSink: Send + Sync {
    fn value_changed(&self, value: &[u8]) -> Result<(), TransportError>;
}
