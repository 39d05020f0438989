/// Default notification queue depth, in batches.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// Ids are unsigned 32-bit on the wire, so the counter wraps at 2^32 at most.
pub const MAX_REQUEST_ID_CEILING: u64 = 1 << 32;

/// What the read loop does when the notification queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Wait for the consumer to make room. Responses queued behind the
    /// blocked batch wait too, so the consumer must keep draining.
    #[default]
    Backpressure,
    /// Drop the batch that did not fit and log it.
    DropNewest,
}

/// Configuration for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Request ids wrap modulo this value. Clamped to
    /// `1..=MAX_REQUEST_ID_CEILING`. Default: 2^32.
    pub request_id_ceiling: u64,
    /// Notification queue depth in batches. Default: 1024. Zero is treated
    /// as one.
    pub notification_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_id_ceiling: MAX_REQUEST_ID_CEILING,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            overflow: OverflowPolicy::default(),
        }
    }
}
