//! Client configuration constants.
//!
//! Centralizes hardcoded values; [`SessionConfig`](crate::SessionConfig)
//! falls back to these when a field is not configured.

use std::time::Duration;

/// Delay before the first reconnect attempt, before doubling.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Ceiling on the exponential part of the reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Upper bound (exclusive) of the random delay added to each attempt.
pub const DEFAULT_JITTER: Duration = Duration::from_millis(1000);

/// Timeout for opening the transport. Keeps the session from hanging on SYN
/// blackholes or stalled servers.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the session event broadcast channel. Slow subscribers past
/// this many events see `RecvError::Lagged` and should re-read the view.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
