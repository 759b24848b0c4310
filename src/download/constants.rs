//! Constants for the download module (timeouts, retry budget).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout between reads (5 minutes). Long transfers that keep
/// making progress are never cut off.
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Status the upstream CDN answers with while throttling.
pub const THROTTLED_STATUS: u16 = 525;

/// Suffix of the temporary file a download streams into.
pub const PARTIAL_SUFFIX: &str = "part";

/// Default base delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default ceiling for a single retry delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);
