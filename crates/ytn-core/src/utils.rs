use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use tokio_util::sync::CancellationToken;

// ============== Cancellation ==============

/// Sleep for `dur` unless `cancel` fires first.
///
/// Returns `true` when the sleep was cut short by cancellation.
pub async fn sleep_or_cancelled(cancel: &CancellationToken, dur: Duration) -> bool {
    if cancel.is_cancelled() {
        return true;
    }
    if dur.is_zero() {
        return false;
    }
    tokio::select! {
      _ = cancel.cancelled() => true,
      _ = tokio::time::sleep(dur) => false,
    }
}

// ============== Timestamp Helpers ==============

/// Midnight (00:00:00 UTC) of the day containing `now`.
pub fn start_of_utc_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}
