//! Sample timestamp planning.

use std::time::Duration;

/// Compute `count` evenly spaced timestamps strictly inside `(0, duration)`.
///
/// Timestamp `i` is `duration / (count + 1) * (i + 1)`. The exact start and
/// end of the clip are excluded: the first picture is often black and a seek
/// to the very end has no frame to land on.
///
/// Timestamps are computed in whole nanoseconds, rounded down. They are
/// strictly increasing whenever `duration` spans more than `count`
/// nanoseconds; shorter durations cannot hold `count` distinct instants.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use reelscan::sample_timestamps;
///
/// let timestamps = sample_timestamps(Duration::from_secs(16), 3);
/// assert_eq!(
///     timestamps,
///     vec![Duration::from_secs(4), Duration::from_secs(8), Duration::from_secs(12)],
/// );
/// ```
pub fn sample_timestamps(duration: Duration, count: usize) -> Vec<Duration> {
    let total_nanos = duration.as_nanos();
    let slots = count as u128 + 1;
    (1..=count as u128)
        .map(|slot| nanos_to_duration(total_nanos * slot / slots))
        .collect()
}

fn nanos_to_duration(nanos: u128) -> Duration {
    const NANOS_PER_SECOND: u128 = 1_000_000_000;
    let seconds = u64::try_from(nanos / NANOS_PER_SECOND).unwrap_or(u64::MAX);
    Duration::new(seconds, (nanos % NANOS_PER_SECOND) as u32)
}
