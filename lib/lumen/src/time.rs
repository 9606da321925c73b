use lazy_static::lazy_static;
use std::time::{Instant, SystemTime};

lazy_static! {
    static ref PROCESS_EPOCH: Instant = Instant::now();
}

/// Returns the current unix timestamp (seconds elapsed since 1970-01-01)
#[inline]
pub fn timestamp_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("System clock predates the unix epoch")
        .as_secs()
}

/// Monotonic nanoseconds elapsed since the process epoch. The epoch is anchored
/// the first time any caller touches the clock, so values are only comparable
/// within a single process.
#[inline]
pub fn hrtime() -> u64 {
    let elapsed = PROCESS_EPOCH.elapsed();
    elapsed.as_secs() * 1_000_000_000 + u64::from(elapsed.subsec_nanos())
}
