use crate::sampling::SampleSet;

const MILLISECOND: i64 = 1_000_000;

/// Squared-nanosecond variance of a 10ms spread.
const HIGH_RTT_VARIANCE_CAP: i64 = (10 * MILLISECOND) * (10 * MILLISECOND);
/// Squared-nanosecond variance of a 5ms spread; doubles as the stability bar
/// for leaving the high-churn level.
const STABLE_RTT_VARIANCE: i64 = (5 * MILLISECOND) * (5 * MILLISECOND);

const HIGH_MIN_PINGS: u32 = 20;
const HIGH_MIN_DELTA: i64 = 5 * MILLISECOND;
const MEDIUM_MIN_DELTA: i64 = 10 * MILLISECOND;
const LOW_MIN_MEAN_DELTA: i64 = 10 * MILLISECOND;

const RECENT_WINDOW: usize = 10;

/// Confidence tier of the estimator. Fresh sessions start out eager to adopt
/// offsets and settle down as the round-trip time stabilizes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum SyncLevel {
    High,
    Medium,
    Low,
}

/// Adaptive clock-offset estimator. The offset is "peer time minus local
/// time" in nanoseconds; callers add it to their local clock to get the
/// peer-visible time. Each accepted ping/pong exchange contributes the
/// classic two-way offset sample
/// `((req_recv - req_send) + (res_send - res_recv)) / 2`.
pub struct Clock {
    offset: i64,
    level: SyncLevel,
    high_sync_count: u32,
    recent_offsets: SampleSet,
}

impl Clock {
    pub fn new() -> Clock {
        Clock {
            offset: 0,
            level: SyncLevel::High,
            high_sync_count: 0,
            recent_offsets: SampleSet::new(RECENT_WINDOW),
        }
    }

    /// Current offset (peer time minus local time).
    #[inline]
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Hard-seed the offset so that `local_now + offset == peer_time`. Used
    /// once when the peer first reports its clock.
    #[inline]
    pub fn set(&mut self, peer_time: u64, local_now: u64) {
        self.offset = peer_time as i64 - local_now as i64;
    }

    /// Fold one ping/pong exchange into the estimate. `rtt_variance` gates
    /// how much the sample is trusted at the current level. Returns true iff
    /// the offset was updated.
    pub fn sync(
        &mut self,
        req_send: u64,
        req_recv: u64,
        res_send: u64,
        res_recv: u64,
        rtt_variance: i64,
    ) -> bool {
        let sample = ((req_recv as i64 - req_send as i64) + (res_send as i64 - res_recv as i64)) / 2;

        // The recent window sees every sample, even ones the current level
        // refuses to act on.
        self.recent_offsets.submit(sample);

        let variance_cap = match self.level {
            SyncLevel::High => HIGH_RTT_VARIANCE_CAP,
            SyncLevel::Medium | SyncLevel::Low => STABLE_RTT_VARIANCE,
        };

        if rtt_variance > variance_cap {
            return false;
        }

        match self.level {
            SyncLevel::High => {
                if self.high_sync_count >= HIGH_MIN_PINGS && rtt_variance < STABLE_RTT_VARIANCE {
                    self.level = SyncLevel::Medium;
                }
                self.high_sync_count += 1;

                if (sample - self.offset).abs() > HIGH_MIN_DELTA {
                    self.offset = sample;
                    return true;
                }

                false
            }
            SyncLevel::Medium => {
                if self.recent_offsets.calc().variance < STABLE_RTT_VARIANCE {
                    self.level = SyncLevel::Low;
                }

                if (sample - self.offset).abs() > MEDIUM_MIN_DELTA {
                    self.offset = sample;
                    return true;
                }

                false
            }
            SyncLevel::Low => {
                let mean = self.recent_offsets.calc().mean;

                if (mean - sample).abs() > LOW_MIN_MEAN_DELTA {
                    self.offset = mean;
                    return true;
                }

                false
            }
        }
    }
}
