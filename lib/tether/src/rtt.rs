use crate::sampling::{SampleSet, SampleStats};

const RING_SIZE: usize = 20;
const SAMPLE_WINDOW: usize = 10;
const SEQUENCE_MODULUS: u32 = 0x10000;

/// One outstanding ping: when it left and under which sequence number. A slot
/// stays valid until its pong is submitted or the ring wraps over it.
#[derive(Debug, Copy, Clone)]
pub struct RttEntry {
    pub time: u64,
    pub sequence: u16,
    pub valid: bool,
}

/// Sequence-indexed ring of in-flight ping timestamps feeding a sliding
/// round-trip-time window. Sequences run modulo 0x10000 while the ring holds
/// the most recent twenty, so `entry` double-checks the stored sequence to
/// reject pongs for slots that have since been reused.
pub struct RttCalculator {
    entry_sequence: u32,
    entries: [RttEntry; RING_SIZE],
    samples: SampleSet,
    stats: SampleStats,
}

impl RttCalculator {
    pub fn new() -> RttCalculator {
        RttCalculator {
            entry_sequence: 0,
            entries: [RttEntry {
                time: 0,
                sequence: 0,
                valid: false,
            }; RING_SIZE],
            samples: SampleSet::new(SAMPLE_WINDOW),
            stats: SampleStats { mean: 0, variance: 0 },
        }
    }

    /// Claim the next sequence number and record the departure time in its
    /// ring slot, overwriting any prior occupant.
    pub fn next(&mut self, now: u64) -> u16 {
        let sequence = self.entry_sequence as u16;

        self.entry_sequence += 1;
        if self.entry_sequence >= SEQUENCE_MODULUS {
            self.entry_sequence = 0;
        }

        self.entries[sequence as usize % RING_SIZE] = RttEntry {
            time: now,
            sequence,
            valid: true,
        };

        sequence
    }

    /// Look up the in-flight entry for `sequence`. Returns `None` when the
    /// slot was already consumed or reused by a later ping.
    pub fn entry(&self, sequence: u16) -> Option<RttEntry> {
        let entry = self.entries[sequence as usize % RING_SIZE];

        if entry.valid && entry.sequence == sequence {
            Some(entry)
        } else {
            None
        }
    }

    /// Consume the entry for `sequence` and fold the measured round trip into
    /// the sample window. Entries already consumed (or overwritten) are
    /// ignored and the call returns false.
    pub fn submit(&mut self, sequence: u16, recv_time: u64, delta_time: i64) -> bool {
        let slot = sequence as usize % RING_SIZE;
        let entry = self.entries[slot];

        if !entry.valid || entry.sequence != sequence {
            return false;
        }

        self.entries[slot].valid = false;

        let sample = recv_time as i64 - entry.time as i64 - delta_time;
        self.samples.submit(sample);
        self.stats = self.samples.calc();

        true
    }

    #[inline]
    pub fn mean(&self) -> i64 {
        self.stats.mean
    }

    #[inline]
    pub fn variance(&self) -> i64 {
        self.stats.variance
    }

    #[inline]
    pub fn has_samples(&self) -> bool {
        self.samples.is_initialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_then_entry() {
        let mut rtt = RttCalculator::new();

        let sequence = rtt.next(1000);
        let entry = rtt.entry(sequence).unwrap();

        assert_eq!(entry.time, 1000);
        assert_eq!(entry.sequence, sequence);
        assert!(entry.valid);
    }

    #[test]
    fn test_submit_consumes_entry() {
        let mut rtt = RttCalculator::new();

        let sequence = rtt.next(1000);

        assert!(rtt.submit(sequence, 6000, 0));
        assert!(rtt.entry(sequence).is_none());
        assert!(!rtt.submit(sequence, 6000, 0));
        assert_eq!(rtt.mean(), 5000);
        assert_eq!(rtt.variance(), 0);
    }

    #[test]
    fn test_delta_time_subtracted() {
        let mut rtt = RttCalculator::new();

        let sequence = rtt.next(1000);
        rtt.submit(sequence, 6000, 2000);

        assert_eq!(rtt.mean(), 3000);
    }

    #[test]
    fn test_ring_wrap_invalidates_old_sequence() {
        let mut rtt = RttCalculator::new();

        let first = rtt.next(1);
        for tick in 0..RING_SIZE as u64 {
            rtt.next(2 + tick);
        }

        // The slot for the first sequence has been reused twenty pings later.
        assert!(rtt.entry(first).is_none());
        assert!(!rtt.submit(first, 1000, 0));
    }

    #[test]
    fn test_sequence_wraps_at_modulus() {
        let mut rtt = RttCalculator::new();

        rtt.entry_sequence = 0xffff;

        assert_eq!(rtt.next(1), 0xffff);
        assert_eq!(rtt.next(2), 0);
        assert_eq!(rtt.next(3), 1);
    }
}
