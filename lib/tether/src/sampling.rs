/// Fixed-size sliding window over signed nanosecond samples, maintaining the
/// running sum and sum of squares so mean and variance come out in constant
/// time. The first submission primes every slot, so the window always reads
/// as full.
pub struct SampleSet {
    values: Vec<i64>,
    sum: i128,
    sum_squared: i128,
    index: usize,
    initialized: bool,
}

/// Windowed aggregates. Integer division throughout; the variance is the
/// biased (population) estimator in squared nanoseconds.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SampleStats {
    pub mean: i64,
    pub variance: i64,
}

impl SampleSet {
    #[inline]
    pub fn new(capacity: usize) -> SampleSet {
        SampleSet {
            values: vec![0; capacity],
            sum: 0,
            sum_squared: 0,
            index: 0,
            initialized: false,
        }
    }

    /// Push a sample, displacing the oldest one once the window has been
    /// primed.
    pub fn submit(&mut self, value: i64) {
        let count = self.values.len() as i128;
        let value_wide = i128::from(value);

        if !self.initialized {
            for slot in self.values.iter_mut() {
                *slot = value;
            }

            self.sum = value_wide * count;
            self.sum_squared = value_wide * value_wide * count;
            self.initialized = true;
            return;
        }

        let old = i128::from(self.values[self.index]);

        self.sum += value_wide - old;
        self.sum_squared += value_wide * value_wide - old * old;
        self.values[self.index] = value;
        self.index = (self.index + 1) % self.values.len();
    }

    /// Current mean and variance of the window.
    pub fn calc(&self) -> SampleStats {
        let count = self.values.len() as i128;
        let mean = self.sum / count;
        let variance = self.sum_squared / count - mean * mean;

        SampleStats {
            mean: mean as i64,
            variance: variance as i64,
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_submission_primes_window() {
        let mut samples = SampleSet::new(10);

        samples.submit(42);

        assert_eq!(samples.calc(), SampleStats { mean: 42, variance: 0 });
    }

    #[test]
    fn test_constant_samples() {
        let mut samples = SampleSet::new(10);

        for _ in 0..10 {
            samples.submit(7_000_000);
        }

        assert_eq!(samples.calc(), SampleStats { mean: 7_000_000, variance: 0 });
    }

    #[test]
    fn test_window_holds_last_n() {
        let mut samples = SampleSet::new(4);

        // Prime with 100, then push enough values to displace every primed
        // slot: the window must contain exactly the last four.
        samples.submit(100);
        for value in &[1i64, 2, 3, 4, 5] {
            samples.submit(*value);
        }

        assert_eq!(samples.calc().mean, (2 + 3 + 4 + 5) / 4);

        let expected_variance = {
            let mean = (2 + 3 + 4 + 5) / 4;
            (4 + 9 + 16 + 25) / 4 - mean * mean
        };

        assert_eq!(samples.calc().variance, expected_variance);
    }

    #[test]
    fn test_variance_of_spread() {
        let mut samples = SampleSet::new(2);

        samples.submit(0);
        samples.submit(10);

        // Window holds {10, 0}: mean 5, variance (100 + 0)/2 - 25 = 25.
        assert_eq!(samples.calc(), SampleStats { mean: 5, variance: 25 });
    }

    #[test]
    fn test_large_magnitudes_do_not_overflow() {
        let mut samples = SampleSet::new(10);

        // Seconds-scale RTTs in nanoseconds; their squares exceed u64.
        for _ in 0..10 {
            samples.submit(5_000_000_000);
        }

        assert_eq!(samples.calc().mean, 5_000_000_000);
        assert_eq!(samples.calc().variance, 0);
    }
}
