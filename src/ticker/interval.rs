use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use std::time::Duration;

/// Rejection sampling for a normal interval gives up after this many non-positive draws and falls
/// back to the mean.
const MAX_NORMAL_ATTEMPTS: usize = 4;

#[derive(Debug, thiserror::Error, Clone, Eq, PartialEq)]
pub enum IntervalError {
    #[error("non-positive or zero interval for delay")]
    NonPositiveDelay,
    #[error("scaling factor must be 0 < f <= 1.0")]
    InvalidScalingFactor,
    #[error("non-positive or zero value for standard deviation")]
    NonPositiveDeviation,
}

/// Interval produces successive delays for a ticker.
///
/// Every interval owns its random source, so two intervals never contend with each other and an
/// interval built with `with_seed()` produces the same sequence of delays every time.
#[derive(Clone, Debug)]
pub struct Interval {
    strategy: Strategy,
    rng: StdRng,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Strategy {
    Fixed(Duration),
    /// Half-open `[min, max)`, in nanoseconds.
    Uniform { min: u64, max: u64 },
    /// Nanoseconds.
    Normal { mean: f64, stddev: f64 },
}

impl Interval {
    /// Always the same delay.
    pub fn fixed(delay: Duration) -> Self {
        Self::from_strategy(Strategy::Fixed(delay))
    }

    /// Uniformly distributed in `[min, max)`. If `max <= min` every delay is `min`.
    pub fn uniform(min: Duration, max: Duration) -> Self {
        Self::from_strategy(Strategy::Uniform {
            min: nanos(min),
            max: nanos(max),
        })
    }

    /// Uniformly distributed within `factor` of `delay`, e.g. `jitter(5s, 0.25)` is uniform in
    /// `[3.75s, 6.25s)`.
    pub fn jitter(delay: Duration, factor: f64) -> Result<Self, IntervalError> {
        if delay == Duration::from_nanos(0) {
            return Err(IntervalError::NonPositiveDelay);
        }

        // Also rejects NaN.
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(IntervalError::InvalidScalingFactor);
        }

        let (min, max) = scale_bounds(nanos(delay), factor);
        Ok(Self::from_strategy(Strategy::Uniform { min, max }))
    }

    /// Normally distributed around `mean`. Only positive delays are produced.
    pub fn normal(mean: Duration, stddev: Duration) -> Result<Self, IntervalError> {
        if mean == Duration::from_nanos(0) {
            return Err(IntervalError::NonPositiveDelay);
        }

        if stddev == Duration::from_nanos(0) {
            return Err(IntervalError::NonPositiveDeviation);
        }

        Ok(Self::from_strategy(Strategy::Normal {
            mean: nanos(mean) as f64,
            stddev: nanos(stddev) as f64,
        }))
    }

    /// Replace the random source with a deterministic one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// The next delay.
    pub fn delay(&mut self) -> Duration {
        match self.strategy {
            Strategy::Fixed(delay) => delay,
            Strategy::Uniform { min, max } => {
                if max <= min {
                    Duration::from_nanos(min)
                } else {
                    Duration::from_nanos(self.rng.gen_range(min..max))
                }
            }
            Strategy::Normal { mean, stddev } => {
                for _ in 0..MAX_NORMAL_ATTEMPTS {
                    let z: f64 = self.rng.sample(StandardNormal);
                    let sample = (z * stddev + mean).round();
                    if sample > 0.0 {
                        return Duration::from_nanos(sample as u64);
                    }
                }

                Duration::from_nanos(mean as u64)
            }
        }
    }

    fn from_strategy(strategy: Strategy) -> Self {
        Interval {
            strategy,
            rng: StdRng::from_entropy(),
        }
    }
}

fn nanos(duration: Duration) -> u64 {
    if duration.as_nanos() > u64::MAX as u128 {
        u64::MAX
    } else {
        duration.as_nanos() as u64
    }
}

/// `(floor(n * (1 - f)), ceil(n * (1 + f)))`, the upper bound clamped to `u64::MAX`.
fn scale_bounds(n: u64, factor: f64) -> (u64, u64) {
    let n = n as f64;
    let min = (n * (1.0 - factor)).floor();
    let max = (n * (1.0 + factor)).ceil();

    let max = if max >= u64::MAX as f64 {
        u64::MAX
    } else {
        max as u64
    };

    (min as u64, max)
}
