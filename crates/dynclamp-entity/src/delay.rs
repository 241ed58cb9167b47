//! Delay generators for [`VariableDelayConnection`](crate::VariableDelayConnection).
//!
//! A generator is sampled once per inbound event. Degenerate samples
//! (zero, negative, NaN, infinite) are not errors: the connection simply
//! draws again.
//!
//! The random generators use a seeded ChaCha8 RNG, so two connections
//! built with the same seed produce the same delay sequence.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use dynclamp_core::EntityError;

/// Source of per-event transmission delays, in seconds.
pub trait DelayGenerator: Send + 'static {
    /// Draw the next delay. May return degenerate values.
    fn sample(&mut self) -> f64;
}

impl<F> DelayGenerator for F
where
    F: FnMut() -> f64 + Send + 'static,
{
    fn sample(&mut self) -> f64 {
        self()
    }
}

/// Always returns the same delay.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedDelay(pub f64);

impl DelayGenerator for FixedDelay {
    fn sample(&mut self) -> f64 {
        self.0
    }
}

/// Delay drawn uniformly from `[low, high)`.
#[derive(Clone, Debug)]
pub struct UniformDelay {
    low: f64,
    high: f64,
    rng: ChaCha8Rng,
}

impl UniformDelay {
    /// Uniform delays in `[low, high)` seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if either bound is not finite or `low >= high`.
    pub fn new(low: f64, high: f64, seed: u64) -> Result<Self, EntityError> {
        if !low.is_finite() {
            return Err(EntityError::invalid("low", low, "must be finite"));
        }
        if !high.is_finite() || high <= low {
            return Err(EntityError::invalid(
                "high",
                high,
                format!("must be finite and greater than low ({low})"),
            ));
        }
        Ok(Self {
            low,
            high,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
}

impl DelayGenerator for UniformDelay {
    fn sample(&mut self) -> f64 {
        self.low + (self.high - self.low) * self.rng.gen::<f64>()
    }
}

/// Normally distributed delay with the given mean and standard deviation.
///
/// Negative draws are left to the connection's resampling loop, which
/// makes this a truncated normal in practice.
#[derive(Clone, Debug)]
pub struct NormalDelay {
    mean: f64,
    std_dev: f64,
    rng: ChaCha8Rng,
}

impl NormalDelay {
    /// Normal delays seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `mean` is not finite and positive, or `std_dev` is
    /// negative or not finite.
    pub fn new(mean: f64, std_dev: f64, seed: u64) -> Result<Self, EntityError> {
        if !mean.is_finite() || mean <= 0.0 {
            return Err(EntityError::invalid("mean", mean, "must be finite and > 0"));
        }
        if !std_dev.is_finite() || std_dev < 0.0 {
            return Err(EntityError::invalid(
                "std_dev",
                std_dev,
                "must be finite and >= 0",
            ));
        }
        Ok(Self {
            mean,
            std_dev,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Box-Muller transform.
    fn standard_normal(&mut self) -> f64 {
        let u1: f64 = self.rng.gen::<f64>().max(1e-300);
        let u2: f64 = self.rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }
}

impl DelayGenerator for NormalDelay {
    fn sample(&mut self) -> f64 {
        self.mean + self.std_dev * self.standard_normal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stays_in_range() {
        let mut g = UniformDelay::new(1e-3, 2e-3, 7).unwrap();
        for _ in 0..1000 {
            let d = g.sample();
            assert!((1e-3..2e-3).contains(&d), "{d} out of range");
        }
    }

    #[test]
    fn uniform_is_deterministic_per_seed() {
        let mut a = UniformDelay::new(0.0, 1.0, 42).unwrap();
        let mut b = UniformDelay::new(0.0, 1.0, 42).unwrap();
        for _ in 0..32 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn uniform_rejects_inverted_bounds() {
        assert!(UniformDelay::new(2.0, 1.0, 0).is_err());
        assert!(UniformDelay::new(f64::NAN, 1.0, 0).is_err());
    }

    #[test]
    fn normal_mean_is_close() {
        let mut g = NormalDelay::new(5e-3, 1e-3, 3).unwrap();
        let n = 20_000;
        let mean = (0..n).map(|_| g.sample()).sum::<f64>() / n as f64;
        assert!((mean - 5e-3).abs() < 1e-4, "mean {mean}");
    }

    #[test]
    fn closures_are_generators() {
        let mut k = 0.0;
        let mut g = move || {
            k += 1.0;
            k
        };
        assert_eq!(DelayGenerator::sample(&mut g), 1.0);
        assert_eq!(DelayGenerator::sample(&mut g), 2.0);
    }
}
