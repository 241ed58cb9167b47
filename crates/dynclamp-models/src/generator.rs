//! Stimulus generators.
//!
//! Both generators re-read their parameters at `initialise`.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use dynclamp_core::{EntityError, EventKind, Parameters, SimClock};
use dynclamp_entity::{Capability, Entity, EntityCore, StepContext};

/// Outputs a fixed value every tick.
#[derive(Debug)]
pub struct ConstantGenerator {
    core: EntityCore,
    value: f64,
}

impl ConstantGenerator {
    /// A generator outputting `value`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `value` is not finite.
    pub fn new(value: f64) -> Result<Self, EntityError> {
        if !value.is_finite() {
            return Err(EntityError::invalid("value", value, "must be finite"));
        }
        Ok(Self {
            core: EntityCore::new(Parameters::new().with("value", value)),
            value,
        })
    }
}

impl Entity for ConstantGenerator {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "ConstantGenerator"
    }

    fn capability(&self) -> Capability {
        Capability::Generator
    }

    fn output(&self) -> f64 {
        self.value
    }

    fn initialise(&mut self, _clock: &SimClock) -> Result<(), EntityError> {
        let value = self.core.params().require("value")?;
        if !value.is_finite() {
            return Err(EntityError::invalid("value", value, "must be finite"));
        }
        self.value = value;
        Ok(())
    }

    fn step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        Ok(())
    }
}

/// Emits `Spike` events as a Poisson process.
///
/// Each tick fires with probability `1 - exp(-rate * dt)`; every spike
/// carries `weight` as its first parameter. The RNG is a ChaCha8 seeded
/// at construction and reseeded by `initialise`, so every trial with the
/// same seed replays the same spike train.
#[derive(Debug)]
pub struct PoissonGenerator {
    core: EntityCore,
    rate: f64,
    weight: f64,
    seed: u64,
    rng: ChaCha8Rng,
    fired: bool,
}

impl PoissonGenerator {
    /// A generator firing at `rate` Hz with spike weight `weight`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `rate` is negative or not finite, or `weight` is
    /// not finite.
    pub fn new(rate: f64, weight: f64, seed: u64) -> Result<Self, EntityError> {
        check_poisson(rate, weight)?;
        Ok(Self {
            core: EntityCore::new(
                Parameters::new()
                    .with("rate", rate)
                    .with("weight", weight),
            ),
            rate,
            weight,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            fired: false,
        })
    }
}

fn check_poisson(rate: f64, weight: f64) -> Result<(), EntityError> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(EntityError::invalid("rate", rate, "must be finite and >= 0"));
    }
    if !weight.is_finite() {
        return Err(EntityError::invalid("weight", weight, "must be finite"));
    }
    Ok(())
}

impl Entity for PoissonGenerator {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "PoissonGenerator"
    }

    fn capability(&self) -> Capability {
        Capability::Generator
    }

    /// `1.0` on a tick that fired, else `0.0`.
    fn output(&self) -> f64 {
        if self.fired {
            1.0
        } else {
            0.0
        }
    }

    fn initialise(&mut self, _clock: &SimClock) -> Result<(), EntityError> {
        let params = self.core.params();
        let (rate, weight) = (params.require("rate")?, params.require("weight")?);
        check_poisson(rate, weight)?;
        self.rate = rate;
        self.weight = weight;
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.fired = false;
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        let p = 1.0 - (-self.rate * ctx.dt()).exp();
        self.fired = self.rng.gen::<f64>() < p;
        if self.fired {
            ctx.emit(EventKind::Spike, [self.weight]);
        }
        Ok(())
    }
}
