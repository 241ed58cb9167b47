//! Leaky integrate-and-fire neuron.
//!
//! ```text
//! C dV/dt = -(V - E_L) * C / tau_m + I_ext + sum(inputs)
//! ```
//!
//! integrated with forward Euler. When `V` reaches `v_th` the neuron
//! emits a `Spike` event, resets to `v_reset` and ignores input for the
//! refractory period. Inputs are currents from predecessors (synapses,
//! current sources). The output is the membrane potential.
//!
//! Constructed via the builder pattern: [`LifNeuron::builder`]. The
//! parameters are re-read and re-validated at every `initialise`.

use dynclamp_core::{EntityError, Event, EventKind, Parameters, SimClock};
use dynclamp_entity::{Capability, Entity, EntityCore, StepContext};

/// State index of the membrane potential.
const V: usize = 0;
/// State index of the remaining refractory time.
const REFRACTORY_LEFT: usize = 1;

/// A leaky integrate-and-fire membrane.
#[derive(Debug)]
pub struct LifNeuron {
    core: EntityCore,
    capacitance: f64,
    tau_m: f64,
    e_leak: f64,
    v_th: f64,
    v_reset: f64,
    refractory: f64,
    i_ext: f64,
    spikes: u64,
}

/// Builder for [`LifNeuron`].
///
/// Defaults describe a small cortical cell: C = 100 pF, tau_m = 20 ms,
/// E_L = -70 mV, threshold -50 mV, reset -60 mV, 2 ms refractory period,
/// no bias current.
#[derive(Clone, Debug)]
pub struct LifNeuronBuilder {
    capacitance: f64,
    tau_m: f64,
    e_leak: f64,
    v_th: f64,
    v_reset: f64,
    refractory: f64,
    i_ext: f64,
}

impl LifNeuron {
    /// Create a new builder with default parameters.
    pub fn builder() -> LifNeuronBuilder {
        LifNeuronBuilder {
            capacitance: 100e-12,
            tau_m: 20e-3,
            e_leak: -70e-3,
            v_th: -50e-3,
            v_reset: -60e-3,
            refractory: 2e-3,
            i_ext: 0.0,
        }
    }

    /// Membrane potential.
    pub fn potential(&self) -> f64 {
        self.core.state()[V]
    }

    /// Spikes emitted since `initialise`.
    pub fn spike_count(&self) -> u64 {
        self.spikes
    }

    /// Whether the neuron is in its refractory period.
    pub fn is_refractory(&self) -> bool {
        self.core.state()[REFRACTORY_LEFT] > 0.0
    }
}

impl LifNeuronBuilder {
    /// Membrane capacitance in farads (default 100 pF).
    pub fn capacitance(mut self, c: f64) -> Self {
        self.capacitance = c;
        self
    }

    /// Membrane time constant in seconds (default 20 ms).
    pub fn tau_m(mut self, tau: f64) -> Self {
        self.tau_m = tau;
        self
    }

    /// Leak reversal (resting) potential in volts (default -70 mV).
    pub fn e_leak(mut self, e: f64) -> Self {
        self.e_leak = e;
        self
    }

    /// Spike threshold in volts (default -50 mV).
    pub fn threshold(mut self, v: f64) -> Self {
        self.v_th = v;
        self
    }

    /// Post-spike reset potential in volts (default -60 mV).
    pub fn reset(mut self, v: f64) -> Self {
        self.v_reset = v;
        self
    }

    /// Refractory period in seconds (default 2 ms).
    pub fn refractory(mut self, t: f64) -> Self {
        self.refractory = t;
        self
    }

    /// Constant bias current in amperes (default 0).
    pub fn bias_current(mut self, i: f64) -> Self {
        self.i_ext = i;
        self
    }

    /// Build the neuron, validating all parameters.
    ///
    /// # Errors
    ///
    /// Returns `Err` if:
    /// - `capacitance` or `tau_m` is not finite and positive
    /// - `refractory` is negative or not finite
    /// - any potential or the bias current is not finite
    /// - `reset` is not below `threshold`
    pub fn build(self) -> Result<LifNeuron, EntityError> {
        self.validate()?;
        let params = Parameters::new()
            .with("capacitance", self.capacitance)
            .with("tau_m", self.tau_m)
            .with("e_leak", self.e_leak)
            .with("v_th", self.v_th)
            .with("v_reset", self.v_reset)
            .with("refractory", self.refractory)
            .with("i_ext", self.i_ext);
        let mut core = EntityCore::with_state(params, 2);
        core.state_mut()[V] = self.e_leak;
        Ok(LifNeuron {
            core,
            capacitance: self.capacitance,
            tau_m: self.tau_m,
            e_leak: self.e_leak,
            v_th: self.v_th,
            v_reset: self.v_reset,
            refractory: self.refractory,
            i_ext: self.i_ext,
            spikes: 0,
        })
    }
}

impl LifNeuronBuilder {
    fn from_params(params: &Parameters) -> Result<Self, EntityError> {
        Ok(Self {
            capacitance: params.require("capacitance")?,
            tau_m: params.require("tau_m")?,
            e_leak: params.require("e_leak")?,
            v_th: params.require("v_th")?,
            v_reset: params.require("v_reset")?,
            refractory: params.require("refractory")?,
            i_ext: params.require("i_ext")?,
        })
    }

    fn validate(&self) -> Result<(), EntityError> {
        for (name, value) in [("capacitance", self.capacitance), ("tau_m", self.tau_m)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EntityError::invalid(name, value, "must be finite and > 0"));
            }
        }
        if !self.refractory.is_finite() || self.refractory < 0.0 {
            return Err(EntityError::invalid(
                "refractory",
                self.refractory,
                "must be finite and >= 0",
            ));
        }
        for (name, value) in [
            ("e_leak", self.e_leak),
            ("v_th", self.v_th),
            ("v_reset", self.v_reset),
            ("i_ext", self.i_ext),
        ] {
            if !value.is_finite() {
                return Err(EntityError::invalid(name, value, "must be finite"));
            }
        }
        if self.v_reset >= self.v_th {
            return Err(EntityError::invalid(
                "v_reset",
                self.v_reset,
                format!("must be below threshold ({})", self.v_th),
            ));
        }
        Ok(())
    }
}

impl Entity for LifNeuron {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "LifNeuron"
    }

    fn capability(&self) -> Capability {
        Capability::Neuron
    }

    fn output(&self) -> f64 {
        self.potential()
    }

    fn initialise(&mut self, _clock: &SimClock) -> Result<(), EntityError> {
        let p = LifNeuronBuilder::from_params(self.core.params())?;
        p.validate()?;
        self.capacitance = p.capacitance;
        self.tau_m = p.tau_m;
        self.e_leak = p.e_leak;
        self.v_th = p.v_th;
        self.v_reset = p.v_reset;
        self.refractory = p.refractory;
        self.i_ext = p.i_ext;

        let e_leak = self.e_leak;
        let state = self.core.state_mut();
        state[V] = e_leak;
        state[REFRACTORY_LEFT] = 0.0;
        self.spikes = 0;
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        let dt = ctx.dt();
        let current = self.i_ext + self.core.input_sum();
        let (e_leak, tau_m, c) = (self.e_leak, self.tau_m, self.capacitance);
        let state = self.core.state_mut();

        if state[REFRACTORY_LEFT] > 0.0 {
            state[REFRACTORY_LEFT] = (state[REFRACTORY_LEFT] - dt).max(0.0);
            return Ok(());
        }

        let v = state[V];
        state[V] = v + dt * (-(v - e_leak) / tau_m + current / c);
        if state[V] >= self.v_th {
            state[V] = self.v_reset;
            state[REFRACTORY_LEFT] = self.refractory;
            self.spikes += 1;
            ctx.emit(EventKind::Spike, [1.0]);
        }
        Ok(())
    }

    fn handle_event(&mut self, event: &Event, _ctx: &mut StepContext<'_>) {
        match event.kind() {
            EventKind::Reset => {
                let e_leak = self.e_leak;
                let state = self.core.state_mut();
                state[V] = e_leak;
                state[REFRACTORY_LEFT] = 0.0;
            }
            other => log::debug!("{}: ignoring {other} event", self.core.id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynclamp_entity::EventQueue;

    fn run(neuron: &mut LifNeuron, dt: f64, ticks: usize) -> usize {
        let queue = EventQueue::new();
        let mut clock = SimClock::new(dt);
        neuron.initialise(&clock).unwrap();
        let mut spikes = 0;
        for _ in 0..ticks {
            clock.advance();
            let mut ctx = StepContext::new(&clock, neuron.id(), &queue);
            neuron.step(&mut ctx).unwrap();
            spikes += queue.drain().len();
        }
        spikes
    }

    #[test]
    fn rests_without_input() {
        let mut n = LifNeuron::builder().build().unwrap();
        assert_eq!(run(&mut n, 1e-4, 10_000), 0);
        assert!((n.potential() - -70e-3).abs() < 1e-12);
    }

    #[test]
    fn suprathreshold_bias_fires_regularly() {
        // Steady state E_L + I * tau_m / C = -70 mV + 30 mV, above threshold.
        let mut n = LifNeuron::builder().bias_current(150e-12).build().unwrap();
        let spikes = run(&mut n, 1e-4, 10_000);
        assert!(spikes > 5, "{spikes} spikes in 1 s");
        assert_eq!(spikes as u64, n.spike_count());
    }

    #[test]
    fn subthreshold_bias_settles_below_threshold() {
        // Steady state -70 mV + 10 mV.
        let mut n = LifNeuron::builder().bias_current(50e-12).build().unwrap();
        assert_eq!(run(&mut n, 1e-4, 20_000), 0);
        assert!((n.potential() - -60e-3).abs() < 1e-4);
    }

    #[test]
    fn bias_set_through_params_applies_at_initialise() {
        let mut n = LifNeuron::builder().build().unwrap();
        n.core_mut().params_mut().set("i_ext", 150e-12);
        assert!(run(&mut n, 1e-4, 10_000) > 5);

        n.core_mut().params_mut().set("v_reset", -40e-3);
        assert!(n.initialise(&SimClock::new(1e-4)).is_err());
    }

    #[test]
    fn reset_must_be_below_threshold() {
        assert!(LifNeuron::builder()
            .threshold(-50e-3)
            .reset(-40e-3)
            .build()
            .is_err());
        assert!(LifNeuron::builder().tau_m(0.0).build().is_err());
    }
}
