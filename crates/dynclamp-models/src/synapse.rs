//! Conductance-based exponential synapse.
//!
//! Every `Spike` delivered to the synapse increments its conductance by
//! the spike's weight (first event parameter, or the synapse's default
//! weight). Each tick the conductance decays by `exp(-dt / tau)`. The
//! output is the synaptic current `g * (E_rev - V_post)`, where `V_post`
//! is the membrane potential of the neuron the synapse drives.
//!
//! `tau`, `e_rev` and `weight` are re-read from the entity's parameters at
//! every `initialise`, so values set through
//! [`EntityCore::params_mut`] take effect on the next trial.
//!
//! The driven neuron is learned at wiring time: when the synapse is
//! connected upstream of an entity advertising [`Capability::Neuron`], it
//! remembers that id and reads the neuron's output from the tick snapshot.

use dynclamp_core::{EntityError, EntityId, Event, EventKind, Parameters, SimClock};
use dynclamp_entity::{Capability, Entity, EntityCore, OutputSnapshot, StepContext};

/// Exponentially decaying synaptic conductance.
#[derive(Debug)]
pub struct ExponentialSynapse {
    core: EntityCore,
    tau: f64,
    e_rev: f64,
    weight: f64,
    decay: f64,
    target: Option<EntityId>,
    v_post: f64,
}

impl ExponentialSynapse {
    /// A synapse with decay time constant `tau` (s), reversal potential
    /// `e_rev` (V) and default spike weight `weight` (S).
    ///
    /// # Errors
    ///
    /// Returns `Err` if `tau` is not finite and positive, or `e_rev` or
    /// `weight` is not finite.
    pub fn new(tau: f64, e_rev: f64, weight: f64) -> Result<Self, EntityError> {
        check(tau, e_rev, weight)?;
        let params = Parameters::new()
            .with("tau", tau)
            .with("e_rev", e_rev)
            .with("weight", weight);
        Ok(Self {
            core: EntityCore::with_state(params, 1),
            tau,
            e_rev,
            weight,
            decay: 1.0,
            target: None,
            v_post: 0.0,
        })
    }

    /// Current conductance.
    pub fn conductance(&self) -> f64 {
        self.core.state()[0]
    }

    /// The neuron whose potential drives the current, once wired.
    pub fn target(&self) -> Option<EntityId> {
        self.target
    }
}

fn check(tau: f64, e_rev: f64, weight: f64) -> Result<(), EntityError> {
    if !tau.is_finite() || tau <= 0.0 {
        return Err(EntityError::invalid("tau", tau, "must be finite and > 0"));
    }
    if !e_rev.is_finite() {
        return Err(EntityError::invalid("e_rev", e_rev, "must be finite"));
    }
    if !weight.is_finite() {
        return Err(EntityError::invalid("weight", weight, "must be finite"));
    }
    Ok(())
}

impl Entity for ExponentialSynapse {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "ExponentialSynapse"
    }

    fn capability(&self) -> Capability {
        Capability::Synapse
    }

    fn output(&self) -> f64 {
        self.conductance() * (self.e_rev - self.v_post)
    }

    fn accept_successor(&mut self, successor: EntityId, capability: Capability) {
        if capability != Capability::Neuron {
            return;
        }
        match self.target {
            None => self.target = Some(successor),
            Some(existing) => log::warn!(
                "{}: already drives {existing}, ignoring second neuron {successor}",
                self.core.id()
            ),
        }
    }

    fn initialise(&mut self, clock: &SimClock) -> Result<(), EntityError> {
        let params = self.core.params();
        let (tau, e_rev, weight) = (
            params.require("tau")?,
            params.require("e_rev")?,
            params.require("weight")?,
        );
        check(tau, e_rev, weight)?;
        self.tau = tau;
        self.e_rev = e_rev;
        self.weight = weight;
        self.decay = (-clock.dt() / tau).exp();
        self.core.state_mut()[0] = 0.0;
        self.v_post = 0.0;
        Ok(())
    }

    fn read_and_store_inputs(&mut self, snapshot: &OutputSnapshot) {
        self.core.store_inputs(snapshot);
        if let Some(v) = self.target.and_then(|id| snapshot.output(id)) {
            self.v_post = v;
        }
    }

    fn step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        self.core.state_mut()[0] *= self.decay;
        Ok(())
    }

    fn handle_event(&mut self, event: &Event, _ctx: &mut StepContext<'_>) {
        match event.kind() {
            EventKind::Spike => {
                let w = event.param(0).unwrap_or(self.weight);
                let g = &mut self.core.state_mut()[0];
                *g = (*g + w).max(0.0);
            }
            EventKind::Reset => self.core.state_mut()[0] = 0.0,
            other => log::debug!("{}: ignoring {other} event", self.core.id()),
        }
    }
}
