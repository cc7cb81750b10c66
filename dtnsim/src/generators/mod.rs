/*!
# Stochastic traffic generators

Three interchangeable arrival processes share one lifecycle contract:
suspend until `tstart`, produce bundle-creation events until `tend` (or
until the liveness flag is cleared), report every created bundle to the
monitor and hand it to the origin node's forwarding entry point.

- [`BernoulliGenerator`] — per-second Bernoulli trial, uniform batch size.
- [`PoissonGenerator`] — memoryless exponential inter-arrival gaps.
- [`SensorGenerator`] — per-second binomial count over independent sensors.

*/

mod bernoulli;
mod poisson;
mod sensor;

pub use self::{
    bernoulli::BernoulliGenerator, poisson::PoissonGenerator, sensor::SensorGenerator,
};

use dtnsim_core::{Bundle, GeneratorId, NodeId, SimContext, SimTime, Topology};
use rand::seq::SliceRandom as _;
use rand_chacha::ChaChaRng;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;

/// The tick granularity of the slotted generators (Bernoulli, sensor).
pub(crate) const TICK: Duration = Duration::from_secs(1);

/// Error rejecting an invalid generator configuration.
///
/// Configuration errors are fatal and surface at construction: a
/// misconfigured generator never starts.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// `min_bundles` must not exceed `max_bundles`.
    #[error("Invalid batch bounds: min_bundles ({min}) > max_bundles ({max})")]
    InvalidBatchBounds { min: u32, max: u32 },
    /// A probability parameter was outside `[0, 1]`.
    #[error("Probability ({p}) must be within [0, 1]")]
    InvalidProbability { p: f64 },
    /// The mean arrival rate must not be negative.
    #[error("Arrival rate ({rate}) must not be negative")]
    NegativeRate { rate: f64 },
    /// The fixed destination is the origin node itself.
    #[error("Fixed destination ({destination}) is the origin node")]
    DestinationIsOrigin { destination: NodeId },
    /// The fixed destination is not registered in the topology.
    #[error("Fixed destination ({destination}) is not part of the topology")]
    UnknownDestination { destination: NodeId },
    /// Random destination selection needs at least one node besides the
    /// origin.
    #[error("Random destinations require at least two nodes in the topology")]
    NotEnoughNodes,
    /// The validity window is inverted.
    #[error("Validity window ends ({tend}) before it starts ({tstart})")]
    InvalidWindow { tstart: SimTime, tend: SimTime },
}

/// Cancellation handle shared between a generator and its owner.
///
/// Clearing the flag takes effect within one event: the generator checks
/// it immediately before every forwarding call and exits without
/// forwarding once it reads `false`. A bundle already created and
/// reported before the check is not retracted.
#[derive(Debug, Clone)]
pub struct LivenessFlag(Arc<AtomicBool>);

impl LivenessFlag {
    /// A fresh flag, alive.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    #[inline]
    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear the flag. The generator terminates gracefully at its next
    /// check; this is not an error path.
    pub fn kill(&self) {
        self.0.store(false, Ordering::Relaxed)
    }
}

impl Default for LivenessFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// The shape every bundle of a generator is stamped from.
#[derive(Debug, Clone)]
pub struct BundleShape {
    pub data_type: String,
    /// payload size in bytes
    pub size: u64,
    pub ttl: Duration,
    pub critical: bool,
}

/// Construction-time parameters common to every generator variant.
///
/// Immutable for the lifetime of the generator. The variant-specific
/// arrival parameters are passed to the variant's constructor directly.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub generator: GeneratorId,
    /// start of the validity window (first possible arrival instant)
    pub tstart: SimTime,
    /// end of the validity window, exclusive: no arrival at or past it
    pub tend: SimTime,
    pub shape: BundleShape,
    /// fixed destination; when `None` a destination is drawn uniformly
    /// from all nodes but the origin, independently on every event
    pub destination: Option<NodeId>,
}

impl GeneratorConfig {
    /// Length of the validity window, zero if inverted.
    pub(crate) fn window(&self) -> Duration {
        self.tend.elapsed_since(self.tstart)
    }
}

/// Outcome of handing one bundle to the forwarding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Emission {
    /// The bundle entered the network; keep generating.
    Forwarded,
    /// The liveness flag was cleared at the hand-off point; the process
    /// must exit without forwarding.
    Halted,
}

/// The lifecycle plumbing shared by all generator variants: validated
/// configuration, destination selection and the create/report/forward
/// sequence.
#[derive(Debug)]
pub(crate) struct Emitter {
    config: GeneratorConfig,
    origin: NodeId,
    /// candidate destinations for the random draw, sorted so the draw
    /// sequence only depends on the seed
    candidates: Vec<NodeId>,
    alive: LivenessFlag,
}

impl Emitter {
    pub(crate) fn new(
        config: GeneratorConfig,
        origin: NodeId,
        topology: &Topology,
        alive: LivenessFlag,
    ) -> Result<Self, GeneratorError> {
        if config.tend < config.tstart {
            return Err(GeneratorError::InvalidWindow {
                tstart: config.tstart,
                tend: config.tend,
            });
        }

        let candidates = match &config.destination {
            Some(destination) => {
                if destination == &origin {
                    return Err(GeneratorError::DestinationIsOrigin {
                        destination: destination.clone(),
                    });
                }
                if !topology.contains_node(destination) {
                    return Err(GeneratorError::UnknownDestination {
                        destination: destination.clone(),
                    });
                }
                Vec::new()
            }
            None => {
                let mut candidates: Vec<NodeId> = topology
                    .node_ids()
                    .filter(|id| *id != &origin)
                    .cloned()
                    .collect();
                if candidates.is_empty() {
                    return Err(GeneratorError::NotEnoughNodes);
                }
                candidates.sort();
                candidates
            }
        };

        Ok(Self {
            config,
            origin,
            candidates,
            alive,
        })
    }

    #[inline]
    pub(crate) fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.is_alive()
    }

    /// `true` while `now` is inside the validity window.
    #[inline]
    pub(crate) fn window_open(&self, now: SimTime) -> bool {
        now < self.config.tend
    }

    /// The destination of the next arrival event: the fixed one, or a
    /// fresh uniform draw over the candidates.
    pub(crate) fn pick_destination(&self, rng: &mut ChaChaRng) -> NodeId {
        match &self.config.destination {
            Some(destination) => destination.clone(),
            None => self
                .candidates
                .choose(rng)
                .expect("candidates are non-empty when no fixed destination is set")
                .clone(),
        }
    }

    /// Create one bundle, report it to the monitor, then — liveness
    /// permitting — hand it to the origin node's forwarding entry point.
    pub(crate) fn emit(&self, ctx: &mut SimContext<'_>, destination: &NodeId) -> Emission {
        let now = ctx.now();
        let shape = &self.config.shape;
        let bundle = Bundle::builder(ctx.bundle_ids())
            .origin(self.origin.clone())
            .destination(destination.clone())
            .data_type(shape.data_type.clone())
            .size(shape.size)
            .ttl(shape.ttl)
            .critical(shape.critical)
            .generator(self.config.generator)
            .created(now)
            .build()
            .expect("origin, destination and size are always set");

        tracing::debug!(origin = %self.origin, %bundle, "bundle created");
        ctx.monitor().bundle_created(now, &bundle);

        if !self.is_alive() {
            return Emission::Halted;
        }

        match ctx.topology().node_mut(&self.origin) {
            Ok(node) => {
                node.forward(bundle);
                Emission::Forwarded
            }
            Err(error) => {
                tracing::warn!(%error, "origin node disappeared from the topology");
                Emission::Halted
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config, three_node_topology};

    #[test]
    fn fixed_destination_must_not_be_origin() {
        let topology = three_node_topology();
        let origin: NodeId = "EARTH".parse().unwrap();
        let mut cfg = config();
        cfg.destination = Some(origin.clone());

        let result = Emitter::new(cfg, origin, &topology, LivenessFlag::new());
        assert!(matches!(
            result,
            Err(GeneratorError::DestinationIsOrigin { .. })
        ));
    }

    #[test]
    fn fixed_destination_must_be_registered() {
        let topology = three_node_topology();
        let mut cfg = config();
        cfg.destination = Some("MOON".parse().unwrap());

        let result = Emitter::new(cfg, "EARTH".parse().unwrap(), &topology, LivenessFlag::new());
        assert!(matches!(
            result,
            Err(GeneratorError::UnknownDestination { .. })
        ));
    }

    #[test]
    fn random_destinations_need_a_second_node() {
        let mut topology = Topology::new();
        topology
            .new_node("EARTH".parse().unwrap())
            .build()
            .unwrap();

        let result = Emitter::new(
            config(),
            "EARTH".parse().unwrap(),
            &topology,
            LivenessFlag::new(),
        );
        assert!(matches!(result, Err(GeneratorError::NotEnoughNodes)));
    }

    #[test]
    fn inverted_window_rejected() {
        let topology = three_node_topology();
        let mut cfg = config();
        cfg.tstart = SimTime::from_secs(10);
        cfg.tend = SimTime::from_secs(5);

        let result = Emitter::new(cfg, "EARTH".parse().unwrap(), &topology, LivenessFlag::new());
        assert!(matches!(result, Err(GeneratorError::InvalidWindow { .. })));
    }

    #[test]
    fn random_draw_never_picks_origin() {
        use rand::SeedableRng as _;

        let topology = three_node_topology();
        let origin: NodeId = "RELAY".parse().unwrap();
        let emitter = Emitter::new(config(), origin.clone(), &topology, LivenessFlag::new())
            .unwrap();

        let mut rng = ChaChaRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_ne!(emitter.pick_destination(&mut rng), origin);
        }
    }
}
