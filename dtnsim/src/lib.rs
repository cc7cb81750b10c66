/*!
# DTN traffic generation & telemetry

Stochastic bundle sources and a periodic telemetry/control loop for
delay-tolerant-network simulations built on [`dtnsim_core`].

- [`generators`] — three interchangeable arrival processes
  (Bernoulli-gated batches, Poisson, sensor-binomial) that inject
  bundles into the network through a node's forwarding entry point.
- [`telemetry`] — a per-run sampling loop that aggregates node state,
  derives arrival/departure rates from cumulative counters, persists one
  CSV record per node per tick and applies a rate-limited control action
  to a designated node's radios.

*/

pub mod generators;
pub mod telemetry;

// convenient re-export of `dtnsim_core` core objects
pub use dtnsim_core::{
    Band, Bundle, DataRate, GeneratorId, Interval, Monitor, NodeId, Process, Resume, SimTime,
    Simulation, Topology,
};

pub use self::{
    generators::{
        BernoulliGenerator, BundleShape, GeneratorConfig, GeneratorError, LivenessFlag,
        PoissonGenerator, SensorGenerator,
    },
    telemetry::{
        ControlObservation, ControlPolicy, Telemetry, TelemetryBuilder, TelemetryError,
        ThresholdPolicy,
    },
};
