/*!
# Telemetry & control loop

A single periodic [`Process`] per simulation run. Every `delta_t` of
virtual time it samples the observable state of each attached node —
queue depths, contact activity, arrival and departure deltas — persists
one record per node to that node's CSV stream, and, for the designated
control node, applies a rate-limited feedback action to the node's
radios.

All cross-tick state (previous cumulative counters, previous sent-log
lengths, the last control instant) is owned by the loop instance, so
several simulation runs can coexist in one process.

*/

mod control;
mod snapshot;
mod writer;

pub use self::{
    control::{ControlObservation, ControlPolicy, ThresholdPolicy},
    snapshot::{ContactState, DestinationClass, StateRecord},
};

use self::{
    snapshot::{aggregate_queues, contact_vector, radio_inbound_depth},
    writer::NodeWriters,
};
use dtnsim_core::{
    ConnectionId, Node, NodeId, Process, Resume, SimContext, SimTime, Topology,
};
use std::{
    collections::HashMap,
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;

/// Error rejecting an invalid telemetry configuration, or a failure of
/// the persistence layer.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// An attached node ID was not found in the topology.
    #[error("Node ({id}) is not part of the topology")]
    UnknownNode { id: NodeId },
    /// The loop needs at least one node to observe.
    #[error("No nodes attached to the telemetry loop")]
    NoNodesAttached,
    /// The designated control node must be one of the attached nodes.
    #[error("Control node ({id}) is not attached to the telemetry loop")]
    ControlNodeNotAttached { id: NodeId },
    /// The sampling interval must be a positive duration.
    #[error("Sampling interval must not be zero")]
    ZeroSampleInterval,
    /// The control interval must be at least the sampling interval.
    #[error("Control interval ({control_dt:?}) must not be shorter than the sampling interval ({delta_t:?})")]
    ControlIntervalTooShort {
        delta_t: Duration,
        control_dt: Duration,
    },
    /// Creating or writing an output stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Serialising a record failed.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Builder for the [`Telemetry`] loop.
///
/// ## Defaults
///
/// | Setting | Default |
/// |---------|---------|
/// | Sampling interval | 10 s |
/// | Control interval | the sampling interval |
/// | File prefix | `node_states` |
/// | Console diagnostics | off |
/// | Control node | none (no control action) |
/// | Control policy | [`ThresholdPolicy::default`] |
pub struct TelemetryBuilder {
    nodes: Vec<NodeId>,
    delta_t: Duration,
    control_dt: Option<Duration>,
    outdir: PathBuf,
    prefix: String,
    view_onscreen: bool,
    control_node: Option<NodeId>,
    policy: Box<dyn ControlPolicy>,
}

impl TelemetryBuilder {
    pub fn new(outdir: impl Into<PathBuf>) -> Self {
        Self {
            nodes: Vec::new(),
            delta_t: Duration::from_secs(10),
            control_dt: None,
            outdir: outdir.into(),
            prefix: "node_states".into(),
            view_onscreen: false,
            control_node: None,
            policy: Box::new(ThresholdPolicy::default()),
        }
    }

    /// Attach a node to observe. Order of attachment is the order nodes
    /// are sampled within a tick.
    pub fn attach(mut self, id: NodeId) -> Self {
        self.nodes.push(id);
        self
    }

    /// Set the sampling interval (`delta_t`).
    pub fn sample_every(mut self, delta_t: Duration) -> Self {
        self.delta_t = delta_t;
        self
    }

    /// Set the control interval (`control_dt`). Defaults to the sampling
    /// interval; must not be shorter than it.
    pub fn control_every(mut self, control_dt: Duration) -> Self {
        self.control_dt = Some(control_dt);
        self
    }

    /// Set the output file prefix; streams are named `<prefix>_<node>.csv`.
    pub fn file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Enable or disable per-tick console diagnostics.
    pub fn view_onscreen(mut self, view: bool) -> Self {
        self.view_onscreen = view;
        self
    }

    /// Designate the node the control action applies to.
    pub fn control_node(mut self, id: NodeId) -> Self {
        self.control_node = Some(id);
        self
    }

    /// Replace the control policy.
    pub fn control_policy(mut self, policy: Box<dyn ControlPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Validate the configuration against the topology and create the
    /// output streams (truncating existing files, headers written
    /// immediately).
    pub fn build(self, topology: &Topology) -> Result<Telemetry, TelemetryError> {
        let Self {
            nodes,
            delta_t,
            control_dt,
            outdir,
            prefix,
            view_onscreen,
            control_node,
            policy,
        } = self;

        if nodes.is_empty() {
            return Err(TelemetryError::NoNodesAttached);
        }
        for id in &nodes {
            if !topology.contains_node(id) {
                return Err(TelemetryError::UnknownNode { id: id.clone() });
            }
        }
        if let Some(id) = &control_node {
            if !nodes.contains(id) {
                return Err(TelemetryError::ControlNodeNotAttached { id: id.clone() });
            }
        }
        if delta_t.is_zero() {
            return Err(TelemetryError::ZeroSampleInterval);
        }
        let control_dt = control_dt.unwrap_or(delta_t);
        if control_dt < delta_t {
            return Err(TelemetryError::ControlIntervalTooShort {
                delta_t,
                control_dt,
            });
        }

        let writers = NodeWriters::create(&outdir, &prefix, &nodes)?;

        tracing::info!(outdir = %outdir.display(), "telemetry logging directory");
        tracing::info!(?nodes, "telemetry nodes attached");
        tracing::info!(?delta_t, ?control_dt, "telemetry sampling configured");

        Ok(Telemetry {
            nodes,
            delta_t,
            control_dt,
            view_onscreen,
            control_node,
            policy,
            writers,
            prev_arrivals: HashMap::new(),
            prev_arrival_bytes: HashMap::new(),
            prev_sent_len: HashMap::new(),
            last_control: None,
            samples: 0,
        })
    }
}

/// The periodic telemetry & control process.
///
/// Build one with [`TelemetryBuilder`] and hand it to
/// [`Simulation::spawn`]; it runs for the lifetime of the simulation and
/// reports its sample count and output locations when the simulation is
/// torn down.
///
/// [`Simulation::spawn`]: dtnsim_core::Simulation::spawn
pub struct Telemetry {
    nodes: Vec<NodeId>,
    delta_t: Duration,
    control_dt: Duration,
    view_onscreen: bool,
    control_node: Option<NodeId>,
    policy: Box<dyn ControlPolicy>,

    writers: NodeWriters,

    prev_arrivals: HashMap<NodeId, u64>,
    prev_arrival_bytes: HashMap<NodeId, u64>,
    prev_sent_len: HashMap<ConnectionId, usize>,
    last_control: Option<SimTime>,

    samples: u64,
}

impl Telemetry {
    /// Number of sampling ticks taken so far.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Departures on every connection originating at `nid` since the
    /// previous tick: count and byte volume.
    ///
    /// Only records appended since the last observed log length are read,
    /// so a record is never counted twice. A log observed shorter than
    /// before is clamped to a zero delta and flagged.
    fn departure_delta(&mut self, topology: &Topology, nid: &NodeId) -> (u64, u64) {
        let mut departures = 0u64;
        let mut bytes = 0u64;

        for (id, connection) in topology.connections() {
            if id.origin() != nid {
                continue;
            }

            let sent = connection.sent();
            let current = sent.len();
            let prev = self.prev_sent_len.get(id).copied().unwrap_or(0);

            if current < prev {
                tracing::warn!(
                    connection = %id,
                    current,
                    prev,
                    "sent log shorter than previously observed; delta clamped to 0",
                );
            } else {
                for record in &sent[prev..current] {
                    departures += 1;
                    bytes += record.data_volume();
                }
            }

            self.prev_sent_len.insert(id.clone(), current);
        }

        (departures, bytes)
    }

    /// Arrivals at `nid` since the previous tick: count and byte volume,
    /// from the node's cumulative counters.
    ///
    /// A counter observed below its previous value is clamped to a zero
    /// delta and flagged rather than reported as a negative rate.
    fn arrival_delta(&mut self, node: &Node, nid: &NodeId) -> (u64, u64) {
        let count = node.arrivals_count();
        let bytes = node.arrivals_bytes();

        let prev_count = self.prev_arrivals.entry(nid.clone()).or_insert(0);
        let arrivals = if count < *prev_count {
            tracing::warn!(
                node = %nid,
                count,
                prev = *prev_count,
                "cumulative arrival count decreased; delta clamped to 0",
            );
            0
        } else {
            count - *prev_count
        };
        *prev_count = count;

        let prev_bytes = self.prev_arrival_bytes.entry(nid.clone()).or_insert(0);
        let arrival_bytes = if bytes < *prev_bytes {
            tracing::warn!(
                node = %nid,
                bytes,
                prev = *prev_bytes,
                "cumulative arrival bytes decreased; delta clamped to 0",
            );
            0
        } else {
            bytes - *prev_bytes
        };
        *prev_bytes = bytes;

        (arrivals, arrival_bytes)
    }

    /// Evaluate and apply the control action, if one is due.
    ///
    /// The action is rate limited by `control_dt` independently of the
    /// sampling cadence: the first tick always acts, subsequent
    /// evaluations wait until at least `control_dt` has elapsed since the
    /// last action.
    fn apply_control(
        &mut self,
        topology: &mut Topology,
        nid: &NodeId,
        now: SimTime,
        radio_in_queue: usize,
    ) {
        let due = match self.last_control {
            None => true,
            Some(last) => now.elapsed_since(last) >= self.control_dt,
        };
        if !due {
            return;
        }

        let observation = ControlObservation { radio_in_queue };
        let rate = self.policy.decide(&observation);
        self.last_control = Some(now);

        match topology.node_mut(nid) {
            Ok(node) => match node.radios_mut() {
                Some(radios) => {
                    for (_, radio) in radios.iter_mut() {
                        radio.set_datarate(rate);
                    }
                    tracing::debug!(node = %nid, %rate, "control action applied");
                }
                None => tracing::warn!(
                    node = %nid,
                    "control node has no radio table; action skipped",
                ),
            },
            Err(error) => tracing::warn!(%error, "control node lookup failed; action skipped"),
        }
    }

    fn sample_node(
        &mut self,
        nid: &NodeId,
        now: SimTime,
        topology: &mut Topology,
    ) -> Result<(), TelemetryError> {
        let node = match topology.node(nid) {
            Ok(node) => node,
            Err(error) => {
                tracing::warn!(%error, "attached node missing from the topology; tick skipped");
                return Ok(());
            }
        };

        let totals = aggregate_queues(node);
        let radio_in_queue = radio_inbound_depth(node);
        let (arrivals, arrival_bytes) = self.arrival_delta(node, nid);
        let contacts = contact_vector(topology, nid);
        let (departures, departure_bytes) = self.departure_delta(topology, nid);

        if self.control_node.as_ref() == Some(nid) {
            self.apply_control(topology, nid, now, radio_in_queue);
        }

        let dt = self.delta_t.as_secs_f64();
        let contact_of = |class: DestinationClass| {
            contacts
                .get(&class.node_id())
                .copied()
                .unwrap_or(ContactState::Inactive)
        };

        let record = StateRecord {
            time: now.as_secs_f64(),
            queue_size_earth: totals.earth,
            queue_size_relay: totals.relay,
            queue_size_mars: totals.mars,
            radio_in_queue,
            node_in_queue: totals.in_queue,
            node_limbo_queue: totals.limbo,
            node_total_induct: totals.induct,
            node_total_outduct: totals.outduct,
            earth_conn: contact_of(DestinationClass::Earth),
            relay_conn: contact_of(DestinationClass::Relay),
            mars_conn: contact_of(DestinationClass::Mars),
            departure: departures,
            departure_rate: departures as f64 / dt,
            departure_in_bytes: departure_bytes,
            departure_rate_in_bps: departure_bytes as f64 / dt,
            arrivals,
            arrival_rate: arrivals as f64 / dt,
            arrival_in_bytes: arrival_bytes,
            arrival_rate_in_bps: arrival_bytes as f64 / dt,
        };

        if self.view_onscreen {
            tracing::info!(
                time = %now,
                node = %nid,
                earth = totals.earth,
                relay = totals.relay,
                mars = totals.mars,
                in_queue = totals.in_queue,
                limbo = totals.limbo,
                "queues",
            );
            tracing::info!(
                time = %now,
                node = %nid,
                departures,
                departure_bytes,
                arrivals,
                arrival_bytes,
                "flow",
            );
        }

        self.writers.append(nid, &record)
    }
}

impl Process for Telemetry {
    fn resume(&mut self, ctx: &mut SimContext<'_>) -> Resume {
        let now = ctx.now();

        for i in 0..self.nodes.len() {
            let nid = self.nodes[i].clone();
            if let Err(error) = self.sample_node(&nid, now, ctx.topology()) {
                tracing::warn!(%error, node = %nid, "failed to persist telemetry record");
            }
        }

        self.samples += 1;
        Resume::After(self.delta_t)
    }

    fn finalize(&mut self, _ctx: &mut SimContext<'_>) {
        tracing::info!(samples = self.samples, "telemetry finished");
        for nid in &self.nodes {
            if let Some(path) = self.writers.path(nid) {
                tracing::info!(node = %nid, path = %path.display(), "telemetry output");
            }
        }
    }
}
