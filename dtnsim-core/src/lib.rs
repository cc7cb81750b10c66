/*!
# Deterministic DTN simulation primitives

The building blocks a delay-tolerant-network simulation runs on: a
virtual clock and cooperative process scheduler ([`sim::Simulation`]),
the [`bundle::Bundle`] data unit, and the network model ([`node::Node`],
[`connection::Connection`], [`topology::Topology`]) that traffic
generators and telemetry observers act upon.

*/

pub mod bundle;
pub mod connection;
mod datarate;
mod event_queue;
pub mod monitor;
pub mod node;
mod process;
pub mod sim;
mod time;
pub mod topology;

pub use self::{
    bundle::{Bundle, BundleBuilder, BundleId, BundleIdGenerator, GeneratorId},
    connection::{Connection, ConnectionId, SentRecord},
    datarate::DataRate,
    event_queue::EventQueue,
    monitor::{Monitor, NullMonitor},
    node::{Band, BundleQueue, Node, NodeId},
    process::{Process, ProcessId, Resume},
    sim::{SimContext, Simulation},
    time::{Interval, SimTime},
    topology::{Topology, TopologyError},
};
