use crate::{
    connection::{Connection, ConnectionId},
    datarate::DataRate,
    node::{Band, Node, NodeId},
};
use std::collections::HashMap;
use thiserror::Error;

/// Error returned when a [`Topology`] lookup or mutation is rejected at
/// the boundary.
///
/// Unknown identifiers are always an error, never a silent default: the
/// lookup tables only answer for registered members.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// The node ID was not found in the topology.
    #[error("Node ({id}) Not Found")]
    NodeNotFound { id: NodeId },
    /// A node with this ID is already registered.
    #[error("Node ({id}) Already Registered")]
    DuplicateNode { id: NodeId },
    /// The connection was not found in the topology.
    #[error("Connection ({id}) Not Found")]
    ConnectionNotFound { id: ConnectionId },
    /// A connection between these endpoints, in this direction, already exists.
    #[error("Connection ({id}) Already Registered")]
    DuplicateConnection { id: ConnectionId },
}

/// The network the simulation runs over: nodes and the directed
/// connections between them.
///
/// Both tables are validated lookup tables keyed by typed identifiers.
/// Generators read the node set to pick destinations, hand bundles to a
/// node's forwarding entry point, and the telemetry loop samples node and
/// connection state read-only (except for the single control-action write
/// path on radio data rates).
///
/// # Example
///
/// ```
/// use dtnsim_core::{node::NodeId, topology::Topology};
///
/// let mut topology = Topology::new();
/// let earth: NodeId = "EARTH".parse().unwrap();
/// let relay: NodeId = "RELAY".parse().unwrap();
///
/// topology
///     .new_node(earth.clone())
///     .with_neighbor_queue(relay.clone())
///     .build()
///     .unwrap();
/// topology.new_node(relay.clone()).build().unwrap();
/// topology.connect(&earth, &relay).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct Topology {
    nodes: HashMap<NodeId, Node>,
    connections: HashMap<ConnectionId, Connection>,
}

/// Builder for configuring a new node before registering it with the
/// topology.
///
/// Obtained via [`Topology::new_node`]. Configure the node's queues,
/// ducts and radios with the setter methods, then call
/// [`build`](NodeBuilder::build) to register it.
pub struct NodeBuilder<'a> {
    node: Node,

    topology: &'a mut Topology,
}

impl<'a> NodeBuilder<'a> {
    /// Add an outbound queue toward `neighbor`.
    ///
    /// The neighbor does not need to be registered yet — topologies are
    /// commonly built node by node and wired with
    /// [`Topology::connect`] afterwards, which is where membership is
    /// enforced.
    pub fn with_neighbor_queue(mut self, neighbor: NodeId) -> Self {
        self.node.add_neighbor_queue(neighbor);
        self
    }

    /// Add an induct/outduct pair toward `neighbor` on `band`.
    pub fn with_duct(mut self, neighbor: NodeId, band: Band) -> Self {
        self.node.add_duct(neighbor, band);
        self
    }

    /// Add a radio interface on `band` with the given initial data rate.
    pub fn with_radio(mut self, band: Band, datarate: DataRate) -> Self {
        self.node.add_radio(band, datarate);
        self
    }

    /// Finalise the node configuration and register it with the topology.
    pub fn build(self) -> Result<(), TopologyError> {
        let Self { node, topology } = self;

        let id = node.id().clone();
        if topology.nodes.contains_key(&id) {
            return Err(TopologyError::DuplicateNode { id });
        }

        topology.nodes.insert(id, node);
        Ok(())
    }
}

impl Topology {
    /// Create a new, empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new node and return a builder to configure it.
    pub fn new_node(&mut self, id: NodeId) -> NodeBuilder<'_> {
        NodeBuilder {
            node: Node::new(id),
            topology: self,
        }
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &NodeId) -> Result<&Node, TopologyError> {
        self.nodes
            .get(id)
            .ok_or_else(|| TopologyError::NodeNotFound { id: id.clone() })
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node, TopologyError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| TopologyError::NodeNotFound { id: id.clone() })
    }

    /// All registered node identifiers, in unspecified order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Register the directed connection `origin -> destination`.
    ///
    /// Both endpoints must already be registered. Registering the same
    /// direction twice is an error; the opposite direction is a separate
    /// connection.
    pub fn connect(
        &mut self,
        origin: &NodeId,
        destination: &NodeId,
    ) -> Result<(), TopologyError> {
        if !self.contains_node(origin) {
            return Err(TopologyError::NodeNotFound { id: origin.clone() });
        }
        if !self.contains_node(destination) {
            return Err(TopologyError::NodeNotFound {
                id: destination.clone(),
            });
        }

        let id = ConnectionId::new(origin.clone(), destination.clone());
        if self.connections.contains_key(&id) {
            return Err(TopologyError::DuplicateConnection { id });
        }

        self.connections.insert(id, Connection::new());
        Ok(())
    }

    pub fn connection(&self, id: &ConnectionId) -> Result<&Connection, TopologyError> {
        self.connections
            .get(id)
            .ok_or_else(|| TopologyError::ConnectionNotFound { id: id.clone() })
    }

    pub fn connection_mut(&mut self, id: &ConnectionId) -> Result<&mut Connection, TopologyError> {
        self.connections
            .get_mut(id)
            .ok_or_else(|| TopologyError::ConnectionNotFound { id: id.clone() })
    }

    /// All registered connections, in unspecified order.
    pub fn connections(&self) -> impl Iterator<Item = (&ConnectionId, &Connection)> {
        self.connections.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeId {
        NodeId::new(id).unwrap()
    }

    fn three_nodes() -> Topology {
        let mut topology = Topology::new();
        for id in ["EARTH", "RELAY", "MARS"] {
            topology.new_node(node(id)).build().unwrap();
        }
        topology
    }

    #[test]
    fn register_and_lookup() {
        let topology = three_nodes();

        assert_eq!(topology.node_count(), 3);
        assert!(topology.contains_node(&node("EARTH")));
        assert!(topology.node(&node("RELAY")).is_ok());
        assert!(matches!(
            topology.node(&node("MOON")),
            Err(TopologyError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut topology = three_nodes();
        assert!(matches!(
            topology.new_node(node("EARTH")).build(),
            Err(TopologyError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn connect_validates_membership() {
        let mut topology = three_nodes();

        assert!(topology.connect(&node("EARTH"), &node("RELAY")).is_ok());
        assert!(matches!(
            topology.connect(&node("EARTH"), &node("MOON")),
            Err(TopologyError::NodeNotFound { .. })
        ));
        assert!(matches!(
            topology.connect(&node("EARTH"), &node("RELAY")),
            Err(TopologyError::DuplicateConnection { .. })
        ));
        // opposite direction is a distinct connection
        assert!(topology.connect(&node("RELAY"), &node("EARTH")).is_ok());
    }

    #[test]
    fn builder_configures_capabilities() {
        let mut topology = Topology::new();
        topology
            .new_node(node("RELAY"))
            .with_neighbor_queue(node("EARTH"))
            .with_neighbor_queue(node("MARS"))
            .with_duct(node("EARTH"), Band::X)
            .with_radio(Band::X, "2mbps".parse().unwrap())
            .build()
            .unwrap();

        let relay = topology.node(&node("RELAY")).unwrap();
        assert_eq!(relay.queues().count(), 2);
        assert_eq!(relay.ducts().unwrap().len(), 1);
        assert!(relay.radios().unwrap().get(Band::X).is_some());
    }
}
