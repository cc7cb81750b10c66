mod id;

pub use self::id::NodeId;
use crate::{bundle::Bundle, datarate::DataRate};
use anyhow::bail;
use std::{collections::HashMap, fmt, str};

/// A transmission band pairing a node to a neighbor.
///
/// Ducts and radios are keyed by band: a node may run an X-band and a
/// Ka-band radio toward the same neighbor, each with its own queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Band {
    X,
    Ka,
    Optical,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => "x".fmt(f),
            Self::Ka => "ka".fmt(f),
            Self::Optical => "optical".fmt(f),
        }
    }
}

impl str::FromStr for Band {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "x" => Ok(Self::X),
            "ka" => Ok(Self::Ka),
            "optical" => Ok(Self::Optical),
            other => bail!("Unknown band: {other:?} (expecting x, ka or optical)"),
        }
    }
}

/// An ordered store of [`Bundle`]s with a countable depth.
///
/// Backs every queueing point of the node model: per-neighbor outbound
/// queues, the inbound staging queue, the limbo queue, duct stores and
/// radio inbound queues.
#[derive(Debug, Default)]
pub struct BundleQueue {
    stored: Vec<Bundle>,
}

impl BundleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bundle: Bundle) {
        self.stored.push(bundle);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stored.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stored.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bundle> {
        self.stored.iter()
    }
}

/// The ingress/egress adapter pairing a node to a transmission band
/// toward a neighbor.
///
/// The induct stores bundles received on the band and not yet staged;
/// the outduct stores bundles queued for transmission.
#[derive(Debug, Default)]
pub struct DuctPair {
    induct: BundleQueue,
    outduct: BundleQueue,
}

impl DuctPair {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn induct(&self) -> &BundleQueue {
        &self.induct
    }

    #[inline]
    pub fn induct_mut(&mut self) -> &mut BundleQueue {
        &mut self.induct
    }

    #[inline]
    pub fn outduct(&self) -> &BundleQueue {
        &self.outduct
    }

    #[inline]
    pub fn outduct_mut(&mut self) -> &mut BundleQueue {
        &mut self.outduct
    }
}

/// The `(neighbor, band)` keyed table of a node's [`DuctPair`]s.
#[derive(Debug, Default)]
pub struct DuctTable {
    ducts: HashMap<(NodeId, Band), DuctPair>,
}

impl DuctTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, neighbor: NodeId, band: Band) {
        self.ducts.entry((neighbor, band)).or_default();
    }

    pub fn get(&self, neighbor: &NodeId, band: Band) -> Option<&DuctPair> {
        self.ducts.get(&(neighbor.clone(), band))
    }

    pub fn get_mut(&mut self, neighbor: &NodeId, band: Band) -> Option<&mut DuctPair> {
        self.ducts.get_mut(&(neighbor.clone(), band))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(NodeId, Band), &DuctPair)> {
        self.ducts.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ducts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ducts.is_empty()
    }
}

/// A radio interface of a node.
///
/// The inbound queue holds bundles received on the interface and not yet
/// processed. The data rate is the only field of the network model the
/// telemetry loop is allowed to write: the control action overwrites it.
#[derive(Debug)]
pub struct Radio {
    in_queue: BundleQueue,
    datarate: DataRate,
}

impl Radio {
    pub fn new(datarate: DataRate) -> Self {
        Self {
            in_queue: BundleQueue::new(),
            datarate,
        }
    }

    #[inline]
    pub fn in_queue(&self) -> &BundleQueue {
        &self.in_queue
    }

    #[inline]
    pub fn in_queue_mut(&mut self) -> &mut BundleQueue {
        &mut self.in_queue
    }

    #[inline]
    pub fn datarate(&self) -> DataRate {
        self.datarate
    }

    #[inline]
    pub fn set_datarate(&mut self, datarate: DataRate) {
        self.datarate = datarate;
    }
}

/// The [`Band`] keyed table of a node's [`Radio`]s.
#[derive(Debug, Default)]
pub struct RadioTable {
    radios: HashMap<Band, Radio>,
}

impl RadioTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, band: Band, radio: Radio) {
        self.radios.insert(band, radio);
    }

    pub fn get(&self, band: Band) -> Option<&Radio> {
        self.radios.get(&band)
    }

    pub fn get_mut(&mut self, band: Band) -> Option<&mut Radio> {
        self.radios.get_mut(&band)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Band, &Radio)> {
        self.radios.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Band, &mut Radio)> {
        self.radios.iter_mut()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.radios.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.radios.is_empty()
    }
}

/// A simulated DTN endpoint managed by the [`Topology`].
///
/// `Node` owns the queueing points the telemetry loop samples: one
/// outbound queue per neighbor, an inbound staging queue, a limbo queue
/// for bundles not yet assigned a next hop, and — optionally — a duct
/// table and a radio table. The optional tables are explicit "absent
/// capability" markers: a node without radios reports `None` rather than
/// pretending to have an empty table, and observers decide how to degrade.
///
/// You never construct a `Node` directly — use [`Topology::new_node`] to
/// get a [`NodeBuilder`] which registers the node under its identifier.
///
/// [`Topology`]: crate::topology::Topology
/// [`Topology::new_node`]: crate::topology::Topology::new_node
/// [`NodeBuilder`]: crate::topology::NodeBuilder
#[derive(Debug)]
pub struct Node {
    id: NodeId,

    /// outbound queues keyed by the neighbor they lead toward
    queues: HashMap<NodeId, BundleQueue>,
    /// bundles received from neighbors, pending processing
    in_queue: BundleQueue,
    /// bundles held pending a routing decision
    limbo: BundleQueue,

    ducts: Option<DuctTable>,
    radios: Option<RadioTable>,

    /// bundles that reached their destination here
    delivered: Vec<Bundle>,

    arrivals_count: u64,
    arrivals_bytes: u64,
}

impl Node {
    pub(crate) fn new(id: NodeId) -> Self {
        Self {
            id,
            queues: HashMap::new(),
            in_queue: BundleQueue::new(),
            limbo: BundleQueue::new(),
            ducts: None,
            radios: None,
            delivered: Vec::new(),
            arrivals_count: 0,
            arrivals_bytes: 0,
        }
    }

    /// Returns the identifier of this node.
    #[inline]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The forwarding entry point.
    ///
    /// Accounts the bundle in the cumulative arrival counters, then places
    /// it: the delivered set if this node is the destination, the outbound
    /// queue toward the destination if one exists, the limbo queue
    /// otherwise. Next-hop routing through intermediate neighbors is the
    /// router's job, not this model's.
    pub fn forward(&mut self, bundle: Bundle) {
        self.arrivals_count += 1;
        self.arrivals_bytes += bundle.size();

        if bundle.destination() == &self.id {
            self.delivered.push(bundle);
        } else if let Some(queue) = self.queues.get_mut(bundle.destination()) {
            queue.push(bundle);
        } else {
            tracing::trace!(
                node = %self.id,
                destination = %bundle.destination(),
                "no outbound queue toward destination, bundle held in limbo",
            );
            self.limbo.push(bundle);
        }
    }

    /// Place a bundle on the inbound staging queue.
    pub fn stage_inbound(&mut self, bundle: Bundle) {
        self.in_queue.push(bundle);
    }

    /// The per-neighbor outbound queues.
    pub fn queues(&self) -> impl Iterator<Item = (&NodeId, &BundleQueue)> {
        self.queues.iter()
    }

    pub fn queue_toward(&self, neighbor: &NodeId) -> Option<&BundleQueue> {
        self.queues.get(neighbor)
    }

    #[inline]
    pub fn in_queue(&self) -> &BundleQueue {
        &self.in_queue
    }

    #[inline]
    pub fn limbo_queue(&self) -> &BundleQueue {
        &self.limbo
    }

    /// The duct table, if this node has ducts at all.
    #[inline]
    pub fn ducts(&self) -> Option<&DuctTable> {
        self.ducts.as_ref()
    }

    #[inline]
    pub fn ducts_mut(&mut self) -> Option<&mut DuctTable> {
        self.ducts.as_mut()
    }

    /// The radio table, if this node has radios at all.
    #[inline]
    pub fn radios(&self) -> Option<&RadioTable> {
        self.radios.as_ref()
    }

    #[inline]
    pub fn radios_mut(&mut self) -> Option<&mut RadioTable> {
        self.radios.as_mut()
    }

    pub fn delivered(&self) -> &[Bundle] {
        &self.delivered
    }

    /// Cumulative count of bundles that arrived at this node.
    ///
    /// Monotonically non-decreasing for the lifetime of the node.
    #[inline]
    pub fn arrivals_count(&self) -> u64 {
        self.arrivals_count
    }

    /// Cumulative bytes of bundles that arrived at this node.
    ///
    /// Monotonically non-decreasing for the lifetime of the node.
    #[inline]
    pub fn arrivals_bytes(&self) -> u64 {
        self.arrivals_bytes
    }

    pub(crate) fn add_neighbor_queue(&mut self, neighbor: NodeId) {
        self.queues.entry(neighbor).or_default();
    }

    pub(crate) fn add_duct(&mut self, neighbor: NodeId, band: Band) {
        self.ducts
            .get_or_insert_with(DuctTable::new)
            .insert(neighbor, band);
    }

    pub(crate) fn add_radio(&mut self, band: Band, datarate: DataRate) {
        self.radios
            .get_or_insert_with(RadioTable::new)
            .insert(band, Radio::new(datarate));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{Bundle, BundleIdGenerator};

    fn node_id(id: &str) -> NodeId {
        NodeId::new(id).unwrap()
    }

    fn bundle(ids: &BundleIdGenerator, origin: &str, destination: &str) -> Bundle {
        Bundle::builder(ids)
            .origin(node_id(origin))
            .destination(node_id(destination))
            .size(100)
            .build()
            .unwrap()
    }

    #[test]
    fn forward_counts_arrivals() {
        let ids = BundleIdGenerator::new();
        let mut node = Node::new(node_id("RELAY"));
        node.add_neighbor_queue(node_id("MARS"));

        node.forward(bundle(&ids, "EARTH", "MARS"));
        node.forward(bundle(&ids, "EARTH", "MARS"));

        assert_eq!(node.arrivals_count(), 2);
        assert_eq!(node.arrivals_bytes(), 200);
        assert_eq!(node.queue_toward(&node_id("MARS")).unwrap().len(), 2);
        assert!(node.limbo_queue().is_empty());
    }

    #[test]
    fn forward_delivers_to_self() {
        let ids = BundleIdGenerator::new();
        let mut node = Node::new(node_id("MARS"));

        node.forward(bundle(&ids, "EARTH", "MARS"));

        assert_eq!(node.delivered().len(), 1);
        assert_eq!(node.arrivals_count(), 1);
    }

    #[test]
    fn forward_without_queue_goes_to_limbo() {
        let ids = BundleIdGenerator::new();
        let mut node = Node::new(node_id("RELAY"));

        node.forward(bundle(&ids, "EARTH", "MARS"));

        assert_eq!(node.limbo_queue().len(), 1);
        assert_eq!(node.arrivals_count(), 1);
    }

    #[test]
    fn absent_tables_report_none() {
        let node = Node::new(node_id("EARTH"));
        assert!(node.ducts().is_none());
        assert!(node.radios().is_none());
    }

    #[test]
    fn parse_band() {
        assert_eq!("x".parse::<Band>().unwrap(), Band::X);
        assert_eq!("ka".parse::<Band>().unwrap(), Band::Ka);
        assert_eq!("optical".parse::<Band>().unwrap(), Band::Optical);
        assert!("s".parse::<Band>().is_err());
    }
}
