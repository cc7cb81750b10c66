use crate::{node::NodeId, time::SimTime};
use anyhow::{bail, Result};
use std::{
    fmt,
    sync::{atomic::AtomicU64, Arc},
    time::Duration,
};

/// a generator for monotonically increasing **unique** [`BundleId`]
///
#[derive(Debug, Clone, Default)]
pub struct BundleIdGenerator(Arc<AtomicU64>);

/// # [`Bundle`] Identifier
///
/// During the lifetime of the bundle, this identifier can uniquely
/// identify the bundle.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BundleId(u64);

/// Identifier of the traffic generator a bundle originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GeneratorId(u64);

/// # The atomic unit of application data moved through the network
///
/// A [`Bundle`] is immutable once created: the generator that produced it
/// hands it to the owning node's forwarding entry point and never retains
/// it afterwards.
///
#[derive(Debug, Clone)]
pub struct Bundle {
    id: BundleId,
    origin: NodeId,
    destination: NodeId,
    data_type: String,
    size: u64,
    ttl: Duration,
    critical: bool,
    generator: GeneratorId,
    created: SimTime,
}

/// Builder for a [`Bundle`].
///
/// Obtained via [`Bundle::builder`]. The origin, destination and size are
/// mandatory; [`build`](BundleBuilder::build) fails if any is missing.
pub struct BundleBuilder<'a> {
    ids: &'a BundleIdGenerator,
    origin: Option<NodeId>,
    destination: Option<NodeId>,
    data_type: String,
    size: Option<u64>,
    ttl: Duration,
    critical: bool,
    generator: GeneratorId,
    created: SimTime,
}

impl BundleIdGenerator {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(1)))
    }

    /// generate a new unique identifier
    pub fn generate(&self) -> BundleId {
        let id = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        debug_assert!(
            id != 0,
            "The only case this can be equal to 0 is if the generator overflowed. If this \
            happens it means we have generated `u64::MAX` unique bundle identifiers and we \
            wrapped around on overflow. This shouldn't happen!"
        );

        BundleId(id)
    }
}

impl GeneratorId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for GeneratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'a> BundleBuilder<'a> {
    pub fn new(ids: &'a BundleIdGenerator) -> Self {
        Self {
            ids,
            origin: None,
            destination: None,
            data_type: String::new(),
            size: None,
            ttl: Duration::MAX,
            critical: false,
            generator: GeneratorId::new(0),
            created: SimTime::ZERO,
        }
    }

    pub fn origin(mut self, origin: NodeId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn destination(mut self, destination: NodeId) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = data_type.into();
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn generator(mut self, generator: GeneratorId) -> Self {
        self.generator = generator;
        self
    }

    pub fn created(mut self, created: SimTime) -> Self {
        self.created = created;
        self
    }

    pub fn build(self) -> Result<Bundle> {
        let Some(origin) = self.origin else {
            bail!("Cannot build a bundle without an origin node")
        };
        let Some(destination) = self.destination else {
            bail!("Cannot build a bundle without a destination node")
        };
        let Some(size) = self.size else {
            bail!("Cannot build a bundle without a size")
        };

        Ok(Bundle {
            id: self.ids.generate(),
            origin,
            destination,
            data_type: self.data_type,
            size,
            ttl: self.ttl,
            critical: self.critical,
            generator: self.generator,
            created: self.created,
        })
    }
}

impl Bundle {
    pub fn builder(ids: &BundleIdGenerator) -> BundleBuilder<'_> {
        BundleBuilder::new(ids)
    }

    #[inline]
    pub fn id(&self) -> BundleId {
        self.id
    }

    #[inline]
    pub fn origin(&self) -> &NodeId {
        &self.origin
    }

    #[inline]
    pub fn destination(&self) -> &NodeId {
        &self.destination
    }

    #[inline]
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    /// size of the bundle's payload in bytes
    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[inline]
    pub fn is_critical(&self) -> bool {
        self.critical
    }

    #[inline]
    pub fn generator(&self) -> GeneratorId {
        self.generator
    }

    /// the virtual instant this bundle was created at
    #[inline]
    pub fn created(&self) -> SimTime {
        self.created
    }
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bundle({id}) {origin}->{destination} ({size} bytes)",
            id = self.id,
            origin = self.origin,
            destination = self.destination,
            size = self.size,
        )
    }
}
