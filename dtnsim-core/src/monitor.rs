use crate::{bundle::Bundle, time::SimTime};

/// Structured event-emission contract for observers of the simulation.
///
/// Generators report every bundle they create here *before* the liveness
/// check that gates forwarding — a bundle can therefore be observed as
/// created without ever entering the network. The core logic only emits
/// events; whether they end up on a screen, in a file or in a counter is
/// the monitor's business.
pub trait Monitor {
    /// A generator created `bundle` at virtual instant `at`.
    fn bundle_created(&mut self, at: SimTime, bundle: &Bundle) {
        let _ = (at, bundle);
    }
}

/// A [`Monitor`] that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMonitor;

impl Monitor for NullMonitor {}
