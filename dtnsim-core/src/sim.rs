use crate::{
    bundle::{BundleId, BundleIdGenerator},
    event_queue::EventQueue,
    monitor::{Monitor, NullMonitor},
    process::{Process, ProcessId, Resume},
    time::SimTime,
    topology::Topology,
};
use rand::SeedableRng as _;
use rand_chacha::ChaChaRng;
use std::collections::HashMap;

/// This is the entry point for all activities with [`dtnsim_core`].
///
/// The [`Simulation`] owns the virtual clock, the schedule of pending
/// process wake-ups, the [`Topology`] the processes act on, the
/// centralised RNG and the [`Monitor`]. Processes are registered with
/// [`spawn`](Simulation::spawn) and driven with
/// [`run_until`](Simulation::run_until).
///
/// ## Scheduling model
///
/// Cooperative, single threaded: exactly one process resumes at a time
/// and the clock only advances between resumes. Same-instant wake-ups
/// resume in registration order — deterministic for reproducibility, but
/// no process may rely on that order for correctness.
///
/// [`dtnsim_core`]: crate
pub struct Simulation {
    now: SimTime,

    schedule: EventQueue<ProcessId>,
    processes: HashMap<ProcessId, Box<dyn Process>>,

    /// the last assigned process ID
    ///
    /// ID 0 is never handed out; process IDs start at 1.
    id: ProcessId,

    topology: Topology,

    bundle_ids: BundleIdGenerator,

    monitor: Box<dyn Monitor>,

    /// Centralised RNG for every random decision taken by a process:
    /// arrival trials, batch sizes, destination draws.
    ///
    /// A single source guarantees that the simulation is reproducible
    /// when seeded via [`Simulation::set_seed`].
    rng: ChaChaRng,
}

/// The borrow of the simulation state handed to a resuming [`Process`].
///
/// Everything a process may touch between two suspension points goes
/// through here: the current time, the topology, the RNG, the monitor
/// and the bundle identifier generator.
pub struct SimContext<'a> {
    now: SimTime,
    topology: &'a mut Topology,
    rng: &'a mut ChaChaRng,
    monitor: &'a mut dyn Monitor,
    bundle_ids: &'a BundleIdGenerator,
}

impl<'a> SimContext<'a> {
    /// The current virtual time.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    #[inline]
    pub fn topology(&mut self) -> &mut Topology {
        self.topology
    }

    #[inline]
    pub fn topology_ref(&self) -> &Topology {
        self.topology
    }

    #[inline]
    pub fn rng(&mut self) -> &mut ChaChaRng {
        self.rng
    }

    #[inline]
    pub fn monitor(&mut self) -> &mut dyn Monitor {
        self.monitor
    }

    /// Generate a fresh, unique [`BundleId`].
    #[inline]
    pub fn next_bundle_id(&self) -> BundleId {
        self.bundle_ids.generate()
    }

    /// Returns the shared [`BundleIdGenerator`].
    #[inline]
    pub fn bundle_ids(&self) -> &BundleIdGenerator {
        self.bundle_ids
    }
}

impl Simulation {
    /// Create a new simulation over the given topology.
    ///
    /// The clock starts at [`SimTime::ZERO`], the monitor discards all
    /// events and the RNG is seeded with `0`. Use
    /// [`set_seed`](Simulation::set_seed) and
    /// [`set_monitor`](Simulation::set_monitor) before spawning processes.
    pub fn new(topology: Topology) -> Self {
        Self {
            now: SimTime::ZERO,
            schedule: EventQueue::new(),
            processes: HashMap::new(),
            id: ProcessId::ZERO,
            topology,
            bundle_ids: BundleIdGenerator::new(),
            monitor: Box::new(NullMonitor),
            rng: ChaChaRng::seed_from_u64(0),
        }
    }

    /// Re-seed the simulation's random-number generator.
    ///
    /// Every random decision of every process is drawn from a single,
    /// centralised [`ChaChaRng`]. Calling `set_seed` before running a
    /// simulation produces a fully deterministic, reproducible run —
    /// useful for regression tests.
    ///
    /// The default seed is `0`.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = ChaChaRng::seed_from_u64(seed);
    }

    /// Replace the monitor receiving simulation events.
    pub fn set_monitor(&mut self, monitor: Box<dyn Monitor>) {
        self.monitor = monitor;
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    #[inline]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    #[inline]
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    /// Returns the shared [`BundleIdGenerator`] for this simulation.
    pub fn bundle_ids(&self) -> &BundleIdGenerator {
        &self.bundle_ids
    }

    /// Register a process and schedule its first resume at the process's
    /// [`start_time`](Process::start_time).
    ///
    /// Process IDs are assigned sequentially starting at `1`.
    pub fn spawn(&mut self, process: Box<dyn Process>) -> ProcessId {
        self.id = self.id.next();
        let pid = self.id;

        self.schedule.push(process.start_time(), pid);
        self.processes.insert(pid, process);

        pid
    }

    /// Number of processes still registered (suspended or runnable).
    pub fn live_processes(&self) -> usize {
        self.processes.len()
    }

    /// Drive the simulation until the clock reaches `horizon`.
    ///
    /// Processes scheduled strictly before `horizon` are resumed in due
    /// order; the clock then lands exactly on `horizon`. Wake-ups at or
    /// past the horizon stay scheduled, so the simulation can be advanced
    /// again with a later horizon.
    pub fn run_until(&mut self, horizon: SimTime) {
        while let Some(due) = self.schedule.next_due() {
            if due >= horizon {
                break;
            }
            let Some((due, pid)) = self.schedule.pop() else {
                break;
            };
            self.now = due;

            let Some(mut process) = self.processes.remove(&pid) else {
                continue;
            };

            let resume = {
                let mut ctx = SimContext {
                    now: self.now,
                    topology: &mut self.topology,
                    rng: &mut self.rng,
                    monitor: self.monitor.as_mut(),
                    bundle_ids: &self.bundle_ids,
                };
                process.resume(&mut ctx)
            };

            match resume {
                Resume::After(delay) => {
                    self.schedule.push(self.now + delay, pid);
                    self.processes.insert(pid, process);
                }
                Resume::Done => {}
            }
        }

        if horizon > self.now {
            self.now = horizon;
        }
    }

    /// Tear the simulation down: every process still registered gets its
    /// [`finalize`](Process::finalize) hook called, in spawn order, then
    /// all processes and pending wake-ups are dropped.
    pub fn finish(&mut self) {
        let mut processes: Vec<_> = std::mem::take(&mut self.processes).into_iter().collect();
        processes.sort_by_key(|(pid, _)| *pid);

        for (_, mut process) in processes {
            let mut ctx = SimContext {
                now: self.now,
                topology: &mut self.topology,
                rng: &mut self.rng,
                monitor: self.monitor.as_mut(),
                bundle_ids: &self.bundle_ids,
            };
            process.finalize(&mut ctx);
        }

        self.schedule = EventQueue::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// resumes every second, records the instants it saw, stops after
    /// `ticks` resumes.
    struct Ticker {
        seen: std::sync::Arc<std::sync::Mutex<Vec<SimTime>>>,
        ticks: usize,
        start: SimTime,
    }

    impl Process for Ticker {
        fn start_time(&self) -> SimTime {
            self.start
        }

        fn resume(&mut self, ctx: &mut SimContext<'_>) -> Resume {
            self.seen.lock().unwrap().push(ctx.now());
            self.ticks -= 1;
            if self.ticks == 0 {
                Resume::Done
            } else {
                Resume::After(Duration::from_secs(1))
            }
        }
    }

    fn shared() -> std::sync::Arc<std::sync::Mutex<Vec<SimTime>>> {
        Default::default()
    }

    #[test]
    fn clock_advances_with_resumes() {
        let seen = shared();
        let mut sim = Simulation::new(Topology::new());
        sim.spawn(Box::new(Ticker {
            seen: seen.clone(),
            ticks: 3,
            start: SimTime::from_secs(2),
        }));

        sim.run_until(SimTime::from_secs(10));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SimTime::from_secs(2),
                SimTime::from_secs(3),
                SimTime::from_secs(4)
            ]
        );
        assert_eq!(sim.now(), SimTime::from_secs(10));
        assert_eq!(sim.live_processes(), 0);
    }

    #[test]
    fn horizon_is_exclusive() {
        let seen = shared();
        let mut sim = Simulation::new(Topology::new());
        sim.spawn(Box::new(Ticker {
            seen: seen.clone(),
            ticks: 10,
            start: SimTime::ZERO,
        }));

        sim.run_until(SimTime::from_secs(3));

        // resumes at 0, 1, 2 — the wake-up at 3 stays scheduled
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(sim.live_processes(), 1);

        sim.run_until(SimTime::from_secs(4));
        assert_eq!(seen.lock().unwrap().len(), 4);
    }

    #[test]
    fn same_instant_resumes_in_spawn_order() {
        let seen = shared();
        let mut sim = Simulation::new(Topology::new());

        struct Tagged {
            seen: std::sync::Arc<std::sync::Mutex<Vec<SimTime>>>,
            tag: u64,
        }
        impl Process for Tagged {
            fn resume(&mut self, _ctx: &mut SimContext<'_>) -> Resume {
                self.seen
                    .lock()
                    .unwrap()
                    .push(SimTime::from_secs(self.tag));
                Resume::Done
            }
        }

        for tag in [1, 2, 3] {
            sim.spawn(Box::new(Tagged {
                seen: seen.clone(),
                tag,
            }));
        }

        sim.run_until(SimTime::from_secs(1));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SimTime::from_secs(1),
                SimTime::from_secs(2),
                SimTime::from_secs(3)
            ]
        );
    }

    #[test]
    fn reseed_reproduces_runs() {
        use rand::Rng as _;

        let mut sim = Simulation::new(Topology::new());
        sim.set_seed(42);
        let a: u64 = sim.rng.gen();
        sim.set_seed(42);
        let b: u64 = sim.rng.gen();
        assert_eq!(a, b);
    }
}
