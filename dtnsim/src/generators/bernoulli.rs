use super::{Emission, Emitter, GeneratorConfig, GeneratorError, LivenessFlag, TICK};
use dtnsim_core::{NodeId, Process, Resume, SimContext, SimTime, Topology};
use rand::Rng as _;

/// Slotted arrival process with Bernoulli-gated uniform batches.
///
/// Every second a Bernoulli trial with success probability `p` decides
/// whether an arrival event happens; on success a batch of bundles, sized
/// uniformly in `[min_bundles, max_bundles]`, is emitted at that instant
/// toward a single destination drawn for the event.
#[derive(Debug)]
pub struct BernoulliGenerator {
    emitter: Emitter,

    p: f64,
    min_bundles: u32,
    max_bundles: u32,
}

impl BernoulliGenerator {
    pub fn new(
        p: f64,
        min_bundles: u32,
        max_bundles: u32,
        config: GeneratorConfig,
        origin: NodeId,
        topology: &Topology,
        alive: LivenessFlag,
    ) -> Result<Self, GeneratorError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(GeneratorError::InvalidProbability { p });
        }
        if min_bundles > max_bundles {
            return Err(GeneratorError::InvalidBatchBounds {
                min: min_bundles,
                max: max_bundles,
            });
        }

        Ok(Self {
            emitter: Emitter::new(config, origin, topology, alive)?,
            p,
            min_bundles,
            max_bundles,
        })
    }

    /// Expected total bytes generated over the validity window.
    ///
    /// `p * mean(min_bundles, max_bundles)` bundles per second, times the
    /// window length, times the bundle size.
    pub fn predicted_data_volume(&self) -> f64 {
        let config = self.emitter.config();
        let expected_per_sec = self.p * f64::from(self.min_bundles + self.max_bundles) / 2.0;
        expected_per_sec * config.window().as_secs_f64() * config.shape.size as f64
    }
}

impl Process for BernoulliGenerator {
    fn start_time(&self) -> SimTime {
        self.emitter.config().tstart
    }

    fn resume(&mut self, ctx: &mut SimContext<'_>) -> Resume {
        if !self.emitter.is_alive() {
            return Resume::Done;
        }
        if !self.emitter.window_open(ctx.now()) {
            return Resume::Done;
        }

        if ctx.rng().gen_bool(self.p) {
            let batch = ctx.rng().gen_range(self.min_bundles..=self.max_bundles);
            let destination = self.emitter.pick_destination(ctx.rng());

            for _ in 0..batch {
                if self.emitter.emit(ctx, &destination) == Emission::Halted {
                    return Resume::Done;
                }
            }
        }

        Resume::After(TICK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{config, run_generator, three_node_topology};
    use dtnsim_core::Simulation;

    fn generator(
        p: f64,
        min: u32,
        max: u32,
        cfg: GeneratorConfig,
        topology: &Topology,
        alive: LivenessFlag,
    ) -> BernoulliGenerator {
        BernoulliGenerator::new(p, min, max, cfg, "EARTH".parse().unwrap(), topology, alive)
            .unwrap()
    }

    #[test]
    fn batch_bounds_validated() {
        let topology = three_node_topology();
        let result = BernoulliGenerator::new(
            0.5,
            3,
            2,
            config(),
            "EARTH".parse().unwrap(),
            &topology,
            LivenessFlag::new(),
        );
        assert!(matches!(
            result,
            Err(GeneratorError::InvalidBatchBounds { min: 3, max: 2 })
        ));
    }

    #[test]
    fn probability_validated() {
        let topology = three_node_topology();
        let result = BernoulliGenerator::new(
            1.5,
            1,
            2,
            config(),
            "EARTH".parse().unwrap(),
            &topology,
            LivenessFlag::new(),
        );
        assert!(matches!(
            result,
            Err(GeneratorError::InvalidProbability { .. })
        ));
    }

    /// p=1.0 and a fixed batch of 3 over [0, 5) must produce exactly 3
    /// bundles at each of the seconds 0..=4: 15 bundles, none later.
    #[test]
    fn deterministic_batches() {
        let topology = three_node_topology();
        let mut cfg = config();
        cfg.tend = SimTime::from_secs(5);

        let generator = generator(1.0, 3, 3, cfg, &topology, LivenessFlag::new());

        let created = run_generator(topology, Box::new(generator), SimTime::from_secs(60));
        assert_eq!(created.len(), 15);

        for second in 0..5u64 {
            let at = SimTime::from_secs(second);
            assert_eq!(created.iter().filter(|(t, _)| *t == at).count(), 3);
        }
        assert!(created.iter().all(|(t, _)| *t < SimTime::from_secs(5)));
    }

    #[test]
    fn empirical_rate_converges() {
        let ticks = 20_000u64;
        let topology = three_node_topology();
        let mut cfg = config();
        cfg.tend = SimTime::from_secs(ticks);

        let generator = generator(0.5, 1, 3, cfg, &topology, LivenessFlag::new());

        let created = run_generator(
            topology,
            Box::new(generator),
            SimTime::from_secs(ticks + 1),
        );

        // expectation: p * mean(min, max) = 0.5 * 2 = 1 bundle per second
        let rate = created.len() as f64 / ticks as f64;
        assert!(
            (rate - 1.0).abs() < 0.05,
            "empirical rate {rate} too far from 1.0"
        );
    }

    #[test]
    fn predicted_volume() {
        let topology = three_node_topology();
        let mut cfg = config();
        cfg.tend = SimTime::from_secs(100);
        cfg.shape.size = 500;

        let generator = generator(0.5, 1, 3, cfg, &topology, LivenessFlag::new());

        // 0.5 * 2 bundles/s * 100 s * 500 bytes
        assert_eq!(generator.predicted_data_volume(), 50_000.0);
    }

    #[test]
    fn liveness_cleared_stops_forwarding() {
        let topology = three_node_topology();
        let mut cfg = config();
        cfg.tend = SimTime::from_secs(100);

        let alive = LivenessFlag::new();
        let generator = generator(1.0, 1, 1, cfg, &topology, alive.clone());

        struct KillAt(LivenessFlag);
        impl Process for KillAt {
            fn start_time(&self) -> SimTime {
                SimTime::new(std::time::Duration::from_millis(2_500))
            }
            fn resume(&mut self, _ctx: &mut SimContext<'_>) -> Resume {
                self.0.kill();
                Resume::Done
            }
        }

        let mut sim = Simulation::new(topology);
        sim.set_seed(1);
        let monitor = crate::testing::RecordingMonitor::default();
        let created = monitor.created();
        sim.set_monitor(Box::new(monitor));
        sim.spawn(Box::new(generator));
        sim.spawn(Box::new(KillAt(alive)));
        sim.run_until(SimTime::from_secs(200));
        sim.finish();

        // arrivals at seconds 0, 1, 2 were forwarded; nothing after the
        // kill at t=2.5
        let earth: NodeId = "EARTH".parse().unwrap();
        let forwarded = sim.topology().node(&earth).unwrap().arrivals_count();
        assert_eq!(forwarded, 3);
        assert_eq!(created.lock().unwrap().len(), 3);
    }
}
