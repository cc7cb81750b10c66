use super::{Emission, Emitter, GeneratorConfig, GeneratorError, LivenessFlag, TICK};
use dtnsim_core::{NodeId, Process, Resume, SimContext, SimTime, Topology};
use rand_distr::{Binomial, Distribution as _};

/// Slotted arrival process modelling a farm of independent sensors.
///
/// Every second each of the `num_sensors` sensors reports with
/// probability `p`, so the per-tick bundle count is binomially
/// distributed and never exceeds the sensor count.
#[derive(Debug)]
pub struct SensorGenerator {
    emitter: Emitter,

    num_sensors: u64,
    p: f64,
    reports: Binomial,
}

impl SensorGenerator {
    pub fn new(
        num_sensors: u64,
        p: f64,
        config: GeneratorConfig,
        origin: NodeId,
        topology: &Topology,
        alive: LivenessFlag,
    ) -> Result<Self, GeneratorError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(GeneratorError::InvalidProbability { p });
        }

        let reports =
            Binomial::new(num_sensors, p).map_err(|_| GeneratorError::InvalidProbability { p })?;

        Ok(Self {
            emitter: Emitter::new(config, origin, topology, alive)?,
            num_sensors,
            p,
            reports,
        })
    }

    /// Expected total bytes generated over the validity window:
    /// `num_sensors * p` bundles per second, times the window length,
    /// times the bundle size.
    pub fn predicted_data_volume(&self) -> f64 {
        let config = self.emitter.config();
        let expected_per_sec = self.num_sensors as f64 * self.p;
        expected_per_sec * config.window().as_secs_f64() * config.shape.size as f64
    }
}

impl Process for SensorGenerator {
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

        let reporting = self.reports.sample(ctx.rng());
        if reporting > 0 {
            let destination = self.emitter.pick_destination(ctx.rng());

            for _ in 0..reporting {
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
    use std::collections::HashMap;

    fn generator(
        num_sensors: u64,
        p: f64,
        cfg: GeneratorConfig,
        topology: &Topology,
    ) -> SensorGenerator {
        SensorGenerator::new(
            num_sensors,
            p,
            cfg,
            "EARTH".parse().unwrap(),
            topology,
            LivenessFlag::new(),
        )
        .unwrap()
    }

    #[test]
    fn probability_validated() {
        let topology = three_node_topology();
        let result = SensorGenerator::new(
            10,
            -0.1,
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

    #[test]
    fn per_tick_count_bounded_by_sensor_count() {
        let num_sensors = 8u64;
        let ticks = 5_000u64;
        let topology = three_node_topology();
        let mut cfg = config();
        cfg.tend = SimTime::from_secs(ticks);

        let generator = generator(num_sensors, 0.7, cfg, &topology);
        let created = run_generator(
            topology,
            Box::new(generator),
            SimTime::from_secs(ticks + 1),
        );

        let mut per_tick: HashMap<u64, u64> = HashMap::new();
        for (t, _) in &created {
            *per_tick.entry(t.as_duration().as_secs()).or_default() += 1;
        }

        assert!(per_tick.values().all(|count| *count <= num_sensors));

        // mean per tick converges to num_sensors * p = 5.6
        let mean = created.len() as f64 / ticks as f64;
        assert!(
            (mean - 5.6).abs() < 0.15,
            "mean per-tick count {mean} too far from 5.6"
        );
    }

    #[test]
    fn window_contains_all_arrivals() {
        let topology = three_node_topology();
        let mut cfg = config();
        cfg.tstart = SimTime::from_secs(3);
        cfg.tend = SimTime::from_secs(7);

        let generator = generator(5, 1.0, cfg, &topology);
        let created = run_generator(topology, Box::new(generator), SimTime::from_secs(30));

        // p=1: every sensor reports on every tick of the window
        assert_eq!(created.len(), 4 * 5);
        assert!(created
            .iter()
            .all(|(t, _)| *t >= SimTime::from_secs(3) && *t < SimTime::from_secs(7)));
    }

    #[test]
    fn predicted_volume() {
        let topology = three_node_topology();
        let mut cfg = config();
        cfg.tend = SimTime::from_secs(60);
        cfg.shape.size = 100;

        let generator = generator(10, 0.2, cfg, &topology);

        // 10 * 0.2 bundles/s * 60 s * 100 bytes
        assert_eq!(generator.predicted_data_volume(), 12_000.0);
    }
}
