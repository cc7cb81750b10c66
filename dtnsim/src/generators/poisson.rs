use super::{Emission, Emitter, GeneratorConfig, GeneratorError, LivenessFlag};
use dtnsim_core::{NodeId, Process, Resume, SimContext, SimTime, Topology};
use rand_distr::{Distribution as _, Exp};
use std::time::Duration;

/// Memoryless arrival process with exponential inter-arrival gaps.
///
/// Each gap is drawn independently from an exponential distribution with
/// rate `lambda_rate`; exactly one bundle is emitted per arrival. A rate
/// of zero is a valid configuration describing a silent source: the
/// process idles until the end of its window without ever sampling.
#[derive(Debug)]
pub struct PoissonGenerator {
    emitter: Emitter,

    lambda_rate: f64,
    /// `None` when `lambda_rate` is zero
    gaps: Option<Exp<f64>>,
    /// the first resume (at `tstart`) only draws the first gap; arrivals
    /// happen at the end of a gap, never at the window start itself
    primed: bool,
}

impl PoissonGenerator {
    pub fn new(
        lambda_rate: f64,
        config: GeneratorConfig,
        origin: NodeId,
        topology: &Topology,
        alive: LivenessFlag,
    ) -> Result<Self, GeneratorError> {
        if lambda_rate < 0.0 || !lambda_rate.is_finite() {
            return Err(GeneratorError::NegativeRate { rate: lambda_rate });
        }

        let gaps = if lambda_rate == 0.0 {
            None
        } else {
            Some(
                Exp::new(lambda_rate)
                    .map_err(|_| GeneratorError::NegativeRate { rate: lambda_rate })?,
            )
        };

        Ok(Self {
            emitter: Emitter::new(config, origin, topology, alive)?,
            lambda_rate,
            gaps,
            primed: false,
        })
    }

    /// Expected total bytes generated over the validity window:
    /// `lambda_rate` bundles per second, times the window length, times
    /// the bundle size.
    pub fn predicted_data_volume(&self) -> f64 {
        let config = self.emitter.config();
        self.lambda_rate * config.window().as_secs_f64() * config.shape.size as f64
    }

    /// Suspend until the next arrival, capped at the end of the window so
    /// the process terminates instead of sleeping past `tend`.
    fn next_gap(&self, ctx: &mut SimContext<'_>) -> Resume {
        let remaining = self.emitter.config().tend.elapsed_since(ctx.now());

        let Some(gaps) = &self.gaps else {
            return Resume::After(remaining);
        };

        let gap =
            Duration::try_from_secs_f64(gaps.sample(ctx.rng())).unwrap_or(Duration::MAX);
        Resume::After(gap.min(remaining))
    }
}

impl Process for PoissonGenerator {
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

        if self.primed {
            let destination = self.emitter.pick_destination(ctx.rng());
            if self.emitter.emit(ctx, &destination) == Emission::Halted {
                return Resume::Done;
            }
        } else {
            self.primed = true;
        }

        self.next_gap(ctx)
    }
}
