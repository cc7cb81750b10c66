use dtnsim_core::DataRate;

/// The control-relevant state observed on the designated node at the
/// moment a control action is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlObservation {
    /// summed inbound-queue depth across the node's radio interfaces
    pub radio_in_queue: usize,
}

/// A feedback policy mapping an observation to a transmission rate.
///
/// The telemetry loop evaluates the policy at most once per control
/// interval and applies the returned rate to every radio of the
/// designated node. Policies are strategy objects: swapping one in
/// changes the control behavior without touching the sampling or
/// aggregation code.
pub trait ControlPolicy {
    fn decide(&mut self, observation: &ControlObservation) -> DataRate;
}

/// Two-level threshold policy: a deep radio inbound queue selects the
/// high rate, otherwise the low rate.
///
/// A stand-in for a learned policy; the defaults reproduce the original
/// operating point of the relay control experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdPolicy {
    pub threshold: usize,
    pub low: DataRate,
    pub high: DataRate,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            threshold: 1_174,
            low: DataRate::new(1_500_000),
            high: DataRate::new(2_500_000),
        }
    }
}

impl ControlPolicy for ThresholdPolicy {
    fn decide(&mut self, observation: &ControlObservation) -> DataRate {
        if observation.radio_in_queue > self.threshold {
            self.high
        } else {
            self.low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_selects_rate() {
        let mut policy = ThresholdPolicy {
            threshold: 10,
            low: DataRate::new(1_000),
            high: DataRate::new(2_000),
        };

        assert_eq!(
            policy.decide(&ControlObservation { radio_in_queue: 10 }),
            DataRate::new(1_000)
        );
        assert_eq!(
            policy.decide(&ControlObservation { radio_in_queue: 11 }),
            DataRate::new(2_000)
        );
    }
}
