//! The EARTH/RELAY/MARS scenario: two stochastic sources feed the
//! network while the telemetry loop samples every node and drives the
//! relay's radio rate.
//!
//! ```text
//! cargo run --example mars_relay -- --seed 42 --duration 1h --outdir states
//! ```

use clap::Parser;
use dtnsim::{
    Band, BernoulliGenerator, BundleShape, GeneratorConfig, GeneratorId, Interval, LivenessFlag,
    NodeId, PoissonGenerator, SensorGenerator, SimTime, Simulation, TelemetryBuilder, Topology,
};
use std::{path::PathBuf, time::Duration};

#[derive(Parser)]
struct Args {
    /// seed of the simulation's random number generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// how much virtual time to simulate
    #[arg(long, default_value = "1h")]
    duration: Interval,

    /// telemetry sampling interval
    #[arg(long, default_value = "10s")]
    sample_every: Interval,

    /// minimum spacing between control actions on the relay
    #[arg(long, default_value = "30s")]
    control_every: Interval,

    /// directory the per-node state files are written to
    #[arg(long, default_value = "states")]
    outdir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let args = Args::parse();

    let earth: NodeId = "EARTH".parse()?;
    let relay: NodeId = "RELAY".parse()?;
    let mars: NodeId = "MARS".parse()?;

    let mut topology = Topology::new();
    topology
        .new_node(earth.clone())
        .with_neighbor_queue(relay.clone())
        .with_neighbor_queue(mars.clone())
        .with_duct(relay.clone(), Band::X)
        .with_radio(Band::X, "2mbps".parse()?)
        .build()?;
    topology
        .new_node(relay.clone())
        .with_neighbor_queue(earth.clone())
        .with_neighbor_queue(mars.clone())
        .with_duct(earth.clone(), Band::X)
        .with_duct(mars.clone(), Band::Ka)
        .with_radio(Band::X, "2mbps".parse()?)
        .with_radio(Band::Ka, "2mbps".parse()?)
        .build()?;
    topology
        .new_node(mars.clone())
        .with_neighbor_queue(relay.clone())
        .with_duct(relay.clone(), Band::Ka)
        .with_radio(Band::Ka, "512kbps".parse()?)
        .build()?;

    for (a, b) in [(&earth, &relay), (&relay, &mars), (&earth, &mars)] {
        topology.connect(a, b)?;
        topology.connect(b, a)?;
    }

    let horizon = SimTime::new(args.duration.into_duration());

    // telemetry files hold science data shipped Earth -> Mars in bulk
    let science = BernoulliGenerator::new(
        0.3,
        1,
        4,
        GeneratorConfig {
            generator: GeneratorId::new(1),
            tstart: SimTime::ZERO,
            tend: horizon,
            shape: BundleShape {
                data_type: "science".into(),
                size: 50_000,
                ttl: Duration::from_secs(24 * 3_600),
                critical: false,
            },
            destination: Some(mars.clone()),
        },
        earth.clone(),
        &topology,
        LivenessFlag::new(),
    )?;

    // command traffic trickles back memorylessly, to anyone listening
    let commands = PoissonGenerator::new(
        0.2,
        GeneratorConfig {
            generator: GeneratorId::new(2),
            tstart: SimTime::ZERO,
            tend: horizon,
            shape: BundleShape {
                data_type: "command".into(),
                size: 2_000,
                ttl: Duration::from_secs(3_600),
                critical: true,
            },
            destination: None,
        },
        mars.clone(),
        &topology,
        LivenessFlag::new(),
    )?;

    // a surface sensor farm reporting once a second at best
    let sensors = SensorGenerator::new(
        12,
        0.4,
        GeneratorConfig {
            generator: GeneratorId::new(3),
            tstart: SimTime::from_secs(60),
            tend: horizon,
            shape: BundleShape {
                data_type: "sensor".into(),
                size: 800,
                ttl: Duration::from_secs(6 * 3_600),
                critical: false,
            },
            destination: Some(earth.clone()),
        },
        mars.clone(),
        &topology,
        LivenessFlag::new(),
    )?;

    tracing::info!(
        science = science.predicted_data_volume(),
        commands = commands.predicted_data_volume(),
        sensors = sensors.predicted_data_volume(),
        "predicted data volumes (bytes)",
    );

    let telemetry = TelemetryBuilder::new(&args.outdir)
        .attach(earth.clone())
        .attach(relay.clone())
        .attach(mars.clone())
        .sample_every(args.sample_every.into_duration())
        .control_every(args.control_every.into_duration())
        .control_node(relay.clone())
        .view_onscreen(true)
        .build(&topology)?;

    let mut sim = Simulation::new(topology);
    sim.set_seed(args.seed);
    sim.spawn(Box::new(science));
    sim.spawn(Box::new(commands));
    sim.spawn(Box::new(sensors));
    sim.spawn(Box::new(telemetry));

    sim.run_until(horizon);
    sim.finish();

    tracing::info!(now = %sim.now(), "simulation finished");
    Ok(())
}
