use demsim::{checkpoint, Scenario, ScenarioConfig};
use demsim::{bench_neighbor_search, FrameSink, NullSink, XyzWriter};

use clap::Parser;
use anyhow::{Context, Result};
use log::info;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
struct Args {
    #[arg(short, default_value = "cannonball.yaml")]
    file_name: String,

    /// Time direct vs grid neighbor search instead of running a scenario
    #[arg(long)]
    bench: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(file_name: &str) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(file_name);
    let file = File::open(&config_path).with_context(|| format!("cannot open {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)?;

    Ok(scenario_cfg)
}

fn trajectory_sink(enabled: bool, directory: &Path, name: &str) -> Result<Box<dyn FrameSink>> {
    if enabled {
        Ok(Box::new(XyzWriter::create(directory, name)?))
    } else {
        Ok(Box::new(NullSink))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.bench {
        bench_neighbor_search()?;
        return Ok(());
    }

    let scenario_cfg = load_scenario_from_yaml(&args.file_name)?;
    let output = scenario_cfg.output.clone();
    let out_dir = PathBuf::from(&output.directory);
    let scenario = Scenario::build_scenario(scenario_cfg)?;

    // Warm start from a stabilized bed when one was saved before
    let bed = match output.checkpoint.as_deref() {
        Some(name) if checkpoint::exists(&out_dir, name) => {
            info!("warm start from checkpoint {name}");
            checkpoint::load(&out_dir, name)?
        }
        name => {
            let bed = scenario.generate_bed()?;
            let mut sink = trajectory_sink(output.save_stabilization, &out_dir, "stabilization")?;
            let settled = scenario.stabilize(bed, sink.as_mut())?;
            info!("bed settled at t = {:.3} s ({})", settled.elapsed, settled.reason);
            if let Some(name) = name {
                checkpoint::save(&settled.particles, &out_dir, name)?;
            }
            settled.particles
        }
    };

    let mut sink = XyzWriter::create(&out_dir, "impact")?;
    let outcome = scenario.impact(bed, &mut sink)?;
    info!(
        "impact finished after {} steps at t = {:.3} s ({}), {} frames written",
        outcome.steps,
        outcome.elapsed,
        outcome.reason,
        sink.frames()
    );

    Ok(())
}
