//! Command-line driver for clonal growth runs.

mod telemetry;

use std::fs;

use anyhow::{bail, Context, Result};
use clonesim_core::{palette, stats, SimulationConfig, Snapshot};
use clonesim_engine::simulation::RunSummary;
use clonesim_engine::Simulation;
use serde::Serialize;
use tracing::info;

/// Everything one run produces, encoded as a single JSON document.
#[derive(Debug, Serialize)]
struct Report {
    summary: RunSummary,
    snapshot: Snapshot,
    /// One rgb triple per registry entry, aligned with `snapshot.species`
    colors: Vec<[f64; 3]>,
    statistics: ReportStatistics,
}

#[derive(Debug, Serialize)]
struct ReportStatistics {
    average_mutation_count: f64,
    mean_pairwise_jaccard: f64,
}

fn main() -> Result<()> {
    telemetry::init_telemetry()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage();
        return Ok(());
    }
    if args.len() > 2 {
        print_usage();
        bail!("expected at most a config path and a report path");
    }

    let config = match args.first() {
        Some(path) => load_config(path)?,
        None => SimulationConfig::default(),
    };
    let seed = config.seed;

    let mut simulation = Simulation::new(config).context("building the simulation")?;
    let summary = simulation.run().context("running the simulation")?;
    let snapshot = simulation.snapshot();

    let colors = palette::color_scheme(&snapshot.species, seed);
    let statistics = ReportStatistics {
        average_mutation_count: stats::average_mutation_count(&snapshot),
        mean_pairwise_jaccard: stats::mean_pairwise_jaccard(
            &snapshot,
            stats::DEFAULT_SAMPLE_PAIRS,
            seed,
        ),
    };

    info!(
        population = summary.population,
        species = summary.species_total,
        drivers = snapshot.drivers.len(),
        simulated_time = summary.elapsed_time,
        average_mutation_count = statistics.average_mutation_count,
        mean_pairwise_jaccard = statistics.mean_pairwise_jaccard,
        "encoding report"
    );

    let report = Report {
        summary,
        snapshot,
        colors,
        statistics,
    };
    let encoded = serde_json::to_string_pretty(&report).context("encoding the report")?;

    match args.get(1) {
        Some(path) => {
            fs::write(path, encoded).with_context(|| format!("writing report to {}", path))?;
            info!(path = %path, "report written");
        }
        None => println!("{}", encoded),
    }

    Ok(())
}

fn load_config(path: &str) -> Result<SimulationConfig> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading config from {}", path))?;
    let config: SimulationConfig =
        serde_json::from_str(&text).with_context(|| format!("parsing config from {}", path))?;
    Ok(config)
}

fn print_usage() {
    println!("Usage: clonesim [CONFIG_JSON] [REPORT_JSON]");
    println!();
    println!("Grows a spatial clonal population and reports the final state.");
    println!("CONFIG_JSON holds a SimulationConfig document; defaults are used");
    println!("when it is omitted. The JSON report goes to REPORT_JSON, or to");
    println!("stdout when no path is given.");
}
