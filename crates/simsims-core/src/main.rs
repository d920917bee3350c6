//! simsims: runs a world until its last worker is gone.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use simsims_core::{default_config_toml, SimsimsConfig, StorageKind, World};
use simsims_events::{CycleSnapshot, ResourceKind};
use simsims_ledger::{render_chart, Ledger};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "simsims")]
#[command(about = "A self-balancing world of workers, food and products")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting workers
    #[arg(long)]
    workers: Option<usize>,

    /// Starting resources, split between food and products
    #[arg(long)]
    resources: Option<usize>,

    /// Pause between reshuffles, in milliseconds
    #[arg(long)]
    pace_ms: Option<u64>,

    /// Most activities running at once
    #[arg(long)]
    cap: Option<usize>,

    /// Capacity of every storage instance
    #[arg(long)]
    capacity: Option<usize>,

    /// Instance cap per activity kind
    #[arg(long)]
    max_instances: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many cycles
    #[arg(long)]
    max_cycles: Option<u64>,

    /// Append cycle rows to this JSONL file
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Write the final report into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Skip the chart at the end
    #[arg(long)]
    no_chart: bool,

    /// Start from the 1000 workers / 1000 resources / unpaced run
    #[arg(long)]
    reference: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Print the run summary as JSON at the end
    #[arg(long)]
    json_summary: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<SimsimsConfig, String> {
        let mut config = match (&self.config, self.reference) {
            (Some(path), _) => SimsimsConfig::from_file(path)
                .map_err(|e| format!("Could not load {}: {}", path.display(), e))?,
            (None, true) => SimsimsConfig::reference_run(),
            (None, false) => SimsimsConfig::default(),
        };

        if let Some(n) = self.workers {
            config.world.starting_workers = n;
        }
        if let Some(n) = self.resources {
            config.world.starting_resources = n;
        }
        if let Some(ms) = self.pace_ms {
            config.world.pacing_ms = ms;
        }
        if let Some(cap) = self.cap {
            config.dispatch.concurrency_cap = cap;
        }
        if let Some(capacity) = self.capacity {
            config.storage.capacity = capacity;
        }
        if let Some(max) = self.max_instances {
            config.activity.max_instances = max;
        }
        if self.seed.is_some() {
            config.world.seed = self.seed;
        }
        if self.max_cycles.is_some() {
            config.world.max_cycles = self.max_cycles;
        }
        if self.ledger.is_some() {
            config.output.ledger_path = self.ledger.clone();
        }
        if self.export_dir.is_some() {
            config.output.export_dir = self.export_dir.clone();
        }
        if self.no_chart {
            config.output.chart = false;
        }

        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

fn ledger(config: &SimsimsConfig) -> Result<Ledger, String> {
    let ledger = match &config.output.ledger_path {
        Some(path) => Ledger::jsonl(path)
            .map_err(|e| format!("Could not open ledger {}: {}", path.display(), e))?,
        None => Ledger::in_memory(),
    };
    Ok(match &config.output.export_dir {
        Some(dir) => ledger.with_export_dir(dir),
        None => ledger,
    })
}

fn print_cycle(snapshot: &CycleSnapshot) {
    println!("Result of cycle {}", snapshot.cycle);
    for kind in StorageKind::ALL {
        println!("  {:<10}{}", kind.label(), snapshot.count(kind.holds()));
    }
    let instances = |counts: &std::collections::BTreeMap<String, usize>| {
        counts
            .iter()
            .map(|(kind, n)| format!("{}: {}", kind, n))
            .collect::<Vec<_>>()
            .join(" ")
    };
    println!("  {}", instances(&snapshot.storage_instances));
    println!("  {}", instances(&snapshot.activity_instances));
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    if args.print_config {
        print!("{}", default_config_toml());
        return ExitCode::SUCCESS;
    }

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let recorder = match ledger(&config) {
        Ok(ledger) => ledger,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Simsims");
    println!("=======");
    println!("Workers: {}", config.world.starting_workers);
    println!("Resources: {}", config.world.starting_resources);
    println!("Concurrency cap: {}", config.dispatch.concurrency_cap);
    println!("Storage capacity: {}", config.storage.capacity);
    if let Some(seed) = config.world.seed {
        println!("Seed: {}", seed);
    }
    println!();

    let mut world = match World::settle(&config, Box::new(recorder)) {
        Ok(world) => world,
        Err(e) => {
            eprintln!("Could not settle the world: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let summary = match world.run_with(print_cycle).await {
        Ok(summary) => summary,
        Err(e) => {
            world.shutdown().await;
            eprintln!("The world failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if summary.extinct {
        println!("\nThe civilisation lasted {} cycles.", summary.cycles_survived);
    } else {
        println!(
            "\nStopped after {} cycles with {} workers left.",
            summary.cycles_survived,
            summary.final_snapshot.count(ResourceKind::Worker)
        );
    }

    let stats = world.dispatch_stats();
    println!(
        "Dispatched {} runs, at most {} at once, waited for a slot {} times",
        stats.dispatched, stats.peak_running, stats.saturation_waits
    );

    if config.output.chart {
        match world.recorder().all_rows() {
            Ok(rows) => println!("\n{}", render_chart(&rows, 72, 16)),
            Err(e) => eprintln!("Could not read recorded rows: {}", e),
        }
    }

    if args.json_summary {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Could not serialize summary: {}", e),
        }
    }

    ExitCode::SUCCESS
}
