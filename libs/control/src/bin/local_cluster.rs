//! Local cluster launcher - N ranks in one process over an in-memory transport
//!
//! Usage:
//!   local-cluster --size 4 --rounds 3 --ticks 5
//!   local-cluster --config config/cluster.toml --profile ci
//!   local-cluster --size 8 --staleness 2 --log-level debug

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cluster_config::{load_config, ClusterConfig};
use control::{ServerTable, StartupTables, Table, WorkerTable, Zoo, ZooOptions};
use network::{LocalNetwork, LocalTransport, Transport};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use types::Rank;

#[derive(Parser, Debug)]
#[command(name = "local-cluster")]
#[command(about = "Run a Tessera control-plane cluster inside one process")]
#[command(version)]
struct Args {
    /// Number of ranks
    #[arg(short, long, default_value_t = 4)]
    size: usize,

    /// Barrier rounds every rank runs
    #[arg(short, long, default_value_t = 3)]
    rounds: u32,

    /// Clock ticks every worker reports
    #[arg(short, long, default_value_t = 5)]
    ticks: u64,

    /// Clock staleness bound (overrides the configuration)
    #[arg(long)]
    staleness: Option<u64>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Profile override file under `profiles/` next to the configuration
    #[arg(long)]
    profile: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides the configuration
    #[arg(short, long)]
    log_level: Option<String>,
}

/// Placeholder table each host registers at start
struct DemoTable {
    name: String,
}

impl Table for DemoTable {
    fn name(&self) -> &str {
        &self.name
    }
}
impl WorkerTable for DemoTable {}
impl ServerTable for DemoTable {}

#[derive(Debug)]
struct RankSummary {
    rank: Rank,
    hosts: String,
    rounds: u32,
    ticks: u64,
    max_lead: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref(), args.profile.as_deref())
        .context("Failed to load cluster configuration")?;
    if let Some(staleness) = args.staleness {
        config.staleness = staleness;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.validate().context("Invalid cluster configuration")?;

    init_logging(&config.log_level)?;

    info!(
        size = args.size,
        rounds = args.rounds,
        ticks = args.ticks,
        staleness = config.staleness,
        "Starting local cluster"
    );

    let started_at = Instant::now();
    let transports = LocalNetwork::build(args.size).context("Failed to build local network")?;
    let config = Arc::new(config);

    let ranks: Vec<_> = transports
        .into_iter()
        .map(|transport| {
            let config = Arc::clone(&config);
            let rank = transport.rank();
            thread::Builder::new()
                .name(format!("rank-{}", rank))
                .spawn(move || run_rank(transport, &config, args.rounds, args.ticks))
                .with_context(|| format!("Failed to spawn thread for rank {}", rank))
        })
        .collect::<Result<_>>()?;

    let mut failures = 0;
    for (rank, handle) in ranks.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(summary)) => info!(
                rank = summary.rank,
                hosts = %summary.hosts,
                rounds = summary.rounds,
                ticks = summary.ticks,
                max_lead = summary.max_lead,
                "Rank finished"
            ),
            Ok(Err(e)) => {
                error!(rank, "Rank failed: {:#}", e);
                failures += 1;
            }
            Err(_) => {
                error!(rank, "Rank panicked");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(anyhow!("{} of {} ranks failed", failures, args.size));
    }
    info!(
        elapsed_ms = started_at.elapsed().as_millis() as u64,
        "Local cluster finished"
    );
    Ok(())
}

fn run_rank(
    transport: LocalTransport,
    config: &ClusterConfig,
    rounds: u32,
    ticks: u64,
) -> Result<RankSummary> {
    let rank = transport.rank();
    let options = ZooOptions::from_config(config, rank)
        .with_context(|| format!("No valid options for rank {}", rank))?;

    let mut tables = StartupTables::new();
    if options.role.is_worker() {
        tables = tables.with_worker(DemoTable {
            name: format!("demo-worker-{}", rank),
        });
    }
    if options.role.is_server() {
        tables = tables.with_server(DemoTable {
            name: format!("demo-server-{}", rank),
        });
    }

    let zoo = Zoo::start(options, Arc::new(transport), tables)
        .with_context(|| format!("Rank {} failed to join", rank))?;

    for round in 0..rounds {
        zoo.barrier()
            .with_context(|| format!("Rank {} failed in barrier round {}", rank, round))?;
    }

    let mut max_lead = 0;
    let mut reported = 0;
    if zoo.role().is_worker() {
        for tick in 1..=ticks {
            let grant = zoo
                .clock(tick)
                .with_context(|| format!("Rank {} failed at clock tick {}", rank, tick))?;
            max_lead = max_lead.max(grant.lead());
            reported = tick;
        }
    }

    let summary = RankSummary {
        rank,
        hosts: zoo.host_kind().to_string(),
        rounds,
        ticks: reported,
        max_lead,
    };
    zoo.stop()
        .with_context(|| format!("Rank {} failed to stop", rank))?;
    Ok(summary)
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}
