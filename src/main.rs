use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use glb_lite::problems::{QueensBag, TreeBag};
use glb_lite::{Configuration, GlbRuntime};

#[derive(Parser, Debug)]
#[command(name = "glb-lite")]
#[command(version)]
#[command(about = "A lifeline-based global load balancer demo driver")]
struct Args {
    /// Demo problem to run
    #[arg(long, value_enum, default_value_t = Problem::Queens)]
    problem: Problem,

    /// Board size for queens (n x n)
    #[arg(long, default_value = "12")]
    size: u8,

    /// Branching factor for the synthetic tree
    #[arg(long, default_value = "8")]
    branching: u8,

    /// Height of the synthetic tree
    #[arg(long, default_value = "7")]
    height: u8,

    /// Simulated host count (overrides GLB_PLACES)
    #[arg(long)]
    places: Option<usize>,

    /// Workers per place (overrides GLB_WORKERS)
    #[arg(long)]
    workers: Option<usize>,

    /// Chunk size per process call (overrides GLB_WORK_UNIT_SIZE)
    #[arg(long)]
    chunk: Option<usize>,

    /// Random-steal attempts before lifelines (overrides GLB_RANDOM_STEALS)
    #[arg(long)]
    random_steals: Option<usize>,

    /// Lifeline topology: hypercube or ring (overrides GLB_LIFELINES)
    #[arg(long)]
    lifelines: Option<String>,

    /// Run a throwaway warmup computation first
    #[arg(long)]
    warmup: bool,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Problem {
    Queens,
    Tree,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Configuration::from_env()?;
    if let Some(places) = args.places {
        config = config.with_places(places);
    }
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(chunk) = args.chunk {
        config = config.with_work_unit_size(chunk);
    }
    if let Some(attempts) = args.random_steals {
        config = config.with_max_random_steals(attempts);
    }
    if let Some(name) = &args.lifelines {
        config = config.with_lifeline_strategy(name.parse()?);
    }

    let mut runtime = GlbRuntime::with_config(config)?;
    tracing::info!(config = ?runtime.configuration(), "starting computation");

    match args.problem {
        Problem::Queens => {
            let n = args.size;
            if args.warmup {
                let warmup_n = n.saturating_sub(4).max(4);
                let log = runtime
                    .warmup(QueensBag::new(warmup_n), move || QueensBag::empty(warmup_n))
                    .await?;
                tracing::info!(warmup_compute_ms = log.compute.as_millis() as u64, "warmup done");
            }
            let result = runtime
                .compute(QueensBag::new(n), move || QueensBag::empty(n))
                .await?;
            match args.output {
                OutputFormat::Json => {
                    let report = serde_json::json!({
                        "problem": "queens",
                        "size": n,
                        "solutions": result.solutions,
                        "nodes": result.nodes,
                        "log": runtime.log(),
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Table => {
                    println!("{}-queens: {} solutions, {} nodes", n, result.solutions, result.nodes);
                    if let Some(log) = runtime.log() {
                        println!("{log}");
                    }
                }
            }
        }
        Problem::Tree => {
            let (b, h) = (args.branching, args.height);
            if args.warmup {
                let log = runtime
                    .warmup(TreeBag::new(b, h.min(4)), move || TreeBag::empty(b))
                    .await?;
                tracing::info!(warmup_compute_ms = log.compute.as_millis() as u64, "warmup done");
            }
            let result = runtime
                .compute(TreeBag::new(b, h), move || TreeBag::empty(b))
                .await?;
            match args.output {
                OutputFormat::Json => {
                    let report = serde_json::json!({
                        "problem": "tree",
                        "branching": b,
                        "height": h,
                        "nodes": result.nodes,
                        "leaves": result.leaves,
                        "log": runtime.log(),
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                OutputFormat::Table => {
                    println!(
                        "tree b={} h={}: {} nodes, {} leaves",
                        b, h, result.nodes, result.leaves
                    );
                    if let Some(log) = runtime.log() {
                        println!("{log}");
                    }
                }
            }
        }
    }

    Ok(())
}
