// crates/framecli/src/main.rs

mod pipeline;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use framecore::{Kwargs, TreeEvent, Value};
use frameplugins::RecordStore;
use frameruntime::{FrameRuntime, PluginCatalog, PoolConfig, StageSpec, WorkArgs};
use pipeline::{parse_stage, Pipeline};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "frameflow")]
#[command(about = "Frame processing tree CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the tree comes from: a pipeline file or inline stages
#[derive(Args)]
struct TreeSource {
    /// Path to pipeline JSON file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Inline stage `type[:key=value,...]`; repeat to build a chain
    #[arg(short, long = "stage")]
    stages: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a tree over a range of frames on the worker pool
    Run {
        #[command(flatten)]
        source: TreeSource,

        /// Number of frames to process
        #[arg(short = 'n', long, default_value_t = 10)]
        frames: usize,

        /// Worker count (overrides the pool config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Path to pool config JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Stop after this many milliseconds and keep partial results
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Dispatch one item per root-to-leaf chain instead of per frame
        #[arg(long)]
        chains: bool,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Run a tree once, in process, printing node events
    Process {
        #[command(flatten)]
        source: TreeSource,

        /// Frame index fed to the root
        #[arg(long, default_value_t = 0)]
        frame: usize,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Build a tree and print its structure
    Validate {
        #[command(flatten)]
        source: TreeSource,
    },

    /// List available plugin types
    Plugins,

    /// Write an example pipeline and a default pool config
    Init {
        /// Pipeline output path
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,

        /// Pool config output path
        #[arg(long, default_value = "pool.json")]
        config: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            frames,
            workers,
            config,
            deadline_ms,
            chains,
            verbose,
        } => {
            init_tracing(verbose);

            let mut pool_config = match config {
                Some(path) => PoolConfig::from_json_file(path)?,
                None => PoolConfig::default(),
            };
            if let Some(workers) = workers {
                pool_config = pool_config.with_workers(workers);
            }
            if let Some(ms) = deadline_ms {
                pool_config = pool_config.with_drain_deadline(Duration::from_millis(ms));
            }

            run_pool(source, frames, pool_config, chains).await?;
        }

        Commands::Process {
            source,
            frame,
            verbose,
        } => {
            init_tracing(verbose);
            run_process(source, frame).await?;
        }

        Commands::Validate { source } => {
            validate_tree(source)?;
        }

        Commands::Plugins => {
            list_plugins();
        }

        Commands::Init { output, config } => {
            create_example(output, config)?;
        }
    }

    Ok(())
}

fn load_stages(source: &TreeSource) -> Result<Vec<StageSpec>> {
    let mut stages = match &source.file {
        Some(path) => {
            let pipeline = Pipeline::load(path)?;
            println!("📋 Pipeline: {}", pipeline.name);
            pipeline.stage_specs()
        }
        None => Vec::new(),
    };
    for arg in &source.stages {
        stages.push(parse_stage(arg)?);
    }
    if stages.is_empty() {
        bail!("no stages given; pass --file or at least one --stage");
    }
    Ok(stages)
}

fn build_runtime(config: PoolConfig) -> (FrameRuntime, RecordStore) {
    let mut catalog = PluginCatalog::new();
    let store = frameplugins::register_all(&mut catalog);
    (FrameRuntime::with_catalog(Arc::new(catalog), config), store)
}

async fn print_records(store: &RecordStore) {
    let records = store.snapshot().await;
    if records.is_empty() {
        return;
    }
    println!();
    println!("📤 Recorded values:");
    for record in records {
        let frame = record
            .frame
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("   [{}] frame {}: {:?}", record.label, frame, record.value);
    }
}

async fn run_pool(
    source: TreeSource,
    frames: usize,
    config: PoolConfig,
    chains: bool,
) -> Result<()> {
    let stages = load_stages(&source)?;
    let workers = config.workers;
    let (runtime, store) = build_runtime(config);
    let tree = Arc::new(runtime.build_tree(&stages)?);

    println!(
        "🚀 Running {} nodes over {} frames on {} workers",
        tree.len(),
        frames,
        workers
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("⏹️  Interrupted, stopping workers");
            ctrl_c.cancel();
        }
    });

    let runtime = Arc::new(runtime);
    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        if chains {
            let report = runtime.run_chains(tree, 0..frames, WorkArgs::new(), &cancel)?;
            for (item, output) in &report.results {
                tracing::debug!(
                    "chain {:?} frame {} -> {:?}",
                    item.chain,
                    item.frame,
                    output.result
                );
            }
            Ok((report.run_id, report.submitted, report.results.len(), report.workers))
        } else {
            let report = runtime.run_frames(tree, 0..frames, WorkArgs::new(), &cancel)?;
            Ok((report.run_id, report.submitted, report.results.len(), report.workers))
        }
    })
    .await??;

    let (run_id, submitted, completed, reports) = summary;
    println!();
    println!("📊 Run Summary:");
    println!("   Run ID: {}", run_id);
    println!("   Completed: {}/{} items", completed, submitted);
    for report in &reports {
        println!(
            "   Worker {}: {:?} after {} items",
            report.worker, report.status, report.processed
        );
    }

    print_records(&store).await;
    Ok(())
}

async fn run_process(source: TreeSource, frame: usize) -> Result<()> {
    let stages = load_stages(&source)?;
    let (runtime, store) = build_runtime(PoolConfig::default());
    let tree = runtime.build_tree(&stages)?;

    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                TreeEvent::ExecutionStarted { root_id, .. } => {
                    println!("▶️  Execution started at node {}", root_id);
                }
                TreeEvent::NodeStarted {
                    node_id,
                    plugin_type,
                    ..
                } => {
                    println!("  ⚡ Starting node: {} ({})", node_id, plugin_type);
                }
                TreeEvent::NodeCompleted {
                    node_id,
                    duration_ms,
                    ..
                } => {
                    println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
                }
                TreeEvent::NodeFailed { node_id, error, .. } => {
                    println!("  ❌ Node {} failed: {}", node_id, error);
                }
                TreeEvent::ExecutionCompleted {
                    success,
                    duration_ms,
                    ..
                } => {
                    if success {
                        println!("✨ Execution completed in {}ms", duration_ms);
                    } else {
                        println!("💥 Execution failed after {}ms", duration_ms);
                    }
                }
            }
        }
    });

    let mut kwargs = Kwargs::new();
    kwargs.insert("frame".to_string(), Value::from(frame));
    let result = tree.execute_process(Value::from(frame), kwargs).await;

    // Let the listener catch up before it is dropped
    tokio::time::sleep(Duration::from_millis(100)).await;
    event_task.abort();

    result?;
    print_records(&store).await;
    Ok(())
}

fn validate_tree(source: TreeSource) -> Result<()> {
    let stages = load_stages(&source)?;
    let (runtime, _) = build_runtime(PoolConfig::default());
    let tree = runtime.build_tree(&stages)?;

    println!("✅ Tree is valid: {} nodes, {} chains", tree.len(), tree.chains().len());
    println!("{}", serde_json::to_string_pretty(&tree.summary())?);
    Ok(())
}

fn list_plugins() {
    println!("📦 Available Plugin Types:");
    println!();

    let mut catalog = PluginCatalog::new();
    frameplugins::register_all(&mut catalog);

    for plugin_type in catalog.list_plugin_types() {
        if let Some(metadata) = catalog.get_metadata(&plugin_type) {
            println!("  • {} ({})", plugin_type, metadata.category);
            println!("    {}", metadata.description);
            for param in &metadata.parameters {
                let marker = if param.required { "required" } else { "optional" };
                println!("      - {} [{}]: {}", param.name, marker, param.description);
            }
        } else {
            println!("  • {}", plugin_type);
        }
    }
}

fn create_example(output: PathBuf, config: PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(&Pipeline::example())?;
    std::fs::write(&output, json)?;
    PoolConfig::default().to_json_file(&config)?;

    println!("✨ Created example pipeline: {}", output.display());
    println!("✨ Created pool config: {}", config.display());
    println!();
    println!("Run it with:");
    println!(
        "  frameflow run --file {} --config {} --frames 20",
        output.display(),
        config.display()
    );

    Ok(())
}
