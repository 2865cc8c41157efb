use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use svcmap::config::AnalyzerConfig;
use svcmap::graph::{InMemoryGraphStore, LoadMode};
use svcmap::job::{CancelToken, JobHandle, JobStatus, LoggingTracker};
use svcmap::llm::OllamaClient;
use svcmap::pipeline::{AnalysisContext, PipelineController};
use svcmap::resolve::StaticServiceDirectory;
use svcmap::source::LocalSourceProvider;
use svcmap::VERSION;

#[derive(Debug, Parser)]
#[command(name = "svcmap", version, about = "Map service-to-service HTTP dependencies")]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Analyze a repository checkout and print the dependency graph
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    /// Path to the repository checkout
    path: PathBuf,

    /// Known service names for deterministic matching (comma separated)
    #[arg(long, value_delimiter = ',')]
    services: Vec<String>,

    /// Ollama endpoint for the inference fallback
    #[arg(long, default_value = "http://localhost:11434")]
    ollama_endpoint: String,

    /// Model used for the inference fallback
    #[arg(long, default_value = "qwen2.5:3b")]
    model: String,

    /// Clear all prior graph content before loading
    #[arg(long)]
    replace: bool,

    /// Emit the full result (job summary + graph) as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(&args);

    debug!("svcmap v{} starting", VERSION);

    let exit_code = match &args.command {
        Commands::Analyze(analyze_args) => match handle_analyze(analyze_args).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error: {e:#}");
                1
            }
        },
    };

    std::process::exit(exit_code);
}

fn init_logging(args: &CliArgs) {
    let level = if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("svcmap={level},reqwest=warn,hyper=warn"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn handle_analyze(args: &AnalyzeArgs) -> Result<i32> {
    let store = Arc::new(InMemoryGraphStore::new());
    let inference = Arc::new(OllamaClient::new(
        args.ollama_endpoint.clone(),
        args.model.clone(),
    ));

    let ctx = AnalysisContext::new(
        Arc::new(LocalSourceProvider::new(&args.path)),
        Arc::new(StaticServiceDirectory::new(args.services.clone())),
        inference,
        store.clone(),
        AnalyzerConfig::default(),
    )
    .with_load_mode(if args.replace {
        LoadMode::Replace
    } else {
        LoadMode::Merge
    });

    let job = JobHandle::new(Arc::new(LoggingTracker));
    let snapshot = PipelineController::new(ctx)
        .run(&job, &CancelToken::new())
        .await;

    if args.json {
        let output = serde_json::json!({
            "job": snapshot,
            "graph": store.export(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("serializing result")?
        );
    } else {
        println!("status:   {:?}", snapshot.status);
        println!("progress: {:.0}", snapshot.progress);
        let c = snapshot.counts;
        println!(
            "files:    {} parsed, {} skipped",
            c.files_parsed, c.files_skipped
        );
        println!(
            "calls:    {} found ({} unattributed)",
            c.calls_found, c.calls_unattributed
        );
        println!(
            "resolved: {} deterministic, {} inferred, {} unresolved",
            c.resolved_deterministic, c.resolved_inferred, c.unresolved
        );
        println!(
            "graph:    {} nodes, {} edges",
            c.nodes_written, c.edges_written
        );
        for warning in &snapshot.warnings {
            println!("warning:  {warning}");
        }
        if let Some(error) = &snapshot.error {
            println!("error:    {error}");
        }
    }

    Ok(match snapshot.status {
        JobStatus::Completed => 0,
        _ => 1,
    })
}
