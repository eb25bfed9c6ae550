use anyhow::Result;
use clap::{Parser, Subcommand};
use interaction_testgen::app::config::AnalysisConfig;
use interaction_testgen::app::engine::AnalysisEngine;
use interaction_testgen::cli;
use interaction_testgen::domain::synthesis::ScenarioTag;
use interaction_testgen::server::{http, mcp::TestgenMcpServer};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "itgen",
    version,
    about = "Infer component interactions from a parsed codebase and synthesize integration-test scenarios"
)]
struct Cli {
    /// Unit model JSON produced by the parsing front end
    model: PathBuf,

    /// Analysis config JSON (all fields optional)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum number of edges on a workflow path
    #[arg(long, global = true)]
    max_path_length: Option<usize>,

    /// Workflows retained per entry unit
    #[arg(long, global = true)]
    per_entry_cap: Option<usize>,

    /// Node expansions allowed per entry unit
    #[arg(long, global = true)]
    max_expansions: Option<usize>,

    /// Wall-clock bound per entry unit in milliseconds
    #[arg(long, global = true)]
    traversal_timeout_ms: Option<u64>,

    /// Error propagation iteration cap
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Minimum edge confidence for class interaction scenarios
    #[arg(long, global = true)]
    confidence_threshold: Option<f64>,

    /// Keep units recognised as existing test code
    #[arg(long, global = true)]
    include_tests: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize test scenarios and write them as JSON
    Generate {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only scenarios with this tag
        #[arg(long)]
        tag: Option<ScenarioTag>,
    },
    /// Print graph, workflow and scenario counts
    Summary,
    /// Print the interaction graph as JSON (debug)
    Graph,
    /// List retained workflows
    Workflows {
        #[arg(long)]
        entry: Option<String>,
    },
    /// Show error contracts
    Errors {
        #[arg(long)]
        unit: Option<String>,
    },
    /// List analysis diagnostics
    Diagnostics,
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        #[arg(long, default_value_t = 8787)]
        port: u16,
    },
    /// Serve MCP tools over stdio
    Mcp,
}

impl Cli {
    fn analysis_config(&self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::load(path)?,
            None => AnalysisConfig::default(),
        };
        if let Some(v) = self.max_path_length {
            config.max_path_length = v;
        }
        if let Some(v) = self.per_entry_cap {
            config.per_entry_cap = v;
        }
        if let Some(v) = self.max_expansions {
            config.max_expansions_per_entry = v;
        }
        if let Some(v) = self.traversal_timeout_ms {
            config.traversal_timeout_ms = Some(v);
        }
        if let Some(v) = self.max_iterations {
            config.max_fixed_point_iterations = v;
        }
        if let Some(v) = self.confidence_threshold {
            config.confidence_threshold = v;
        }
        if self.include_tests {
            config.include_tests = true;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries scenarios and the MCP stdio transport; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = args.analysis_config()?;
    let engine = AnalysisEngine::load(&args.model, config)?;

    match args.command {
        Commands::Generate { output, tag } => {
            cli::generate_scenarios(&engine, tag, output.as_deref())?;
        }
        Commands::Summary => cli::print_summary(&engine)?,
        Commands::Graph => cli::debug_graph(&engine)?,
        Commands::Workflows { entry } => cli::print_workflows(&engine, entry.as_deref())?,
        Commands::Errors { unit } => cli::print_error_contracts(&engine, unit.as_deref())?,
        Commands::Diagnostics => cli::print_diagnostics(&engine)?,
        Commands::Serve { host, port } => {
            http::serve(engine, SocketAddr::new(host, port)).await?;
        }
        Commands::Mcp => TestgenMcpServer::new(engine).serve_stdio().await?,
    }

    Ok(())
}
