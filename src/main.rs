//! SchemaSense - Hybrid Field Sensitivity Classification
//!
//! Classifies database fields as PII, PHI or non-sensitive from the command
//! line, or serves the classification API over HTTP.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schemasense::{
    api::build_app,
    classification::{handler::ClassificationState, FieldDescriptor, RegulationScope},
    config::SchemaSenseConfig,
    engine::{ClassificationEngine, ClassificationRequest},
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "schemasense")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Hybrid PII/PHI field sensitivity classification")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "SCHEMASENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the fields listed in a JSON file and print the report
    Classify {
        /// Field list or full request (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Regulation scope: "auto" or a comma-separated list
        #[arg(short, long)]
        scope: Option<RegulationScope>,

        /// Classify locally without escalating to the AI service
        #[arg(long)]
        no_ai: bool,

        /// Escalation threshold override
        #[arg(long)]
        threshold: Option<f64>,

        /// Only classify these tables
        #[arg(long, value_delimiter = ',')]
        tables: Option<Vec<String>>,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },
}

/// Input file accepted by `classify`
#[derive(Deserialize)]
#[serde(untagged)]
enum ClassifyInput {
    Fields(Vec<FieldDescriptor>),
    Request(ClassificationRequest),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("schemasense={},tower_http=debug", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = match &cli.config {
        Some(path) => SchemaSenseConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SchemaSenseConfig::default(),
    };

    match cli.command {
        Commands::Classify {
            input,
            scope,
            no_ai,
            threshold,
            tables,
        } => {
            let mut request = read_request(&input)?;
            if scope.is_some() {
                request.regulation_scope = scope;
            }
            if no_ai {
                request.enable_ai = Some(false);
            }
            if threshold.is_some() {
                request.escalation_threshold = threshold;
            }
            if tables.is_some() {
                request.tables = tables;
            }
            run_classify(config, request).await?;
        }
        Commands::Serve { host, port } => {
            run_server(config, host, port).await?;
        }
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
    }

    Ok(())
}

fn read_request(path: &Path) -> Result<ClassificationRequest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let input: ClassifyInput = serde_json::from_str(&content)
        .with_context(|| format!("{} is neither a field list nor a request", path.display()))?;
    Ok(match input {
        ClassifyInput::Fields(fields) => ClassificationRequest::new(fields),
        ClassifyInput::Request(request) => request,
    })
}

async fn run_classify(config: SchemaSenseConfig, request: ClassificationRequest) -> Result<()> {
    let engine = ClassificationEngine::from_config(config).await?;
    let report = engine.classify(request).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_server(config: SchemaSenseConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let cors_origins = config.server.cors_origins.clone();

    let engine = Arc::new(ClassificationEngine::from_config(config).await?);
    let app = build_app(ClassificationState { engine }, &cors_origins);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    tracing::info!("SchemaSense API listening on {}:{}", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
        })
        .await?;

    Ok(())
}

fn show_config(config: Option<&SchemaSenseConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    println!("{}", config.to_toml()?);
    Ok(())
}
