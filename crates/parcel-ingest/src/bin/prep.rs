//! parcel-prep: run the attachment pipeline from the command line.
//!
//! Results are printed as JSON, one document per invocation.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parcel_ingest::{AttachmentPipeline, PipelineConfig};

#[derive(Parser)]
#[command(name = "parcel-prep")]
#[command(author, version, about = "Prepare attachments for a language model")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract content, metadata and token counts
    Prepare {
        /// Files or directories to prepare
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,

        /// Content type hint applied to every path (e.g. text/csv)
        #[arg(short = 't', long = "type")]
        type_hint: Option<String>,
    },

    /// Print the detected content type of each path
    Detect {
        #[arg(required = true, num_args = 1..)]
        paths: Vec<PathBuf>,
    },

    /// Stage a raw payload (data URI or plain text) and prepare it
    Stage {
        /// Original file name of the payload
        #[arg(short, long)]
        name: String,

        /// Payload: a data URI, or literal content
        payload: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays valid JSON.
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors
    //   RUST_LOG    - standard env filter (default: "parcel_ingest=info,parcel_core=info")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "parcel_ingest=info,parcel_core=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("parcel-prep.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("Invalid configuration")?;
    let pipeline = AttachmentPipeline::new(config).context("Failed to build pipeline")?;

    let output = match cli.command {
        Commands::Prepare { paths, type_hint } => {
            let mut results = Vec::with_capacity(paths.len());
            for path in &paths {
                let entry = match pipeline.prepare(path, type_hint.as_deref()).await {
                    Ok(result) => serde_json::to_value(result)?,
                    Err(e) => json!({ "path": path, "error": e.to_string() }),
                };
                results.push(entry);
            }
            serde_json::Value::Array(results)
        }
        Commands::Detect { paths } => {
            let mut detected = Vec::with_capacity(paths.len());
            for path in &paths {
                let file_type = pipeline.detect(path).await;
                detected.push(json!({
                    "path": path,
                    "type": file_type,
                    "extractor": pipeline.registry().resolve(&file_type).map(|k| k.name()),
                }));
            }
            serde_json::Value::Array(detected)
        }
        Commands::Stage { name, payload } => {
            let staged = pipeline
                .stage_raw_payload(&name, payload)
                .await
                .context("Failed to stage payload")?;
            info!(path = %staged.display(), "Payload staged");
            let result = pipeline.prepare(&staged, None).await?;
            json!({ "staged": staged, "result": result })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    let removed = pipeline.shutdown().await;
    info!(removed, "Staging area cleaned up");
    Ok(())
}
