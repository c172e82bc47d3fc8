use std::path::Path;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use protograph::cli::{Cli, Command};
use protograph::config::Config;
use protograph::sink::{HttpSink, JsonLinesSink};
use protograph::{Pipeline, RecordStream, Schema};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // stdout carries the mutation output, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    debug!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;
    info!("protograph starting");
    debug!(?config, "Configuration loaded");

    match cli.command {
        Command::Convert {
            schema,
            input,
            label,
            server,
            timeout_ms,
            buffer,
        } => {
            let mut config = config;
            if let Some(server) = server {
                config.sink.server = Some(server);
            }
            if let Some(timeout_ms) = timeout_ms {
                config.sink.timeout_ms = timeout_ms;
            }
            if let Some(buffer) = buffer {
                config.buffer_capacity = buffer;
            }
            cmd_convert(&config, &schema, &input, label).await
        }
        Command::Validate { schema } => cmd_validate(&schema),
    }
}

async fn cmd_convert(config: &Config, schema_path: &Path, input: &Path, label: Option<String>) -> Result<()> {
    debug!(schema = %schema_path.display(), input = %input.display(), ?label, "cmd_convert: called");
    let schema = Schema::load(schema_path).context("Failed to load schema")?;
    let stream = RecordStream::open(input, config.buffer_capacity)
        .await
        .context("Failed to open input")?;

    let pipeline = Pipeline::new(&schema)
        .with_label(label)
        .with_progress_interval(config.progress_interval);

    let stats = match &config.sink.server {
        Some(url) => {
            let mut sink = HttpSink::new(url.as_str(), config.sink.timeout()).context("Failed to create HTTP client")?;
            pipeline.run(stream, &mut sink).await?
        }
        None => {
            let mut sink = JsonLinesSink::new(tokio::io::BufWriter::new(tokio::io::stdout()));
            pipeline.run(stream, &mut sink).await?
        }
    };

    eprintln!(
        "{} {} records → {} groups ({} malformed, {} rejected, {} fields skipped)",
        "✓".green(),
        stats.records,
        stats.groups.to_string().cyan(),
        stats.malformed,
        stats.rejected.to_string().yellow(),
        stats.skipped_fields
    );
    Ok(())
}

fn cmd_validate(schema_path: &Path) -> Result<()> {
    debug!(schema = %schema_path.display(), "cmd_validate: called");
    let schema = Schema::load(schema_path).context("Failed to load schema")?;

    println!("{} {} rules", "✓".green(), schema.len());
    for label in schema.labels() {
        println!("  {}", label.cyan());
    }

    let warnings = schema.validate();
    for warning in &warnings {
        println!("{} {}", "!".yellow(), warning);
    }
    Ok(())
}
