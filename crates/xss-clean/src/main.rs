mod cli;
mod config;

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use xss_sanitizer::{
    loader, MarkupFilter, SanitizerConfig, StringSanitizer, StructuralMapper, TagPolicy,
};

use crate::cli::Cli;
use crate::config::{Config, LogFormat, MarkupEngine, Mode};

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Sanitize `input` according to the configured mode.
fn run(cfg: &Config, input: &[u8]) -> Result<Vec<u8>> {
    let config = SanitizerConfig::with_quote_escaping(cfg.sanitizer.escape_quotes);
    let sanitizer = StringSanitizer::new(config).context("failed to compile rule library")?;

    match cfg.sanitizer.mode {
        Mode::String => Ok(sanitizer.sanitize_bytes(input)),
        Mode::Json => {
            let value: serde_json::Value =
                serde_json::from_slice(input).context("input is not valid JSON")?;
            let clean = StructuralMapper::new(sanitizer)
                .sanitize(&value)
                .context("failed to sanitize JSON input")?;
            let mut out = serde_json::to_vec_pretty(&clean)?;
            out.push(b'\n');
            Ok(out)
        }
        Mode::Markup => {
            let policy = match &cfg.policy_file {
                Some(path) => Arc::new(
                    loader::load_policy(path).context("failed to load tag policy")?,
                ),
                None => TagPolicy::shared_default(),
            };
            let filter = MarkupFilter::new(sanitizer, policy)
                .context("failed to compile markup grammar")?;
            let filter = match cfg.sanitizer.markup_backend {
                MarkupEngine::Builtin => filter,
                MarkupEngine::Ammonia => with_ammonia(filter)?,
            };
            Ok(filter
                .sanitize(&String::from_utf8_lossy(input))
                .into_bytes())
        }
    }
}

#[cfg(feature = "ammonia")]
fn with_ammonia(filter: MarkupFilter) -> Result<MarkupFilter> {
    Ok(filter.with_backend(Arc::new(xss_sanitizer::AmmoniaBackend)))
}

#[cfg(not(feature = "ammonia"))]
fn with_ammonia(_filter: MarkupFilter) -> Result<MarkupFilter> {
    anyhow::bail!("markup backend `ammonia` needs xss-clean built with the `ammonia` feature")
}

/// List every rule match in `input` as pretty JSON.
fn report(input: &[u8]) -> Result<Vec<u8>> {
    let sanitizer = StringSanitizer::new(SanitizerConfig::default())
        .context("failed to compile rule library")?;
    let findings = sanitizer.scan(&String::from_utf8_lossy(input));

    info!(count = findings.len(), "scan complete");

    let mut out = serde_json::to_vec_pretty(&findings)?;
    out.push(b'\n');
    Ok(out)
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("failed to read input file: {}", path.display())),
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Parse CLI args.
    let cli = Cli::parse();

    // 2. Load config, then merge CLI overrides.
    let loaded = config::load(&cli.config)?;
    let config_found = loaded.is_some();
    let mut cfg = loaded.unwrap_or_default();

    if let Some(mode) = cli.mode {
        cfg.sanitizer.mode = mode;
    }
    if cli.escape_quotes {
        cfg.sanitizer.escape_quotes = true;
    }
    if let Some(backend) = cli.backend {
        cfg.sanitizer.markup_backend = backend;
    }
    if let Some(ref policy) = cli.policy {
        cfg.policy_file = Some(policy.clone());
    }

    // 3. Init tracing-subscriber; stdout carries the sanitized output.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.logging.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match cfg.logging.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }

    if !config_found {
        warn!(
            path = %cli.config.display(),
            "configuration file not found; using defaults"
        );
    }

    info!(
        config_file = %cli.config.display(),
        mode = ?cfg.sanitizer.mode,
        escape_quotes = cfg.sanitizer.escape_quotes,
        markup_backend = ?cfg.sanitizer.markup_backend,
        report = cli.report,
        "xss-clean starting"
    );

    // 4. Read, sanitize, write.
    let input = read_input(cli.input.as_deref())?;
    let output = if cli.report {
        report(&input)?
    } else {
        run(&cfg, &input)?
    };

    info!(
        input_bytes = input.len(),
        output_bytes = output.len(),
        "input sanitized"
    );

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&output).context("failed to write output")?;
    stdout.flush().context("failed to flush output")?;

    Ok(())
}
