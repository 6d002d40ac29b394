//! Claude token check
//!
//! Single-shot CLI that:
//! 1. Loads optional configuration (file, env, flags)
//! 2. Reads the Claude CLI OAuth credentials for this platform
//! 3. Reports whether the access token has expired via stdout and exit status

mod config;
mod outcome;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use claude_credentials::{
    ConsoleDiagnostics, CredentialReader, Diagnostics, Environment, TracingDiagnostics,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::outcome::Outcome;

/// Where reader diagnostics go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DiagnosticsMode {
    /// `[DEBUG]` lines on stdout, failures on stderr
    Console,
    /// Structured `tracing` events (set LOG_LEVEL=debug to see debug events)
    Tracing,
}

impl DiagnosticsMode {
    fn sink(self) -> Box<dyn Diagnostics> {
        match self {
            Self::Console => Box::new(ConsoleDiagnostics::stdio()),
            Self::Tracing => Box::new(TracingDiagnostics),
        }
    }
}

#[derive(Debug, Parser)]
#[command(version, about = "Check the Claude CLI OAuth token stored on this machine")]
struct Cli {
    /// Config file (TOML)
    #[arg(long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Print diagnostic details about retrieval and expiry
    #[arg(long, env = "CLAUDE_TOKEN_DEBUG")]
    debug: bool,

    #[arg(long, value_enum, default_value_t = DiagnosticsMode::Console)]
    diagnostics: DiagnosticsMode,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON on stderr
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load_or_default(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("failed to load config from {}", path.display()),
        None => "failed to load default configuration".to_string(),
    })?;
    let debug_enabled = cli.debug || config.debug;

    let platform = config.credentials.resolved_platform();
    let env = Environment::from_process(&platform);

    let reader =
        CredentialReader::from_config(&config.credentials, &env, cli.diagnostics.sink());

    debug!(
        platform = %reader.platform(),
        source = %reader.source_kind(),
        debug_enabled,
        "checking Claude credentials"
    );

    let outcome = Outcome::evaluate(&reader, debug_enabled);

    if cli.json {
        println!(
            "{}",
            serde_json::to_string(&outcome).context("serializing result")?
        );
    } else {
        println!("{}", outcome.render_text());
    }

    Ok(ExitCode::from(outcome.exit_code()))
}
