//! `fabric-reconcile`: converge one catalog-declared object on a controller
//!
//! Prints the operation result as JSON on stdout. Exit status is 0 on
//! success (changed or not), 1 when reconciliation fails and 2 on usage or
//! configuration errors.

mod cli;

use anyhow::{Context, Result};
use clap::ArgMatches;
use fabric_core::{Catalog, EngineConfig, OperationResult, ReconcileError, Reconciler};
use fabric_transport::{ApicSession, Protocol, SessionConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const EXIT_FAILED: u8 = 1;
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::command().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match run(&matches).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Usage and configuration errors surface as `Err`; reconciliation failures
/// are reported in-band and map to exit status 1
async fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let catalog_path = matches
        .get_one::<PathBuf>("catalog")
        .context("missing --catalog")?;
    let catalog = Catalog::load(catalog_path)
        .with_context(|| format!("failed to load catalog {}", catalog_path.display()))?;

    let object = cli::string(matches, "object")?;
    let mode = cli::mode(matches)?;
    let options = cli::options(matches)?;
    let dry_run = matches.get_flag("check");
    let timeout = matches.get_one::<u64>("timeout").copied().unwrap_or(30);

    let binding = catalog
        .bind(object, mode, &options)
        .with_context(|| format!("invalid options for object type '{object}'"))?;
    let url = binding
        .address
        .resolve()
        .map(|path| path.url())
        .unwrap_or_default();

    let session_config = session_config(matches, timeout)?;
    let session = match ApicSession::authenticate(&session_config).await {
        Ok(session) => Arc::new(session),
        Err(e) => return Ok(emit_failure(mode, &url, dry_run, &ReconcileError::from(e))),
    };

    let engine = Reconciler::new(session, EngineConfig::default().with_timeout_secs(timeout));
    match engine.reconcile(binding.into_request(dry_run)).await {
        Ok(result) => {
            emit(&result);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Ok(emit_failure(mode, &url, dry_run, &e)),
    }
}

fn session_config(matches: &ArgMatches, timeout: u64) -> Result<SessionConfig> {
    let host = cli::string(matches, "host")?;
    let username = cli::string(matches, "username")?;
    let password_env = cli::string(matches, "password-env")?;
    let password = std::env::var(password_env)
        .with_context(|| format!("password environment variable {password_env} is not set"))?;
    let protocol: Protocol = cli::string(matches, "protocol")?.parse()?;

    let config = SessionConfig::new(host, username, password)
        .with_protocol(protocol)
        .with_timeout_secs(timeout)
        .with_validate_certs(!matches.get_flag("no-verify"));
    config.validate()?;
    Ok(config)
}

fn emit(result: &OperationResult) {
    match serde_json::to_string_pretty(result) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("error: failed to render result: {e}"),
    }
}

fn emit_failure(mode: fabric_core::Mode, url: &str, dry_run: bool, error: &ReconcileError) -> ExitCode {
    tracing::error!("Reconciliation failed: {}", error);
    emit(&OperationResult::failed(mode, url, dry_run, error));
    ExitCode::from(EXIT_FAILED)
}
