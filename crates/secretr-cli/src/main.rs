//! `secretr` CLI — command-line client for Secret Server's SOAP web service.
//!
//! Authenticates against the server, retrieves secrets by id, and
//! emits them as JSON on stdout (direct mode) or writes them to files
//! named by a YAML batch config (config mode). Prompts and diagnostics
//! stay on stderr, so stdout is always safe to pipe.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod prompt;
mod soap;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use secretr_core::batch::BatchConfig;
use secretr_core::config::{ConnectionOverrides, resolve_connection};
use secretr_core::output::{OutputMode, render};
use secretr_core::retrieve::{RetrievalOptions, retrieve_all};
use secretr_core::secret::{ResultEnvelope, RetrievedSecret, SecretRequest};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::prompt::StdinPrompter;
use crate::soap::SoapClient;

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";

// ── CLI structure ────────────────────────────────────────────────────

/// Retrieve secrets from a Secret Server SOAP web service.
#[derive(Parser)]
#[command(
    name = "secretr",
    version,
    about = "Retrieve secrets from a Secret Server SOAP web service",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         SECRETR_WSDL       WSDL URL of the secret server web service\n  \
         SECRETR_USERNAME   Account used to authenticate\n  \
         SECRETR_PASSWORD   Password for the account\n  \
         SECRETR_DOMAIN     Directory domain forwarded to authentication\n  \
         SECRETR_ORG        Organization code for Secret Server Online\n  \
         RUST_LOG           Log filter (default: warn)\n\n\
         {DIM}Examples:{RESET}\n  \
         secretr -w https://vault.example.com/SecretServer/SSWebService.asmx?WSDL 101 202\n  \
         secretr 101 --simple --pretty\n  \
         secretr 101 -f 'Secrets[0].Items[?FieldName==`Password`].Value | [0]' --raw\n  \
         secretr -c deploy/secrets.yaml --strict"
    ),
)]
struct Cli {
    /// Ids of the secrets to retrieve.
    #[arg(
        value_name = "SECRET_ID",
        required_unless_present = "config",
        conflicts_with = "config"
    )]
    secret_ids: Vec<String>,

    /// Account used to authenticate; prompted for when absent.
    #[arg(short, long, env = "SECRETR_USERNAME")]
    username: Option<String>,

    /// Password for the account; prompted for (hidden) when absent.
    #[arg(short, long, env = "SECRETR_PASSWORD")]
    password: Option<String>,

    /// WSDL URL of the secret server web service.
    #[arg(short, long, env = "SECRETR_WSDL")]
    wsdl: Option<String>,

    /// Directory domain to authenticate against.
    #[arg(long, env = "SECRETR_DOMAIN")]
    domain: Option<String>,

    /// Organization code, for Secret Server Online accounts.
    #[arg(long = "org", env = "SECRETR_ORG", value_name = "CODE")]
    organization: Option<String>,

    /// YAML batch config; secrets are written to files instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JMESPath expression applied to the result envelope.
    #[arg(short, long, value_name = "EXPR", conflicts_with = "config")]
    filter: Option<String>,

    /// Fetch the secret holding this attachment (retrieved whole).
    #[arg(short, long, value_name = "NAME")]
    attachment_name: Option<String>,

    /// Tab-indent the emitted JSON.
    #[arg(long)]
    pretty: bool,

    /// Print string results bare, without JSON quoting; wins over --pretty.
    #[arg(long)]
    raw: bool,

    /// Emit flattened records: name, id, and a field-to-value map.
    #[arg(short, long)]
    simple: bool,

    /// Cap on concurrently in-flight retrievals (default: unlimited).
    #[arg(long, value_name = "N")]
    max_concurrent: Option<usize>,

    /// Exit nonzero when any retrieval fails.
    #[arg(long)]
    strict: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("  {RED}{BOLD}✗ Error:{RESET} {e:#}");
            eprintln!();
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(name) = cli.attachment_name.as_deref() {
        // TODO: fetch the attachment bytes via DownloadFileAttachmentByItemId
        // instead of falling back to the whole secret.
        warning(&format!(
            "attachment download is not implemented; retrieving the full secret instead of `{name}`"
        ));
    }

    let batch = match cli.config.as_deref() {
        Some(path) => Some((BatchConfig::load(path)?, path.to_path_buf())),
        None => None,
    };
    let file_wsdl = batch.as_ref().and_then(|(config, _)| config.wsdl.as_deref());

    let connection = resolve_connection(
        ConnectionOverrides {
            wsdl: cli.wsdl.clone(),
            username: cli.username.clone(),
            password: cli.password.clone(),
            organization: cli.organization.clone(),
            domain: cli.domain.clone(),
        },
        file_wsdl,
        &mut StdinPrompter,
    )?;

    let client = SoapClient::new(connection).context("failed to build the SOAP client")?;
    let options = RetrievalOptions {
        simplify: cli.simple,
        max_concurrent: cli.max_concurrent,
    };
    let mode = OutputMode::from_flags(cli.raw, cli.pretty);

    match batch {
        Some((config, path)) => run_batch(&client, &config, &path, options, mode, cli.strict).await,
        None => run_direct(&client, &cli, options, mode).await,
    }
}

// ── Direct mode ──────────────────────────────────────────────────────

async fn run_direct(
    client: &SoapClient,
    cli: &Cli,
    options: RetrievalOptions,
    mode: OutputMode,
) -> Result<ExitCode> {
    let results = retrieve_all(client, &cli.secret_ids, options).await;
    let envelope = ResultEnvelope::new(results);

    for failure in envelope.failures() {
        eprintln!("{RED}Error retrieving secret {}: {}{RESET}", failure.id, failure.error);
    }
    let failed = envelope.failures().count();

    let mut value = serde_json::to_value(&envelope).context("failed to encode results")?;
    if let Some(expr) = cli.filter.as_deref() {
        value = apply_filter(&value, expr)?;
    }
    println!("{}", render(&value, mode).context("failed to render output")?);

    if cli.strict && failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn apply_filter(value: &Value, expr: &str) -> Result<Value> {
    let compiled = jmespath::compile(expr)
        .map_err(|err| anyhow!("invalid filter expression `{expr}`: {err}"))?;
    let data = jmespath::Variable::from_json(&value.to_string())
        .map_err(|err| anyhow!("failed to prepare filter input: {err}"))?;
    let projected = compiled
        .search(data)
        .map_err(|err| anyhow!("filter `{expr}` failed: {err}"))?;
    serde_json::to_value(projected.as_ref()).context("failed to encode filter result")
}

// ── Config-driven batch mode ─────────────────────────────────────────

async fn run_batch(
    client: &SoapClient,
    config: &BatchConfig,
    config_path: &Path,
    options: RetrievalOptions,
    mode: OutputMode,
    strict: bool,
) -> Result<ExitCode> {
    let requests = config.requests(config_path);
    let ids: Vec<String> = requests.iter().map(|request| request.id.clone()).collect();
    let results = retrieve_all(client, &ids, options).await;

    let mut written = 0_usize;
    let mut failed = 0_usize;
    for (request, result) in requests.iter().zip(&results) {
        if let Some(failure) = result.failure() {
            eprintln!("{RED}Error retrieving secret {}: {}{RESET}", failure.id, failure.error);
            failed = failed.saturating_add(1);
            continue;
        }
        match write_secret(request, result, mode) {
            Ok(()) => written = written.saturating_add(1),
            Err(err) => {
                eprintln!("{RED}Error writing secret {}: {err:#}{RESET}", request.id);
                failed = failed.saturating_add(1);
            }
        }
    }

    eprintln!("{DIM}{written} secret(s) written, {failed} failed{RESET}");

    if strict && failed > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn write_secret(request: &SecretRequest, result: &RetrievedSecret, mode: OutputMode) -> Result<()> {
    let Some(outfile) = request.outfile.as_deref() else {
        bail!("batch entry has no output file");
    };

    if let Some(parent) = outfile.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let value = serde_json::to_value(result).context("failed to encode secret")?;
    let rendered = render(&value, mode).context("failed to render secret")?;
    std::fs::write(outfile, format!("{rendered}\n"))
        .with_context(|| format!("failed to write {}", outfile.display()))?;
    tracing::debug!(secret_id = %request.id, outfile = %outfile.display(), "wrote secret");
    Ok(())
}

// ── Output helpers ───────────────────────────────────────────────────

fn warning(msg: &str) {
    eprintln!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}
