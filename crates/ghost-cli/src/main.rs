use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ghost_contracts::events::EventWriter;
use ghost_contracts::present::{render, Presentation};
use ghost_contracts::{AuditError, AuditResult};
use ghost_engine::{
    default_tool_registry, ApiKey, AuditConfig, Auditor, GeminiEndpoint, MaintenanceTicket,
    ReasoningClient,
};
use serde_json::{json, Value};

#[derive(Debug, Parser)]
#[command(
    name = "ghost-rs",
    version,
    about = "Ghost Engineer: audit a component photo against its service manual"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one forensic audit.
    Audit(AuditArgs),
    /// Print the tool declarations offered to the model.
    Tools,
}

#[derive(Debug, Parser)]
struct AuditArgs {
    /// Component photograph (JPEG, PNG, WebP, ...).
    #[arg(long)]
    image: PathBuf,
    /// Service manual PDF.
    #[arg(long)]
    manual: PathBuf,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    api_base: Option<String>,
    /// Request timeout in seconds.
    #[arg(long)]
    timeout: Option<f64>,
    #[arg(long)]
    max_tool_rounds: Option<usize>,
    /// Append lifecycle events to this JSONL file.
    #[arg(long)]
    events: Option<PathBuf>,
    /// Print both regions as one JSON object.
    #[arg(long)]
    json: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("ghost-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Audit(args) => run_audit_command(args),
        Command::Tools => {
            let tools = default_tool_registry(|_| {})?;
            println!(
                "{}",
                serde_json::to_string_pretty(&Value::Array(tools.declarations()))?
            );
            Ok(0)
        }
    }
}

fn run_audit_command(args: AuditArgs) -> Result<i32> {
    let config = resolve_config(&args);
    let api_key = ApiKey::from_env()?;
    let endpoint =
        GeminiEndpoint::from_config(&config, api_key).context("Gemini endpoint setup failed")?;
    let client = ReasoningClient::new(endpoint, config.model.clone(), config.max_tool_rounds);
    let tools = default_tool_registry(announce_ticket)?;

    let mut auditor = Auditor::new(client, tools);
    if let Some(path) = &config.events_path {
        let events = EventWriter::new(path, "ghost-rs");
        ensure_writable(events.path())?;
        auditor = auditor.with_events(events);
    }

    let image = read_upload(&args.image)?;
    let manual = read_upload(&args.manual)?;

    eprintln!(
        "Running forensic audit with {} (up to {} tool rounds)...",
        config.model, config.max_tool_rounds
    );
    match auditor.run_audit(image.as_deref(), manual.as_deref()) {
        Ok(result) => {
            print_result(&result, args.json)?;
            Ok(0)
        }
        Err(err) => {
            report_failure(&err);
            Ok(exit_code_for(&err))
        }
    }
}

fn resolve_config(args: &AuditArgs) -> AuditConfig {
    let mut config = AuditConfig::from_env();
    if let Some(model) = &args.model {
        config.set_model(model);
    }
    if let Some(api_base) = &args.api_base {
        config.set_api_base(api_base);
    }
    if let Some(timeout) = args.timeout {
        config.set_request_timeout_secs(timeout);
    }
    if let Some(rounds) = args.max_tool_rounds {
        config.set_max_tool_rounds(rounds);
    }
    if let Some(events) = &args.events {
        config.events_path = Some(events.clone());
    }
    config
}

/// A path that does not exist is an absent upload, not an I/O failure.
fn read_upload(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed reading {}", path.display())),
    }
}

fn ensure_writable(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("event log {} is not writable", path.display()))?;
    Ok(())
}

fn announce_ticket(ticket: &MaintenanceTicket) {
    eprintln!(
        "[ticket] Ticket created for {} ({}, urgency {})",
        ticket.part_name, ticket.id, ticket.urgency
    );
}

fn print_result(result: &AuditResult, as_json: bool) -> Result<()> {
    let view = render(result);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&json_view(result, &view))?);
        return Ok(());
    }
    println!("== REASONING TRANSCRIPT ==");
    println!("{}", view.reasoning);
    println!();
    println!("== DIAGNOSIS ==");
    println!("{}", view.diagnosis);
    Ok(())
}

fn json_view(result: &AuditResult, view: &Presentation) -> Value {
    json!({
        "reasoning": view.reasoning,
        "diagnosis": view.diagnosis,
        "answered": result.has_answer(),
        "thoughts": result.thoughts,
        "tool_calls": result.tool_calls,
    })
}

fn report_failure(err: &AuditError) {
    eprintln!("{}", err.user_message());
    eprintln!("detail: {err}");
    if err.is_retryable() {
        eprintln!("This failure is transient; running the audit again may succeed.");
    }
}

fn exit_code_for(err: &AuditError) -> i32 {
    match err {
        AuditError::MissingInput { .. } | AuditError::Decode { .. } => 2,
        _ => 1,
    }
}
