// crates/strict-config-cli/src/main.rs
// ============================================================================
// Module: Strict Config CLI Entry Point
// Description: Command dispatcher for schema checks, value display, and docs.
// Purpose: Validate configuration sources against a schema from the shell.
// Dependencies: clap, serde_json, strict-config, thiserror
// ============================================================================

//! ## Overview
//! The `strict-config` binary loads a YAML schema, optionally populates a
//! registry from a flat YAML file or prefixed environment variables, and
//! reports the result. `check` validates, `show` prints resolved values, and
//! `docs` renders or verifies the Markdown key reference.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use strict_config::ConfigSource;
use strict_config::EnvSource;
use strict_config::FileSource;
use strict_config::Registry;
use strict_config::Schema;
use strict_config::StderrAuditSink;
use strict_config::schema_docs_markdown;
use strict_config::verify_schema_docs;
use strict_config::write_schema_docs;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a schema file.
const MAX_SCHEMA_BYTES: u64 = 1024 * 1024;
/// Environment variable naming the schema file.
const SCHEMA_ENV: &str = "STRICT_CONFIG_SCHEMA";
/// Schema file used when neither flag nor environment names one.
const DEFAULT_SCHEMA_PATH: &str = "strict-config.schema.yaml";
/// Default heading for generated docs.
const DEFAULT_DOCS_TITLE: &str = "Configuration Reference";
/// Registry label used in audit events.
const REGISTRY_NAME: &str = "strict-config-cli";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "strict-config", version, disable_help_subcommand = true)]
struct Cli {
    /// Emit registry audit events as JSON lines on stderr.
    #[arg(long, global = true)]
    audit: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a configuration source against the schema.
    Check(CheckCommand),
    /// Print every declared key with its resolved value.
    Show(ShowCommand),
    /// Render or verify the Markdown key reference.
    Docs(DocsCommand),
}

/// Schema and source selection shared by `check` and `show`.
#[derive(Args, Debug)]
struct SourceArgs {
    /// Schema file path (defaults to `STRICT_CONFIG_SCHEMA` or strict-config.schema.yaml).
    #[arg(long, value_name = "PATH")]
    schema: Option<PathBuf>,
    /// Flat YAML config file to populate from.
    #[arg(long, value_name = "PATH", conflicts_with = "env_prefix")]
    file: Option<PathBuf>,
    /// Populate from `<PREFIX>_<KEY>` environment variables.
    #[arg(long = "env-prefix", value_name = "PREFIX")]
    env_prefix: Option<String>,
}

/// Arguments for `check`.
#[derive(Args, Debug)]
struct CheckCommand {
    /// Schema and source selection.
    #[command(flatten)]
    source: SourceArgs,
    /// Fail when the source offers keys the schema does not declare.
    #[arg(long)]
    strict: bool,
}

/// Arguments for `show`.
#[derive(Args, Debug)]
struct ShowCommand {
    /// Schema and source selection.
    #[command(flatten)]
    source: SourceArgs,
    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

/// Arguments for `docs`.
#[derive(Args, Debug)]
struct DocsCommand {
    /// Schema file path (defaults to `STRICT_CONFIG_SCHEMA` or strict-config.schema.yaml).
    #[arg(long, value_name = "PATH")]
    schema: Option<PathBuf>,
    /// Document heading.
    #[arg(long, value_name = "TITLE", default_value = DEFAULT_DOCS_TITLE)]
    title: String,
    /// Output path; prints to stdout when omitted.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Verify the output file instead of writing it.
    #[arg(long, requires = "output")]
    verify: bool,
}

/// Output formats for `show`.
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// One `key = value` line per key.
    Text,
    /// Pretty-printed JSON object.
    Json,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for user-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Check(command) => command_check(&command, cli.audit),
        Commands::Show(command) => command_show(&command, cli.audit),
        Commands::Docs(command) => command_docs(&command),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes the `check` command.
fn command_check(command: &CheckCommand, audit: bool) -> CliResult<ExitCode> {
    let registry = open_registry(&command.source, audit)?;
    let Some(source) = selected_source(&command.source) else {
        write_stdout_line(&format!("schema ok: {} keys declared", registry.schema().len()))?;
        return Ok(ExitCode::SUCCESS);
    };
    if command.strict {
        let unknown = registry
            .unknown_keys(&*source)
            .map_err(|err| CliError::new(format!("config check failed: {err}")))?;
        if !unknown.is_empty() {
            return Err(CliError::new(format!(
                "undeclared keys in {} source: {}",
                source.name(),
                unknown.join(", ")
            )));
        }
    }
    registry
        .populate(&*source)
        .map_err(|err| CliError::new(format!("config check failed: {err}")))?;
    write_stdout_line(&format!(
        "config ok: {} source matches {} declared keys",
        source.name(),
        registry.schema().len()
    ))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `show` command.
fn command_show(command: &ShowCommand, audit: bool) -> CliResult<ExitCode> {
    let registry = open_registry(&command.source, audit)?;
    if let Some(source) = selected_source(&command.source) {
        registry
            .populate(&*source)
            .map_err(|err| CliError::new(format!("config load failed: {err}")))?;
    }
    let snapshot = registry
        .snapshot()
        .map_err(|err| CliError::new(format!("config read failed: {err}")))?;
    write_stdout_line(&render_snapshot(&snapshot, command.format)?)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `docs` command.
fn command_docs(command: &DocsCommand) -> CliResult<ExitCode> {
    let schema = load_schema(&resolve_schema_path(command.schema.as_deref()))?;
    match (&command.output, command.verify) {
        (Some(path), true) => {
            verify_schema_docs(&schema, &command.title, path)
                .map_err(|err| CliError::new(format!("docs verification failed: {err}")))?;
            write_stdout_line(&format!("docs up to date: {}", path.display()))?;
        }
        (Some(path), false) => {
            write_schema_docs(&schema, &command.title, path)
                .map_err(|err| CliError::new(format!("docs write failed: {err}")))?;
            write_stdout_line(&format!("docs written: {}", path.display()))?;
        }
        (None, _) => write_stdout_bytes(schema_docs_markdown(&schema, &command.title).as_bytes())?,
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Registry Setup
// ============================================================================

/// Loads the schema and builds a registry, optionally with stderr auditing.
fn open_registry(args: &SourceArgs, audit: bool) -> CliResult<Registry> {
    let schema = load_schema(&resolve_schema_path(args.schema.as_deref()))?;
    let builder = Registry::builder(REGISTRY_NAME)
        .declare_schema(schema)
        .map_err(|err| CliError::new(format!("registry setup failed: {err}")))?;
    let builder = if audit { builder.audit_sink(StderrAuditSink) } else { builder };
    builder.build().map_err(|err| CliError::new(format!("registry setup failed: {err}")))
}

/// Returns the source selected by flags, if any.
fn selected_source(args: &SourceArgs) -> Option<Box<dyn ConfigSource>> {
    if let Some(path) = &args.file {
        return Some(Box::new(FileSource::new(path)));
    }
    args.env_prefix
        .as_ref()
        .map(|prefix| Box::new(EnvSource::new(prefix.as_str())) as Box<dyn ConfigSource>)
}

/// Resolves the schema path from the flag, environment, or default.
fn resolve_schema_path(path: Option<&Path>) -> PathBuf {
    schema_path_from(path, std::env::var(SCHEMA_ENV).ok().as_deref())
}

/// Resolves the schema path from explicit inputs.
fn schema_path_from(path: Option<&Path>, env_path: Option<&str>) -> PathBuf {
    if let Some(path) = path {
        return path.to_path_buf();
    }
    match env_path {
        Some(env_path) if !env_path.trim().is_empty() => PathBuf::from(env_path),
        _ => PathBuf::from(DEFAULT_SCHEMA_PATH),
    }
}

/// Reads and parses a schema file with a size limit.
fn load_schema(path: &Path) -> CliResult<Schema> {
    let file = fs::File::open(path)
        .map_err(|err| CliError::new(format!("failed to open schema {}: {err}", path.display())))?;
    let mut content = String::new();
    file.take(MAX_SCHEMA_BYTES + 1)
        .read_to_string(&mut content)
        .map_err(|err| CliError::new(format!("failed to read schema {}: {err}", path.display())))?;
    if u64::try_from(content.len()).unwrap_or(u64::MAX) > MAX_SCHEMA_BYTES {
        return Err(CliError::new(format!("schema {} exceeds size limit", path.display())));
    }
    Schema::from_yaml_str(&content)
        .map_err(|err| CliError::new(format!("invalid schema {}: {err}", path.display())))
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders resolved values in the requested format.
fn render_snapshot(
    snapshot: &BTreeMap<String, Option<String>>,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(snapshot)
            .map_err(|err| CliError::new(format!("failed to encode values: {err}"))),
        OutputFormat::Text => Ok(snapshot
            .iter()
            .map(|(key, value)| match value {
                Some(value) => format!("{key} = {value}"),
                None => format!("{key} = (unset)"),
            })
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| output_error("stdout", &err))
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes).map_err(|err| output_error("stdout", &err))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Builds an output failure error.
fn output_error(stream: &str, error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write to {stream}: {error}"))
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
