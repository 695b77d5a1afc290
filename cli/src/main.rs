use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    process::ExitCode,
    sync::Mutex,
};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use rimport_config::{Overrides, RimportConfig, Settings, resolve_import};
use rimport_core::{CsvReader, apply_overrides, guess_mapping, validate_mapping};
use rimport_engine::{Enrichment, ImportEvent, ImportOptions, ImportReport, Importer, LogStatus};
use rimport_providers::{ForumClient, GeminiClient};
use rimport_types::{CsvTable, DestField, FieldMapping, truncate_with_ellipsis};

/// Rows shown by `preview`.
const PREVIEW_ROWS: usize = 3;
const PREVIEW_CELL_CHARS: usize = 40;

#[derive(Debug, Parser)]
#[command(name = "rimport", version, about = "Bulk-create XenForo resources from a CSV file")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Config file (default: ~/.rimport/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Forum root URL, e.g. https://forum.example.com
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,
    /// XenForo API key (falls back to $XF_API_KEY)
    #[arg(long, global = true, value_name = "KEY")]
    api_key: Option<String>,
    #[arg(long, global = true, value_name = "ID")]
    category_id: Option<u32>,
    /// Act as this user (sends XF-Api-User)
    #[arg(long, global = true, value_name = "ID")]
    user_id: Option<u32>,
    /// Route requests through a CORS proxy; pass --proxy=PREFIX to pick one
    /// other than corsproxy.io
    #[arg(
        long,
        global = true,
        value_name = "PREFIX",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    proxy: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the forum URL, API key, and category
    Check,
    /// Show the headers, the effective mapping, and the first rows of a CSV
    Preview {
        csv: PathBuf,
        #[command(flatten)]
        mapping: MappingArgs,
    },
    /// Create one resource per CSV row
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct MappingArgs {
    /// Map a resource field to a CSV column, e.g. --map title=Name
    #[arg(long = "map", value_name = "FIELD=COLUMN")]
    map: Vec<String>,
    /// Field delimiter (a single character, or "tab")
    #[arg(long, value_name = "CHAR")]
    delimiter: Option<String>,
}

#[derive(Debug, Args)]
struct RunArgs {
    csv: PathBuf,
    #[command(flatten)]
    mapping: MappingArgs,
    /// Never call Gemini; taglines are cut from the description
    #[arg(long)]
    no_ai: bool,
    /// Rewrite descriptions with Gemini before upload
    #[arg(long, conflicts_with = "no_ai")]
    enhance_description: bool,
    /// Pause between uploads in milliseconds
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,
    /// Build payloads without sending them
    #[arg(long)]
    dry_run: bool,
    /// Write a JSON report of the run
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

fn init_tracing() {
    let (log_file, init_warnings) = open_rimport_log_file();

    if let Some((log_path, file)) = log_file {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Without a log file, only warnings reach the terminal so they do not
    // drown the progress output.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::new("warn"))
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_rimport_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in rimport_log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn rimport_log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.rimport/logs/rimport.log
    if let Some(config_path) = RimportConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("rimport.log"));
    }

    // Fallback: ./.rimport/logs/rimport.log
    candidates.push(PathBuf::from(".rimport").join("logs").join("rimport.log"));

    candidates
}

fn load_config(path: Option<&Path>) -> Result<RimportConfig> {
    match path {
        Some(path) => RimportConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RimportConfig::load()
            .context("loading ~/.rimport/config.toml")?
            .unwrap_or_default()),
    }
}

fn overrides(global: &GlobalArgs) -> Overrides {
    Overrides {
        base_url: global.base_url.clone(),
        api_key: global.api_key.clone(),
        category_id: global.category_id,
        user_id: global.user_id,
        proxy: global.proxy.clone(),
        timeout_secs: global.timeout_secs,
        ..Overrides::default()
    }
}

fn resolve(config: &RimportConfig, overrides: &Overrides) -> Result<Settings> {
    config
        .resolve(overrides, |name| std::env::var(name).ok())
        .context("invalid settings")
}

/// Guessed mapping, then the config file's `[mapping]`, then `--map` flags.
fn effective_mapping(
    headers: &[String],
    configured: Option<&FieldMapping>,
    flags: &[String],
) -> Result<FieldMapping> {
    let mut mapping = guess_mapping(headers);
    if let Some(configured) = configured {
        for (field, header) in configured.iter() {
            mapping.set(field, header);
        }
    }
    apply_overrides(&mut mapping, flags)?;
    Ok(mapping)
}

fn read_table(path: &Path, delimiter: u8) -> Result<CsvTable> {
    let table = CsvReader::new().with_delimiter(delimiter).read_file(path)?;
    if table.is_empty() {
        bail!("{} needs a header row and at least one data row", path.display());
    }
    Ok(table)
}

fn print_mapping(mapping: &FieldMapping) {
    println!("Mapping:");
    for field in DestField::ALL {
        let column = mapping.get(field).unwrap_or("-");
        let required = if field.is_required() { " *" } else { "" };
        println!("  {:<22} <- {column}", format!("{}{required}", field.label()));
    }
}

async fn check(global: &GlobalArgs) -> Result<ExitCode> {
    let config = load_config(global.config.as_deref())?;
    let overrides = overrides(global);
    let settings = resolve(&config, &overrides)?;
    let client = ForumClient::with_timeout(settings.site, settings.import.timeout_secs)
        .context("building HTTP client")?;

    match client.test_connection().await {
        Ok(category) => {
            println!("Connected. Category {}: {}", category.id, category.title);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Connection failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn preview(global: &GlobalArgs, csv: &Path, args: &MappingArgs) -> Result<ExitCode> {
    let config = load_config(global.config.as_deref())?;
    let overrides = Overrides {
        delimiter: args.delimiter.clone(),
        ..overrides(global)
    };
    let import = resolve_import(&config, &overrides)?;
    let table = read_table(csv, import.delimiter)?;
    let mapping = effective_mapping(&table.headers, config.mapping.as_ref(), &args.map)?;

    println!("{}: {} rows", csv.display(), table.len());
    println!("Headers: {}", table.headers.join(", "));
    print_mapping(&mapping);

    for (index, row) in table.preview(PREVIEW_ROWS).iter().enumerate() {
        println!("Row {}:", index + 1);
        for (header, value) in row.iter() {
            println!("  {header}: {}", truncate_with_ellipsis(value, PREVIEW_CELL_CHARS));
        }
    }

    if let Err(e) = validate_mapping(&mapping, &table.headers) {
        eprintln!("Mapping is not usable: {e}");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn run(global: &GlobalArgs, args: &RunArgs) -> Result<ExitCode> {
    let config = load_config(global.config.as_deref())?;
    let overrides = Overrides {
        no_ai: args.no_ai,
        enhance_description: args.enhance_description,
        delay_ms: args.delay_ms,
        delimiter: args.mapping.delimiter.clone(),
        ..overrides(global)
    };
    let settings = resolve(&config, &overrides)?;

    let table = read_table(&args.csv, settings.import.delimiter)?;
    let mapping = effective_mapping(&table.headers, Some(&settings.mapping), &args.mapping.map)?;
    validate_mapping(&mapping, &table.headers).context("column mapping")?;

    let enrichment = match (&settings.ai.api_key, settings.ai.enabled) {
        (_, false) => Enrichment::Disabled,
        (Some(key), true) => Enrichment::Enabled(
            GeminiClient::with_timeout(
                key.clone(),
                settings.ai.model.clone(),
                settings.import.timeout_secs,
            )
            .context("building Gemini client")?,
        ),
        (None, true) => {
            println!("No Gemini API key configured; taglines will be cut from descriptions.");
            Enrichment::MissingKey
        }
    };

    let client = ForumClient::with_timeout(settings.site.clone(), settings.import.timeout_secs)
        .context("building HTTP client")?;
    let options = ImportOptions {
        category_id: settings.site.category_id,
        delay: settings.import.delay,
        enhance_description: settings.ai.enhance_description,
        dry_run: args.dry_run,
    };
    let importer = Importer::new(client, enrichment, options);

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));

    let report = tokio::select! {
        report = importer.run(&table, &mapping, &tx) => report,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Import interrupted");
            eprintln!("Interrupted; rows already uploaded stay on the forum.");
            return Ok(ExitCode::from(130));
        }
    };
    drop(tx);
    if let Err(e) = printer.await {
        tracing::warn!(%e, "Progress printer ended abnormally");
    }

    println!(
        "Done: {} succeeded, {} failed, {} total.",
        report.stats.success, report.stats.failed, report.stats.total
    );
    if let Some(path) = &args.report {
        write_report(path, &report)?;
        println!("Report written to {}", path.display());
    }

    Ok(if report.stats.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<ImportEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            ImportEvent::Log(entry) if entry.status == LogStatus::Error => eprintln!("{entry}"),
            ImportEvent::Log(entry) => println!("{entry}"),
            ImportEvent::Progress(stats) if stats.processed > 0 => {
                tracing::debug!(
                    processed = stats.processed,
                    total = stats.total,
                    percent = stats.progress_percent(),
                    "Import progress"
                );
            }
            ImportEvent::Action(action) => tracing::debug!(%action, "Import action"),
            ImportEvent::Progress(_) | ImportEvent::Finished(_) => {}
        }
    }
}

fn write_report(path: &Path, report: &ImportReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    fs::write(path, json).with_context(|| format!("writing report {}", path.display()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = match &cli.command {
        Command::Check => check(&cli.global).await,
        Command::Preview { csv, mapping } => preview(&cli.global, csv, mapping),
        Command::Run(args) => run(&cli.global, args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::warn!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
