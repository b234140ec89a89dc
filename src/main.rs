//! Translate selected columns of a CSV workbook directory.
//!
//! Usage:
//!   sheet-translator <input-dir> <output-dir> [--sheet NAME=COL1,COL2]... [--all] [--resume] [--reset] [--info]
//!
//! Required environment variables:
//! - OPENAI_API_KEY
//!
//! Optional:
//! - OPENAI_MODEL, OPENAI_API_URL, TARGET_LANGUAGE
//! - REQUESTS_PER_MINUTE, MAX_RETRIES, BASE_DELAY_MS, BATCH_SIZE, FLUSH_EVERY
//! - REQUEST_TIMEOUT_SECS, STATE_FILE

use anyhow::{bail, Context, Result};
use sheet_translator::inspect::{estimate_sheet_volume, estimate_workbook_volume, sheet_info};
use sheet_translator::{
    BackendConfig, CsvWorkbook, EngineConfig, OpenAiBackend, RunOutcome, SelectionSet, StateStore,
    StopFlag, TabularSource, WorkbookOrchestrator,
};
use tracing::{info, warn};

const USAGE: &str = "Usage: sheet-translator <input-dir> <output-dir> [--sheet NAME=COL1,COL2]... [--all] [--resume] [--reset] [--info]";

#[derive(Debug, Default)]
struct CliArgs {
    input_dir: String,
    output_dir: String,
    sheets: Vec<(String, Vec<String>)>,
    all: bool,
    resume: bool,
    reset: bool,
    info: bool,
}

fn parse_sheet_arg(value: &str) -> Result<(String, Vec<String>)> {
    let (sheet, columns) = value
        .split_once('=')
        .with_context(|| format!("Expected NAME=COL1,COL2 but got '{}'", value))?;
    let columns: Vec<String> = columns
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if sheet.trim().is_empty() || columns.is_empty() {
        bail!("Expected NAME=COL1,COL2 but got '{}'", value);
    }
    Ok((sheet.trim().to_string(), columns))
}

fn parse_args(args: &[String]) -> Result<CliArgs> {
    let mut cli = CliArgs::default();
    let mut positional = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--all" => cli.all = true,
            "--resume" => cli.resume = true,
            "--reset" => cli.reset = true,
            "--info" => cli.info = true,
            "--sheet" => {
                let value = iter.next().context("--sheet needs a value")?;
                cli.sheets.push(parse_sheet_arg(value)?);
            }
            flag if flag.starts_with("--") => bail!("Unknown option '{}'\n{}", flag, USAGE),
            _ => positional.push(arg.clone()),
        }
    }

    let mut positional = positional.into_iter();
    cli.input_dir = positional
        .next()
        .with_context(|| format!("Missing input directory\n{}", USAGE))?;
    cli.output_dir = match positional.next() {
        Some(dir) => dir,
        None if cli.info => String::new(),
        None => bail!("Missing output directory\n{}", USAGE),
    };
    if let Some(extra) = positional.next() {
        bail!("Unexpected argument '{}'\n{}", extra, USAGE);
    }

    Ok(cli)
}

fn print_info(source: &CsvWorkbook, store: &StateStore) -> Result<()> {
    let sheets = sheet_info(source).context("Failed to list sheets")?;
    if sheets.is_empty() {
        println!("No sheets found in {}", source.dir().display());
        return Ok(());
    }

    for (sheet, columns) in sheets {
        let data = source
            .read_sheet_as_text(&sheet)
            .with_context(|| format!("Failed to read sheet '{}'", sheet))?;
        let status = if store.is_sheet_completed(&sheet) {
            "completed".to_string()
        } else {
            store.format_sheet_progress(&sheet)
        };
        println!(
            "{} ({} rows, {} translatable cells) {}",
            sheet,
            data.row_count(),
            estimate_sheet_volume(&data, &columns),
            status
        );
        for (index, column) in columns.iter().enumerate() {
            let volume = estimate_sheet_volume(&data, std::slice::from_ref(column));
            println!("  {}. {} ({} translatable)", index + 1, column, volume);
        }
    }
    Ok(())
}

fn build_selection(
    cli: &CliArgs,
    source: &CsvWorkbook,
    stored: &SelectionSet,
    stored_file: &str,
) -> Result<SelectionSet> {
    if cli.resume {
        if stored.is_empty() {
            bail!("No saved selection to resume");
        }
        if stored_file != cli.input_dir {
            warn!(
                "Saved selection was made for '{}', resuming it for '{}'",
                stored_file, cli.input_dir
            );
        }
        return Ok(stored.clone());
    }

    let mut selection = SelectionSet::new();
    if cli.all {
        for (sheet, columns) in sheet_info(source).context("Failed to list sheets")? {
            selection.insert(sheet, columns);
        }
    }
    for (sheet, columns) in &cli.sheets {
        selection.insert(sheet.clone(), columns.iter().cloned());
    }

    if selection.is_empty() {
        bail!("Nothing selected: pass --sheet, --all or --resume\n{}", USAGE);
    }
    Ok(selection)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sheet_translator=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args)?;
    let source = CsvWorkbook::new(&cli.input_dir);

    // Load configuration from environment
    let engine_config = EngineConfig::from_env();

    if cli.info {
        return print_info(&source, &StateStore::open(&engine_config.state_file));
    }

    let backend_config = BackendConfig::from_env()?;
    info!(
        "Translating into {} with {} ({} requests/min)",
        backend_config.target_language, backend_config.model, engine_config.requests_per_minute
    );

    let backend = OpenAiBackend::new(backend_config)?;
    let mut engine = WorkbookOrchestrator::from_config(backend, &engine_config);

    if cli.reset {
        engine.store_mut().clear();
    }

    let selection = build_selection(
        &cli,
        &source,
        engine.store().selection(),
        engine.store().file_path(),
    )?;
    engine
        .store_mut()
        .remember_selection(&cli.input_dir, &selection);

    info!(
        "Selected {} sheets, about {} cells to translate",
        selection.len(),
        estimate_workbook_volume(&source, &selection)
    );

    // Ctrl-C asks the run to stop at the next batch boundary
    let stop = StopFlag::new();
    let ctrl_c_flag = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested, finishing the current batch");
            ctrl_c_flag.stop();
        }
    });

    let mut sink = CsvWorkbook::new(&cli.output_dir);
    let mut on_progress = |unit: &str, percent: f64, message: &str| {
        info!("[{}] {:.1}% {}", unit, percent, message);
    };

    let report = engine
        .process(&source, &mut sink, &selection, &mut on_progress, &stop)
        .await;

    for (sheet, reason) in &report.failed {
        warn!("Sheet '{}' was not translated: {}", sheet, reason);
    }
    info!("Done: {}", report.stats);

    match report.outcome {
        RunOutcome::Success => Ok(()),
        RunOutcome::CompletedWithFailures => std::process::exit(2),
        RunOutcome::Failed => std::process::exit(1),
        RunOutcome::Stopped => {
            info!("Run stopped; start again with --resume to continue");
            std::process::exit(130)
        }
    }
}
