use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldscan::config::ManagerConfig;
use fieldscan::core::settings::LadderPreset;
use fieldscan::export::{Exporter, JsonExporter};
use fieldscan::manager::RecognitionManager;
use fieldscan::ocr::TesseractEngine;
use fieldscan::pages::FilePageSource;

#[derive(Parser, Debug)]
#[command(name = "fieldscan")]
#[command(version, about = "Extract fields from scanned work-permit documents", long_about = None)]
struct Cli {
    /// OCR language data directory
    tessdata: PathBuf,

    /// Directory of PDF and image files to process
    input_dir: PathBuf,

    /// Root for working images and debug traces (default: INPUT_DIR)
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Settings ladder preset
    #[arg(long, value_enum)]
    ladder: Option<Ladder>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a per-file debug trace
    #[arg(short, long)]
    debug: bool,

    /// Don't check the engine's answer on the reference image
    #[arg(long)]
    skip_self_test: bool,

    /// Write all results to this JSON file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Ladder {
    Default,
    Sloppy,
    Fast,
    Perfectionist,
    Whatever,
}

impl From<Ladder> for LadderPreset {
    fn from(ladder: Ladder) -> Self {
        match ladder {
            Ladder::Default => LadderPreset::Default,
            Ladder::Sloppy => LadderPreset::Sloppy,
            Ladder::Fast => LadderPreset::Fast,
            Ladder::Perfectionist => LadderPreset::Perfectionist,
            Ladder::Whatever => LadderPreset::Whatever,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "fieldscan=debug"
    } else {
        "fieldscan=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    if !cli.input_dir.is_dir() {
        anyhow::bail!("Input is not a directory: {}", cli.input_dir.display());
    }

    let mut config = match &cli.config {
        Some(path) => ManagerConfig::from_toml_file(path)?,
        None => ManagerConfig::default(),
    };
    config.temp_dir = cli
        .temp_dir
        .clone()
        .or(config.temp_dir)
        .or_else(|| Some(cli.input_dir.clone()));
    config.tessdata_dir = Some(cli.tessdata.clone());
    config.debug_output |= cli.debug;
    config.self_test &= !cli.skip_self_test;
    if let Some(ladder) = cli.ladder {
        config.ladder = LadderPreset::from(ladder).into();
    }

    let engine = TesseractEngine::new()
        .with_language(config.language.clone())
        .with_tessdata_dir(config.tessdata_dir.clone());
    let manager = RecognitionManager::new(Arc::new(engine), Arc::new(FilePageSource::default()))
        .with_config(config);

    manager.init().context("Failed to initialize recognition")?;
    manager.start().context("Failed to start recognition")?;

    let handles = manager
        .push_all_files(&cli.input_dir)
        .with_context(|| format!("Failed to list {}", cli.input_dir.display()))?;
    eprintln!("[*] Processing {} file(s)", handles.len());

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.wait() {
            Ok(report) => {
                let document_type = report
                    .document_type
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}\t{}%\t{}", report.id, report.completeness, document_type);
                reports.push(report);
            }
            Err(failure) => eprintln!("[error] {}: {}", failure.id, failure.error),
        }
    }

    manager.stop();

    if let Some(path) = cli.json {
        JsonExporter::new(path.clone())
            .export(&reports)
            .with_context(|| format!("Failed to export to: {}", path.display()))?;
    }

    Ok(())
}
