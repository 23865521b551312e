//! Extract command - run text and structured extraction on one local file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, ValueEnum};
use console::style;
use tracing::info;

use invx_core::service::Response;
use invx_core::source::FetchedDocument;
use invx_core::{Credentials, DocumentKind, ExtractionMode, Pipeline};

use super::load_config;
use super::process::exit_code;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// Extraction strategy (defaults to the configured one)
    #[arg(short, long, value_enum)]
    mode: Option<Mode>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print normalization warnings
    #[arg(long)]
    show_warnings: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Mode {
    /// One JSON-only completion
    SingleShot,
    /// Tool-using agent with currency conversion
    Agent,
}

impl From<Mode> for ExtractionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::SingleShot => ExtractionMode::SingleShot,
            Mode::Agent => ExtractionMode::Agent,
        }
    }
}

pub async fn run(args: ExtractArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if let Some(mode) = args.mode {
        config.llm.mode = mode.into();
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let title = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let doc = FetchedDocument::new(title.clone(), args.input.clone());
    if DocumentKind::from_extension(doc.extension.as_deref()) == DocumentKind::Unsupported {
        anyhow::bail!(
            "Unsupported file format: {}",
            doc.extension.as_deref().unwrap_or("(none)")
        );
    }

    let pipeline = match Credentials::from_env(config.llm.mode)
        .and_then(|credentials| Pipeline::from_config(config, credentials))
    {
        Ok(pipeline) => pipeline,
        Err(e) => {
            let response = Response::init_failure(&e);
            eprintln!("{} {}", style("✗").red(), e);
            return Ok(ExitCode::from(exit_code(response.status())));
        }
    };

    info!("Extracting text from {}", args.input.display());
    let text = match pipeline.text_extractor().extract(&doc).await {
        Some(text) if !text.trim().is_empty() => text,
        _ => anyhow::bail!("No text could be extracted from {}", args.input.display()),
    };

    let result = pipeline.extractor().extract(&text).await?;
    let record = result.record.with_source(title);

    if args.show_warnings {
        for warning in &result.warnings {
            eprintln!("{} {}", style("⚠").yellow(), warning);
        }
    }

    let output = serde_json::to_string_pretty(&record)?;
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    info!(
        "Extraction took {}ms over {} model turn(s)",
        result.processing_time_ms, result.turns
    );
    Ok(ExitCode::SUCCESS)
}
