//! Process command - extract every invoice in a shared folder.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use invx_core::service::{self, ErrorPayload, ProcessRequest, Response};
use invx_core::{Credentials, Pipeline, RunEvent, RunResult};

use super::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Shared folder link (e.g. https://drive.google.com/drive/folders/<id>)
    link: Option<String>,

    /// Copy the report to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

/// Exit code for a response status.
pub fn exit_code(status: u16) -> u8 {
    match status {
        200 | 204 => 0,
        400 => 2,
        _ => 1,
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let pipeline = match Credentials::from_env(config.llm.mode)
        .and_then(|credentials| Pipeline::from_config(config, credentials))
    {
        Ok(pipeline) => pipeline,
        Err(e) => return Ok(fail(Response::init_failure(&e))),
    };

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_message("Listing folder...");

    let observer = |event: &RunEvent| on_event(&pb, event);
    let request = ProcessRequest {
        drive_link: args.link,
    };
    let response = service::handle(&pipeline, request, &observer).await;
    pb.finish_and_clear();

    let status = response.status();
    match response {
        Response::Report { path, bytes, run } => {
            let written = match &args.output {
                Some(output) => {
                    fs::write(output, &bytes)?;
                    output.clone()
                }
                None => path,
            };
            print_summary(&run);
            println!(
                "{} Report written to {}",
                style("✓").green(),
                written.display()
            );
        }
        Response::NoReport { run } => {
            print_summary(&run);
            println!("{} No invoices extracted, no report produced.", style("ℹ").blue());
        }
        Response::Failure { payload, .. } => return Ok(fail_with(status, &payload)),
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(ExitCode::from(exit_code(status)))
}

fn on_event(pb: &ProgressBar, event: &RunEvent) {
    match event {
        RunEvent::Listed { count } => {
            pb.set_length(*count as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );
        }
        RunEvent::DocumentStarted { title, .. } => pb.set_message(title.clone()),
        RunEvent::DocumentRecorded { .. } | RunEvent::DocumentSkipped { .. } => pb.inc(1),
        RunEvent::ReportWritten { .. } => pb.set_message("Report written"),
    }
}

fn print_summary(run: &RunResult) {
    println!(
        "{} {} document(s) listed, {} invoice(s) extracted, {} skipped",
        style("ℹ").blue(),
        run.listed,
        style(run.records.len()).green(),
        style(run.skipped.len()).yellow()
    );
    for skipped in &run.skipped {
        println!("  {} {}: {}", style("-").yellow(), skipped.title, skipped.reason);
    }
}

fn fail(response: Response) -> ExitCode {
    match response {
        Response::Failure { status, payload } => fail_with(status, &payload),
        other => ExitCode::from(exit_code(other.status())),
    }
}

fn fail_with(status: u16, payload: &ErrorPayload) -> ExitCode {
    match serde_json::to_string(payload) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!("{}", payload.error),
    }
    ExitCode::from(exit_code(status))
}
