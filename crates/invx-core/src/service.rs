//! "Process a folder" request handling.
//!
//! Maps pipeline outcomes onto status codes: 200 with the report bytes,
//! 204 when no invoice was extracted, 400 for a missing or unusable folder
//! reference and 500 for initialization or workflow faults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{InitError, InvxError};
use crate::pipeline::{Pipeline, RunObserver, RunResult};
use crate::source::SourceFolder;

/// Request body: `{"drive_link": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub drive_link: Option<String>,
}

/// Structured error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

/// Outcome of a request.
#[derive(Debug)]
pub enum Response {
    /// Report produced; its bytes and location.
    Report { path: PathBuf, bytes: Vec<u8>, run: RunResult },
    /// The run completed without extracting any invoice.
    NoReport { run: RunResult },
    Failure { status: u16, payload: ErrorPayload },
}

impl Response {
    pub fn status(&self) -> u16 {
        match self {
            Response::Report { .. } => 200,
            Response::NoReport { .. } => 204,
            Response::Failure { status, .. } => *status,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Response::Failure {
            status: 400,
            payload: ErrorPayload { error: message.into() },
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Response::Failure {
            status: 500,
            payload: ErrorPayload { error: message.into() },
        }
    }

    /// Pipeline assembly failed; no request can be served.
    pub fn init_failure(err: &InitError) -> Self {
        error!("Initialization failed: {}", err);
        Self::internal(format!("pipeline initialization failed: {err}"))
    }

    /// The run the response describes, when one completed.
    pub fn run(&self) -> Option<&RunResult> {
        match self {
            Response::Report { run, .. } | Response::NoReport { run } => Some(run),
            Response::Failure { .. } => None,
        }
    }

    /// Map a finished run onto a response, loading the report bytes.
    pub fn from_run(result: Result<RunResult, InvxError>) -> Self {
        let run = match result {
            Ok(run) => run,
            Err(InvxError::Reference(reference)) => {
                return Self::bad_request(format!("unrecognized folder link: {reference}"));
            }
            Err(e) => {
                error!("Run failed: {}", e);
                return Self::internal(e.to_string());
            }
        };

        match run.report.clone() {
            None => Response::NoReport { run },
            Some(path) => match std::fs::read(&path) {
                Ok(bytes) => Response::Report { path, bytes, run },
                Err(e) => Self::internal(format!("could not read report {}: {e}", path.display())),
            },
        }
    }
}

/// Parse a JSON request body and handle it.
pub async fn handle_json(pipeline: &Pipeline, body: &str, observer: &dyn RunObserver) -> Response {
    match serde_json::from_str::<ProcessRequest>(body) {
        Ok(request) => handle(pipeline, request, observer).await,
        Err(e) => Response::bad_request(format!("invalid request body: {e}")),
    }
}

/// Validate the folder reference and run the pipeline once.
pub async fn handle(pipeline: &Pipeline, request: ProcessRequest, observer: &dyn RunObserver) -> Response {
    let Some(link) = request
        .drive_link
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
    else {
        return Response::bad_request("drive_link is required");
    };

    if let Err(e) = SourceFolder::parse(&link) {
        return Response::from_run(Err(e));
    }

    info!("Processing folder {}", link);
    Response::from_run(pipeline.process_folder_with(&link, observer).await)
}
