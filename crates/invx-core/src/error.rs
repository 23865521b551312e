//! Error types for the invx-core library.

use thiserror::Error;

/// Main error type for the invx library.
#[derive(Error, Debug)]
pub enum InvxError {
    /// A collaborator could not be constructed.
    #[error("initialization error: {0}")]
    Init(#[from] InitError),

    /// The folder reference matched no supported addressing convention.
    #[error("unrecognized folder reference: {0}")]
    Reference(String),

    /// Listing the folder failed after all retries.
    #[error("listing error: {0}")]
    Listing(#[from] ListingError),

    /// Downloading a document failed after all retries.
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// Structured extraction error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Report could not be written.
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal errors raised while assembling the pipeline.
#[derive(Error, Debug)]
pub enum InitError {
    /// A required credential is absent from the environment.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// An HTTP client or endpoint could not be set up.
    #[error("failed to build {provider} client: {reason}")]
    Client {
        provider: &'static str,
        reason: String,
    },
}

/// Faults reported by a remote collaborator (storage, OCR, LLM, rates).
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Transport-level failure.
    #[error("request failed: {0}")]
    Http(reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Response(String),
}

impl From<reqwest::Error> for ProviderError {
    /// Drops the request URL from the error.
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Http(e.without_url())
    }
}

/// Folder listing failed.
#[derive(Error, Debug)]
#[error("failed to list folder {folder_id} after {attempts} attempt(s): {source}")]
pub struct ListingError {
    pub folder_id: String,
    pub attempts: u32,
    #[source]
    pub source: ProviderError,
}

/// Document download failed.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Provider fault after all retries.
    #[error("failed to fetch '{title}' after {attempts} attempt(s): {source}")]
    Provider {
        title: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// Writing the local copy failed.
    #[error("failed to store '{title}': {source}")]
    Io {
        title: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors related to structured invoice extraction.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The language model could not be reached.
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ProviderError),

    /// No JSON object could be recovered from the model response.
    #[error("no JSON object recoverable from response: {0}")]
    NoJson(String),

    /// The recovered JSON is not an invoice object.
    #[error("response is not an invoice object: {0}")]
    NotAnObject(String),

    /// The agent loop ran out of turns without a final answer.
    #[error("agent produced no final answer within {0} turns")]
    BudgetExhausted(usize),
}

/// Errors writing the report artifact.
#[derive(Error, Debug)]
pub enum ReportError {
    /// I/O failure creating or replacing the report file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Items list could not be rendered.
    #[error("failed to render items: {0}")]
    Items(#[from] serde_json::Error),

    /// The writer task panicked or was cancelled.
    #[error("report task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for the invx library.
pub type Result<T> = std::result::Result<T, InvxError>;
