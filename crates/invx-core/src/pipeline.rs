//! Folder-to-report workflow.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::currency::{CurrencyApiClient, RateProvider};
use crate::error::{InitError, Result};
use crate::invoice::StructuredExtractor;
use crate::llm::{GeminiClient, LlmProvider};
use crate::models::config::{Credentials, InvxConfig};
use crate::models::invoice::InvoiceRecord;
use crate::ocr::{OcrProvider, VisionClient};
use crate::report::ReportBuilder;
use crate::retry::RetryPolicy;
use crate::source::{DocumentFetcher, DocumentRef, DriveClient, SourceLister, StorageProvider};
use crate::text::{DocumentKind, TextExtractor};

/// Why a listed document produced no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// No text strategy for this file type.
    Unsupported(String),
    /// Fetching failed after retries.
    Download(String),
    /// Text extraction produced nothing.
    NoText,
    /// The model output could not be turned into a record.
    Extraction(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unsupported(ext) if ext.is_empty() => f.write_str("unsupported file type"),
            SkipReason::Unsupported(ext) => write!(f, "unsupported file type .{ext}"),
            SkipReason::Download(e) => write!(f, "download failed: {e}"),
            SkipReason::NoText => f.write_str("no text could be extracted"),
            SkipReason::Extraction(e) => write!(f, "extraction failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDocument {
    pub title: String,
    pub reason: SkipReason,
}

/// Outcome of one folder run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Number of documents the folder listing returned.
    pub listed: usize,
    /// Records in listing order, each tagged with its source title.
    pub records: Vec<InvoiceRecord>,
    pub skipped: Vec<SkippedDocument>,
    /// Report location, `None` when nothing was extracted.
    pub report: Option<PathBuf>,
}

/// Progress notifications emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Listed { count: usize },
    DocumentStarted { index: usize, title: String },
    DocumentRecorded { title: String },
    DocumentSkipped { title: String, reason: SkipReason },
    ReportWritten { path: PathBuf },
}

/// Receives [`RunEvent`]s.
pub trait RunObserver: Send + Sync {
    fn on_event(&self, event: &RunEvent);
}

impl<F> RunObserver for F
where
    F: Fn(&RunEvent) + Send + Sync,
{
    fn on_event(&self, event: &RunEvent) {
        self(event)
    }
}

/// Collaborators and settings for processing folders.
///
/// Built once and shared by reference; runs keep no state in it.
pub struct Pipeline {
    storage: Arc<dyn StorageProvider>,
    ocr: Arc<dyn OcrProvider>,
    llm: Arc<dyn LlmProvider>,
    rates: Option<Arc<dyn RateProvider>>,
    retry: RetryPolicy,
    config: InvxConfig,
}

impl Pipeline {
    pub fn new(
        config: InvxConfig,
        storage: Arc<dyn StorageProvider>,
        ocr: Arc<dyn OcrProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            storage,
            ocr,
            llm,
            rates: None,
            retry: RetryPolicy::from(&config.retry),
            config,
        }
    }

    pub fn with_rates(mut self, rates: Arc<dyn RateProvider>) -> Self {
        self.rates = Some(rates);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Build the remote adapters from configuration and credentials.
    pub fn from_config(config: InvxConfig, credentials: Credentials) -> std::result::Result<Self, InitError> {
        let storage = DriveClient::new(credentials.drive_access_token, &config.storage.api_base)?;
        let ocr = VisionClient::new(credentials.vision_api_key, &config.ocr)?;
        let llm = GeminiClient::new(credentials.gemini_api_key, &config.llm)?;
        let rates = credentials
            .currency_api_key
            .map(|key| CurrencyApiClient::new(key, &config.currency))
            .transpose()?;

        info!(
            "Pipeline ready (model {}, {:?} mode)",
            config.llm.model, config.llm.mode
        );

        let pipeline = Self::new(config, Arc::new(storage), Arc::new(ocr), Arc::new(llm));
        Ok(match rates {
            Some(rates) => pipeline.with_rates(Arc::new(rates)),
            None => pipeline,
        })
    }

    pub fn config(&self) -> &InvxConfig {
        &self.config
    }

    /// Structured extractor configured like the folder runs.
    pub fn extractor(&self) -> StructuredExtractor<'_> {
        StructuredExtractor::from_config(
            self.llm.as_ref(),
            self.rates.as_deref(),
            &self.config.llm,
            &self.config.currency,
        )
    }

    /// Text extractor backed by the configured OCR service.
    pub fn text_extractor(&self) -> TextExtractor<'_> {
        TextExtractor::new(self.ocr.as_ref())
    }

    pub async fn process_folder(&self, reference: &str) -> Result<RunResult> {
        self.process_folder_with(reference, &|_: &RunEvent| {}).await
    }

    /// List, fetch and extract every document of the folder, then write
    /// the report.
    ///
    /// Per-document failures are recorded as skips; listing, scratch
    /// directory and report failures end the run.
    pub async fn process_folder_with(
        &self,
        reference: &str,
        observer: &dyn RunObserver,
    ) -> Result<RunResult> {
        let docs = SourceLister::new(self.storage.as_ref(), self.retry)
            .list(reference)
            .await?;
        observer.on_event(&RunEvent::Listed { count: docs.len() });

        let root = &self.config.storage.download_dir;
        tokio::fs::create_dir_all(root).await?;
        let scratch = tempfile::Builder::new().prefix("run-").tempdir_in(root)?;
        debug!("Downloading into {}", scratch.path().display());

        let fetcher = DocumentFetcher::new(self.storage.as_ref(), self.retry);
        let text = self.text_extractor();
        let extractor = self.extractor();

        let mut records = Vec::new();
        let mut skipped = Vec::new();
        for (index, doc) in docs.iter().enumerate() {
            info!("[{}/{}] {}", index + 1, docs.len(), doc.title);
            observer.on_event(&RunEvent::DocumentStarted {
                index,
                title: doc.title.clone(),
            });

            match self
                .process_document(doc, scratch.path(), &fetcher, &text, &extractor)
                .await
            {
                Ok(record) => {
                    observer.on_event(&RunEvent::DocumentRecorded {
                        title: doc.title.clone(),
                    });
                    records.push(record);
                }
                Err(reason) => {
                    warn!("Skipping {}: {}", doc.title, reason);
                    observer.on_event(&RunEvent::DocumentSkipped {
                        title: doc.title.clone(),
                        reason: reason.clone(),
                    });
                    skipped.push(SkippedDocument {
                        title: doc.title.clone(),
                        reason,
                    });
                }
            }
        }

        if let Err(e) = scratch.close() {
            warn!("Could not remove download directory: {}", e);
        }

        let report = ReportBuilder::from_config(&self.config.report)
            .write(records.clone())
            .await?;
        if let Some(path) = &report {
            observer.on_event(&RunEvent::ReportWritten { path: path.clone() });
        }

        info!(
            "Run finished: {} listed, {} recorded, {} skipped",
            docs.len(),
            records.len(),
            skipped.len()
        );

        Ok(RunResult {
            listed: docs.len(),
            records,
            skipped,
            report,
        })
    }

    async fn process_document(
        &self,
        doc: &DocumentRef,
        dir: &Path,
        fetcher: &DocumentFetcher<'_>,
        text: &TextExtractor<'_>,
        extractor: &StructuredExtractor<'_>,
    ) -> std::result::Result<InvoiceRecord, SkipReason> {
        let extension = Path::new(&doc.title)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        if DocumentKind::from_extension(extension.as_deref()) == DocumentKind::Unsupported {
            return Err(SkipReason::Unsupported(extension.unwrap_or_default()));
        }

        let fetched = fetcher
            .fetch(doc, dir)
            .await
            .map_err(|e| SkipReason::Download(e.to_string()))?;
        let content = text.extract(&fetched).await;
        fetched.discard().await;

        let content = match content {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Err(SkipReason::NoText),
        };

        let result = extractor
            .extract(&content)
            .await
            .map_err(|e| SkipReason::Extraction(e.to_string()))?;
        debug!(
            "Extracted {} in {}ms over {} turn(s)",
            result.record.invoice_number, result.processing_time_ms, result.turns
        );

        Ok(result.record.with_source(doc.title.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::Unsupported("docx".into()).to_string(), "unsupported file type .docx");
        assert_eq!(SkipReason::Unsupported(String::new()).to_string(), "unsupported file type");
        assert_eq!(SkipReason::NoText.to_string(), "no text could be extracted");
    }

    #[test]
    fn test_skip_reason_serializes_tagged() {
        let value = serde_json::to_value(SkipReason::Download("HTTP 404".into())).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "download", "detail": "HTTP 404"}));
        let value = serde_json::to_value(SkipReason::NoText).unwrap();
        assert_eq!(value, serde_json::json!({"kind": "no_text"}));
    }

    #[test]
    fn test_from_config_builds_rates_only_with_key() {
        let creds = |currency: Option<&str>| Credentials {
            drive_access_token: "d".into(),
            vision_api_key: "v".into(),
            gemini_api_key: "g".into(),
            currency_api_key: currency.map(str::to_string),
        };

        let plain = Pipeline::from_config(InvxConfig::default(), creds(None)).unwrap();
        assert!(plain.rates.is_none());

        let with_rates = Pipeline::from_config(InvxConfig::default(), creds(Some("c"))).unwrap();
        assert!(with_rates.rates.is_some());
    }
}
