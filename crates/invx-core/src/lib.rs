//! Core library for invoice extraction from shared document folders.
//!
//! This crate provides:
//! - Folder listing and document download with bounded retries
//! - Text extraction from PDFs and OCR of scanned images
//! - Structured invoice extraction with a language model (single-shot or
//!   tool-using agent with currency conversion)
//! - CSV report generation and the folder-processing pipeline

pub mod currency;
pub mod error;
pub mod invoice;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod report;
pub mod retry;
pub mod service;
pub mod source;
pub mod text;

pub use currency::{CurrencyConverter, RateProvider};
pub use error::{InvxError, Result};
pub use invoice::{ExtractionResult, StructuredExtractor};
pub use llm::LlmProvider;
pub use models::config::{Credentials, ExtractionMode, InvxConfig};
pub use models::invoice::{Amount, InvoiceRecord, LineItem};
pub use ocr::OcrProvider;
pub use pipeline::{Pipeline, RunEvent, RunObserver, RunResult, SkipReason, SkippedDocument};
pub use report::ReportBuilder;
pub use retry::RetryPolicy;
pub use service::{ProcessRequest, Response};
pub use source::{DocumentRef, StorageProvider};
pub use text::{DocumentKind, TextExtractor};
