//! Tabular report of extracted invoices.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::ReportError;
use crate::models::config::ReportConfig;
use crate::models::invoice::{INVOICE_FIELDS, InvoiceRecord, NOT_AVAILABLE};

/// Columns after the invoice fields.
pub const EXTRA_COLUMNS: [&str; 2] = ["TotalAmountINR", "SourceFile"];

/// Writes one CSV row per invoice record.
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    output_dir: PathBuf,
    filename: String,
}

impl ReportBuilder {
    pub fn new(output_dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            filename: filename.into(),
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(config.output_dir.clone(), config.filename.clone())
    }

    /// Final location of the report.
    pub fn path(&self) -> PathBuf {
        self.output_dir.join(&self.filename)
    }

    /// Write the report, replacing any previous one.
    ///
    /// Returns `None` without touching the filesystem when there are no
    /// records.
    pub fn build(&self, records: &[InvoiceRecord]) -> Result<Option<PathBuf>, ReportError> {
        if records.is_empty() {
            info!("No invoice records, skipping report");
            return Ok(None);
        }

        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.path();
        let tmp = self.output_dir.join(format!(".{}.tmp", self.filename));

        if let Err(e) = write_rows(&tmp, records) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        std::fs::rename(&tmp, &path)?;

        info!("Wrote {} invoice(s) to {}", records.len(), path.display());
        Ok(Some(path))
    }

    /// [`build`](Self::build) on the blocking pool.
    pub async fn write(&self, records: Vec<InvoiceRecord>) -> Result<Option<PathBuf>, ReportError> {
        let builder = self.clone();
        tokio::task::spawn_blocking(move || builder.build(&records)).await?
    }
}

/// Header row: the invoice fields followed by [`EXTRA_COLUMNS`].
pub fn header() -> Vec<&'static str> {
    INVOICE_FIELDS.iter().chain(EXTRA_COLUMNS.iter()).copied().collect()
}

fn row(record: &InvoiceRecord) -> Result<Vec<String>, ReportError> {
    let items = if record.items_list.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        serde_json::to_string_pretty(&record.items_list)?
    };

    Ok(vec![
        record.invoice_number.clone(),
        record.invoice_date.clone(),
        record.vendor_name.clone(),
        record.customer_name.clone(),
        record.gstin.clone(),
        record.subtotal.to_string(),
        record.tax.to_string(),
        record.total_amount.to_string(),
        record.currency.clone(),
        record.payment_terms.clone(),
        items,
        record
            .total_amount_inr
            .map(|a| a.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        record.source_file.clone().unwrap_or_default(),
    ])
}

fn write_rows(path: &Path, records: &[InvoiceRecord]) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(header())?;
    for record in records {
        wtr.write_record(row(record)?)?;
    }
    wtr.flush()?;
    debug!("Flushed {} row(s) to {}", records.len(), path.display());
    Ok(())
}
