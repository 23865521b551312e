//! Remote document folders: listing and fetching.

mod drive;

pub use drive::DriveClient;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DownloadError, InvxError, ListingError, ProviderError};
use crate::retry::RetryPolicy;

lazy_static! {
    static ref FOLDER_PATH_ID: Regex = Regex::new(r"/folders/([A-Za-z0-9_-]+)").unwrap();
    static ref QUERY_ID: Regex = Regex::new(r"[?&]id=([A-Za-z0-9_-]+)").unwrap();
}

/// A remote folder, resolved from a user-supplied link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFolder {
    pub id: String,
}

impl SourceFolder {
    /// Resolve a folder id from a `/folders/<id>` path or an `id=<id>`
    /// query parameter.
    pub fn parse(reference: &str) -> Result<Self, InvxError> {
        FOLDER_PATH_ID
            .captures(reference)
            .or_else(|| QUERY_ID.captures(reference))
            .map(|caps| SourceFolder {
                id: caps[1].to_string(),
            })
            .ok_or_else(|| InvxError::Reference(reference.to_string()))
    }
}

/// One listed document that has not been fetched yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Display title, also used as the local file name.
    pub title: String,
    /// Provider handle used to fetch the content.
    pub handle: String,
    /// MIME type reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Local copy of a fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub title: String,
    pub path: PathBuf,
    /// Lower-cased extension of the document title, if any.
    pub extension: Option<String>,
}

impl FetchedDocument {
    pub fn new(title: impl Into<String>, path: PathBuf) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        Self {
            title: title.into(),
            path,
            extension,
        }
    }

    /// Remove the local copy.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            debug!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}

/// Storage backend holding the documents.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Non-trashed documents directly inside the folder, in provider order.
    async fn list(&self, folder_id: &str) -> Result<Vec<DocumentRef>, ProviderError>;

    /// Raw content of one document.
    async fn fetch(&self, doc: &DocumentRef) -> Result<Vec<u8>, ProviderError>;
}

/// Resolves folder references and lists their documents.
pub struct SourceLister<'a> {
    provider: &'a dyn StorageProvider,
    retry: RetryPolicy,
}

impl<'a> SourceLister<'a> {
    pub fn new(provider: &'a dyn StorageProvider, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// List the documents of a folder reference.
    ///
    /// References in no supported shape yield an empty listing.
    pub async fn list(&self, reference: &str) -> Result<Vec<DocumentRef>, ListingError> {
        let folder = match SourceFolder::parse(reference) {
            Ok(folder) => folder,
            Err(e) => {
                warn!("{}", e);
                return Ok(Vec::new());
            }
        };

        let docs = self
            .retry
            .run("folder listing", || self.provider.list(&folder.id))
            .await
            .map_err(|e| ListingError {
                folder_id: folder.id.clone(),
                attempts: e.attempts,
                source: e.error,
            })?;

        info!("Found {} document(s) in folder {}", docs.len(), folder.id);
        Ok(docs)
    }
}

/// Materializes documents into a local directory.
pub struct DocumentFetcher<'a> {
    provider: &'a dyn StorageProvider,
    retry: RetryPolicy,
}

impl<'a> DocumentFetcher<'a> {
    pub fn new(provider: &'a dyn StorageProvider, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// Download one document into `dest_dir`, replacing any file of the
    /// same name. Nothing is left behind on failure.
    pub async fn fetch(
        &self,
        doc: &DocumentRef,
        dest_dir: &Path,
    ) -> Result<FetchedDocument, DownloadError> {
        let bytes = self
            .retry
            .run("download", || self.provider.fetch(doc))
            .await
            .map_err(|e| DownloadError::Provider {
                title: doc.title.clone(),
                attempts: e.attempts,
                source: e.error,
            })?;

        let io_err = |source| DownloadError::Io {
            title: doc.title.clone(),
            source,
        };

        if !dest_dir.exists() {
            debug!("Creating download directory at {}", dest_dir.display());
            tokio::fs::create_dir_all(dest_dir).await.map_err(io_err)?;
        }

        let path = dest_dir.join(local_file_name(&doc.title));
        let temp_path = dest_dir.join(format!(".{}.part", local_file_name(&doc.title)));

        if let Err(e) = tokio::fs::write(&temp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_err(e));
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(io_err(e));
        }

        debug!("Saved '{}' ({} bytes) to {}", doc.title, bytes.len(), path.display());
        Ok(FetchedDocument::new(doc.title.clone(), path))
    }
}

/// File name for a document title with path separators and control
/// characters replaced.
pub fn local_file_name(title: &str) -> String {
    let name: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    match name.trim_matches('.') {
        "" => "document".to_string(),
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_parse_folder_path() {
        let folder = SourceFolder::parse(
            "https://drive.google.com/drive/u/1/folders/1VdiwsTvc-ctYfTpp9yQdpndoNsjXUuOn?usp=sharing",
        )
        .unwrap();
        assert_eq!(folder.id, "1VdiwsTvc-ctYfTpp9yQdpndoNsjXUuOn");
    }

    #[test]
    fn test_parse_query_id() {
        let folder = SourceFolder::parse("https://drive.google.com/open?id=abc_DEF-123").unwrap();
        assert_eq!(folder.id, "abc_DEF-123");
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        for reference in ["", "not a link", "https://example.com/files/abc", "https://x/?uid=abc"] {
            assert!(
                matches!(SourceFolder::parse(reference), Err(InvxError::Reference(_))),
                "{reference}"
            );
        }
    }

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name("invoice 01.pdf"), "invoice 01.pdf");
        assert_eq!(local_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(local_file_name("a\\b:c.png"), "a_b_c.png");
        assert_eq!(local_file_name(" .. "), "document");
    }

    struct FlakyStorage {
        failures: AtomicU32,
        fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageProvider for FlakyStorage {
        async fn list(&self, folder_id: &str) -> Result<Vec<DocumentRef>, ProviderError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(ProviderError::Status {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            Ok(vec![DocumentRef {
                title: format!("{folder_id}.pdf"),
                handle: "h1".into(),
                mime_type: None,
            }])
        }

        async fn fetch(&self, doc: &DocumentRef) -> Result<Vec<u8>, ProviderError> {
            self.fetched.lock().unwrap().push(doc.handle.clone());
            if doc.handle == "broken" {
                return Err(ProviderError::Response("truncated".into()));
            }
            Ok(format!("content of {}", doc.title).into_bytes())
        }
    }

    fn storage(failures: u32) -> FlakyStorage {
        FlakyStorage {
            failures: AtomicU32::new(failures),
            fetched: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_unknown_reference_lists_nothing() {
        let provider = storage(0);
        let lister = SourceLister::new(&provider, RetryPolicy::none());
        assert!(lister.list("nothing to see").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_retries_then_surfaces() {
        let provider = storage(5);
        let lister = SourceLister::new(&provider, RetryPolicy::default());
        let err = lister.list("https://x/folders/abc").await.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.folder_id, "abc");
    }

    #[tokio::test]
    async fn test_fetch_creates_dir_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = tmp.path().join("nested").join("downloads");
        let provider = storage(0);
        let fetcher = DocumentFetcher::new(&provider, RetryPolicy::none());

        let doc = DocumentRef {
            title: "Invoice.PDF".into(),
            handle: "h1".into(),
            mime_type: Some("application/pdf".into()),
        };
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("Invoice.PDF"), b"stale").unwrap();

        let fetched = fetcher.fetch(&doc, &dest).await.unwrap();
        assert_eq!(fetched.extension.as_deref(), Some("pdf"));
        assert_eq!(std::fs::read(&fetched.path).unwrap(), b"content of Invoice.PDF");

        fetched.discard().await;
        assert_eq!(std::fs::read_dir(&dest).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = storage(0);
        let fetcher = DocumentFetcher::new(&provider, RetryPolicy::none());

        let doc = DocumentRef {
            title: "scan.png".into(),
            handle: "broken".into(),
            mime_type: None,
        };
        let err = fetcher.fetch(&doc, tmp.path()).await.unwrap_err();

        assert!(matches!(err, DownloadError::Provider { attempts: 1, .. }));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
