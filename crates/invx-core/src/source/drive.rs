//! Google Drive v3 REST adapter.

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::{DocumentRef, StorageProvider};
use crate::error::{InitError, ProviderError};

const PAGE_SIZE: &str = "1000";

/// Drive client authenticated with a pre-issued OAuth access token.
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for DriveClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: Option<String>,
}

impl DriveClient {
    pub fn new(token: String, api_base: &str) -> Result<Self, InitError> {
        let base_url = Url::parse(api_base).map_err(|e| InitError::Client {
            provider: "drive",
            reason: format!("invalid API base '{api_base}': {e}"),
        })?;
        let http = Client::builder()
            .user_agent(concat!("invx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InitError::Client {
                provider: "drive",
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    fn files_url(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Response(format!("invalid Drive URL: {e}")))
    }

    async fn check(res: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        Err(ProviderError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// Drive query selecting the non-trashed direct children of a folder.
pub(crate) fn children_query(folder_id: &str) -> String {
    format!("'{}' in parents and trashed=false", folder_id.replace('\'', "\\'"))
}

#[async_trait]
impl StorageProvider for DriveClient {
    async fn list(&self, folder_id: &str) -> Result<Vec<DocumentRef>, ProviderError> {
        let url = self.files_url("files")?;
        let query = children_query(folder_id);
        let mut docs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(url.clone())
                .bearer_auth(&self.token)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", "nextPageToken,files(id,name,mimeType)"),
                    ("pageSize", PAGE_SIZE),
                    ("orderBy", "name"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let res = Self::check(request.send().await?).await?;
            let page: FileList = res
                .json()
                .await
                .map_err(|e| ProviderError::Response(format!("invalid file list: {e}")))?;

            debug!("Drive page with {} file(s)", page.files.len());
            docs.extend(page.files.into_iter().map(|f| DocumentRef {
                title: f.name,
                handle: f.id,
                mime_type: f.mime_type,
            }));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(docs)
    }

    async fn fetch(&self, doc: &DocumentRef) -> Result<Vec<u8>, ProviderError> {
        let url = self.files_url(&format!("files/{}", doc.handle))?;
        let res = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let bytes = Self::check(res).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_query_escapes_quotes() {
        assert_eq!(children_query("abc"), "'abc' in parents and trashed=false");
        assert_eq!(children_query("a'b"), "'a\\'b' in parents and trashed=false");
    }

    #[test]
    fn test_rejects_invalid_base() {
        let err = DriveClient::new("t".into(), "not a url").unwrap_err();
        assert!(matches!(err, InitError::Client { provider: "drive", .. }));
    }

    #[test]
    fn test_debug_hides_token() {
        let client = DriveClient::new("secret".into(), "https://www.googleapis.com/drive/v3/").unwrap();
        assert!(!format!("{client:?}").contains("secret"));
    }

    #[test]
    fn test_file_list_parses() {
        let page: FileList = serde_json::from_str(
            r#"{"files":[{"id":"1","name":"a.pdf","mimeType":"application/pdf"}],"nextPageToken":"p2"}"#,
        )
        .unwrap();
        assert_eq!(page.files[0].name, "a.pdf");
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));
    }
}
