//! Side-file retrieval over HTTP or from a local site root.

use reqwest::Client;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::restore::decode_text;

/// Retrieves the text of a side-file given the reference stored on a record.
///
/// Any non-success outcome (missing file, non-2xx status, transport error)
/// is an error; callers decide how to recover.
pub trait SideFileFetcher: Send + Sync {
    /// Fetch the side-file behind `reference` and decode it as text.
    fn fetch(&self, reference: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

impl<T: SideFileFetcher> SideFileFetcher for &T {
    fn fetch(&self, reference: &str) -> impl Future<Output = Result<String, FetchError>> + Send {
        (**self).fetch(reference)
    }
}

/// Fetches side-files with HTTP GET relative to a base URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
}

impl HttpFetcher {
    /// Create a fetcher with a default client.
    pub fn new(base_url: Url) -> Result<Self, FetchError> {
        let client = Client::builder().build().map_err(FetchError::Client)?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a fetcher around an existing client.
    ///
    /// The base path gets a trailing `/` so references resolve below its last
    /// segment instead of replacing it.
    pub fn with_client(client: Client, mut base_url: Url) -> Self {
        if !base_url.cannot_be_a_base() && !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    /// Base URL references are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a record reference to the URL that will be requested.
    ///
    /// Absolute `http(s)` references are used as-is. Anything else is resolved
    /// under the base URL, with a leading `/` treated as site-relative.
    pub fn resolve(&self, reference: &str) -> Result<Url, FetchError> {
        if let Ok(url) = Url::parse(reference)
            && matches!(url.scheme(), "http" | "https")
        {
            return Ok(url);
        }
        self.base_url
            .join(reference.trim_start_matches('/'))
            .map_err(|err| FetchError::InvalidReference {
                reference: reference.to_string(),
                reason: err.to_string(),
            })
    }
}

impl SideFileFetcher for HttpFetcher {
    async fn fetch(&self, reference: &str) -> Result<String, FetchError> {
        let url = self.resolve(reference)?;
        debug!(%url, "Fetching side-file.");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }
}

// References are resolved as URLs under this placeholder, then mapped onto the root
const SITE_BASE: &str = "file:///site/";
const SITE_BASE_PATH: &str = "/site";

/// Reads side-files from a site root directory.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    root: PathBuf,
}

impl LocalFetcher {
    /// Create a fetcher reading below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Site root references are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a record reference to a path below the root.
    ///
    /// References are read as URL paths: percent-escapes are decoded and any
    /// `?query` or `#fragment` is dropped. They may not climb out of the root.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf, FetchError> {
        let invalid = |reason: String| FetchError::InvalidReference {
            reference: reference.to_string(),
            reason,
        };

        let base = Url::parse(SITE_BASE).map_err(|err| invalid(err.to_string()))?;
        let url = base
            .join(reference.trim_start_matches('/'))
            .map_err(|err| invalid(err.to_string()))?;
        if url.scheme() != "file" {
            return Err(invalid("not a site path".to_string()));
        }
        let decoded = url
            .to_file_path()
            .map_err(|()| invalid("not a site path".to_string()))?;

        let relative = decoded
            .strip_prefix(SITE_BASE_PATH)
            .map_err(|_| invalid("path escapes the site root".to_string()))?;
        let inside = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !inside || relative.as_os_str().is_empty() {
            return Err(invalid("path escapes the site root".to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl SideFileFetcher for LocalFetcher {
    async fn fetch(&self, reference: &str) -> Result<String, FetchError> {
        let path = self.resolve(reference)?;
        debug!(path = %path.display(), "Reading side-file.");
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| FetchError::Io { path, source })?;
        Ok(decode_text(bytes))
    }
}
