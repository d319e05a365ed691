use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}")]
    Status { url: String, status: StatusCode },
    #[error("browser: {0}")]
    Browser(String),
}

/// Retrieves the raw HTML of one page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// How pages are loaded for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Http,
    /// Rendered through a WebDriver-controlled browser.
    Browser,
}

impl FetchMode {
    pub fn from_flag(browser: bool) -> Self {
        if browser {
            FetchMode::Browser
        } else {
            FetchMode::Http
        }
    }
}

/// Plain HTTPS GET.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(HttpFetcher { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };

        let resp = self.client.get(url).send().await.map_err(request_err)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }
        let body = resp.text().await.map_err(request_err)?;
        debug!("Fetched {} ({} bytes)", url, body.len());
        Ok(body)
    }
}

/// Keeps a raw copy of every page the wrapped fetcher returns, as
/// `<dir>/<url with non-alphanumerics as _>_<YYYYmmdd_HHMMSS>.html`.
///
/// A snapshot that cannot be written is logged; the page is still returned.
pub struct SnapshotFetcher {
    inner: Arc<dyn PageFetcher>,
    dir: PathBuf,
}

impl SnapshotFetcher {
    pub fn new(inner: Arc<dyn PageFetcher>, dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        Ok(SnapshotFetcher {
            inner,
            dir: dir.to_path_buf(),
        })
    }
}

#[async_trait]
impl PageFetcher for SnapshotFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let html = self.inner.fetch(url).await?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let path = self.dir.join(snapshot_name(url, &stamp));
        match tokio::fs::write(&path, &html).await {
            Ok(()) => debug!("Saved {}", path.display()),
            Err(e) => warn!("Failed to save snapshot {}: {}", path.display(), e),
        }
        Ok(html)
    }
}

pub fn snapshot_name(url: &str, stamp: &str) -> String {
    let bare = url.rsplit("//").next().unwrap_or(url);
    let safe: String = bare
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}.html", safe, stamp)
}

/// Make `href` absolute against `origin` (e.g. `https://devpost.com`).
pub fn absolutize(origin: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!(
            "{}/{}",
            origin.trim_end_matches('/'),
            href.trim_start_matches('/')
        )
    }
}

/// `{base}?page={n}`, keeping any query already on `base`.
pub fn page_url(base: &str, page: usize) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}page={}", base, sep, page)
}

#[cfg(test)]
pub mod stub {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// In-memory fetcher: known URLs return their body, everything else 404s.
    #[derive(Default)]
    pub struct StubFetcher {
        pages: HashMap<String, String>,
        delays: HashMap<String, Duration>,
        pub calls: AtomicUsize,
        pub seen: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        pub fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(url.to_string());
            if let Some(d) = self.delays.get(url) {
                tokio::time::sleep(*d).await;
            }
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND,
            })
        }
    }
}
