use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::fetch::{FetchError, PageFetcher};
use crate::settings::Settings;

const IMPLICIT_WAIT_MS: u64 = 5000;
const OUTER_HTML: &str = "return document.documentElement.outerHTML;";

/// A headless Chrome session driven over the WebDriver HTTP protocol.
///
/// One browser has one current page, so navigation + read are serialized.
pub struct BrowserSession {
    client: reqwest::Client,
    endpoint: String,
    session_id: String,
    nav: Mutex<()>,
}

impl BrowserSession {
    /// Open a session, run `body`, and close the session on every exit path.
    pub async fn scoped<T, F, Fut>(settings: &Settings, body: F) -> Result<T>
    where
        F: FnOnce(Arc<BrowserSession>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = Arc::new(Self::open(settings).await?);
        let result = body(Arc::clone(&session)).await;
        if let Err(e) = session.close().await {
            warn!("Failed to close browser session {}: {}", session.session_id, e);
        }
        result
    }

    async fn open(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout() * 6)
            .build()?;
        let endpoint = settings.webdriver_url.trim_end_matches('/').to_string();

        let caps = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": ["--headless", "--disable-gpu", "--no-sandbox"]
                    }
                }
            }
        });
        let resp: Value = client
            .post(format!("{}/session", endpoint))
            .json(&caps)
            .send()
            .await
            .with_context(|| format!("WebDriver not reachable at {}", endpoint))?
            .json()
            .await?;
        let session_id = resp["value"]["sessionId"]
            .as_str()
            .ok_or_else(|| anyhow!("WebDriver refused session: {}", resp["value"]))?
            .to_string();
        info!("Browser session {} opened", session_id);

        let session = BrowserSession {
            client,
            endpoint,
            session_id,
            nav: Mutex::new(()),
        };
        // The driver already holds a browser; release it if setup fails.
        if let Err(e) = session
            .command("timeouts", json!({ "implicit": IMPLICIT_WAIT_MS }))
            .await
        {
            if let Err(close_err) = session.close().await {
                warn!("Failed to close browser session {}: {}", session.session_id, close_err);
            }
            return Err(e);
        }
        Ok(session)
    }

    async fn close(&self) -> Result<()> {
        self.client
            .delete(format!("{}/session/{}", self.endpoint, self.session_id))
            .send()
            .await?
            .error_for_status()?;
        info!("Browser session {} closed", self.session_id);
        Ok(())
    }

    async fn command(&self, path: &str, body: Value) -> Result<Value> {
        let url = format!("{}/session/{}/{}", self.endpoint, self.session_id, path);
        let resp: Value = self.client.post(&url).json(&body).send().await?.json().await?;
        if let Some(err) = resp["value"].get("error") {
            return Err(anyhow!(
                "{}: {} {}",
                path,
                err,
                resp["value"]["message"].as_str().unwrap_or("")
            ));
        }
        Ok(resp["value"].clone())
    }

    pub async fn page_source(&self, url: &str) -> Result<String> {
        let _guard = self.nav.lock().await;
        self.command("url", json!({ "url": url })).await?;
        let html = self
            .command("execute/sync", json!({ "script": OUTER_HTML, "args": [] }))
            .await?;
        html.as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("page source was not a string"))
    }
}

#[async_trait]
impl PageFetcher for BrowserSession {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.page_source(url)
            .await
            .map_err(|e| FetchError::Browser(format!("{}: {}", url, e)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::{delete, post};
    use axum::{Json, Router};

    use super::*;

    /// Minimal WebDriver: one session id, switchable failures, counted deletes.
    #[derive(Default)]
    struct Driver {
        fail_timeouts: bool,
        fail_delete: bool,
        deletes: AtomicUsize,
    }

    async fn new_session() -> Json<Value> {
        Json(json!({ "value": { "sessionId": "S1", "capabilities": {} } }))
    }

    async fn set_timeouts(State(d): State<Arc<Driver>>) -> (StatusCode, Json<Value>) {
        if d.fail_timeouts {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "value": { "error": "invalid argument", "message": "bad timeouts" } })),
            )
        } else {
            (StatusCode::OK, Json(json!({ "value": null })))
        }
    }

    async fn end_session(State(d): State<Arc<Driver>>) -> StatusCode {
        d.deletes.fetch_add(1, Ordering::SeqCst);
        if d.fail_delete {
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            StatusCode::OK
        }
    }

    async fn navigate() -> Json<Value> {
        Json(json!({ "value": null }))
    }

    async fn outer_html() -> Json<Value> {
        Json(json!({ "value": "<html><body><h1 id=\"app-title\">Moodboard</h1></body></html>" }))
    }

    async fn spawn_driver(driver: Arc<Driver>) -> Settings {
        let app = Router::new()
            .route("/session", post(new_session))
            .route("/session/{id}", delete(end_session))
            .route("/session/{id}/timeouts", post(set_timeouts))
            .route("/session/{id}/url", post(navigate))
            .route("/session/{id}/execute/sync", post(outer_html))
            .with_state(driver);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Settings {
            webdriver_url: format!("http://{}", addr),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn session_serves_pages_and_is_closed() {
        let driver = Arc::new(Driver::default());
        let settings = spawn_driver(Arc::clone(&driver)).await;

        let html = BrowserSession::scoped(&settings, |session| async move {
            anyhow::Ok(session.fetch("https://devpost.com/software/moodboard").await?)
        })
        .await
        .unwrap();

        assert!(html.contains("Moodboard"));
        assert_eq!(driver.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn session_is_closed_when_body_fails() {
        let driver = Arc::new(Driver::default());
        let settings = spawn_driver(Arc::clone(&driver)).await;

        let result: Result<()> =
            BrowserSession::scoped(&settings, |_session| async { Err(anyhow!("body failed")) }).await;

        assert_eq!(result.unwrap_err().to_string(), "body failed");
        assert_eq!(driver.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn session_is_closed_when_setup_fails() {
        let driver = Arc::new(Driver {
            fail_timeouts: true,
            ..Driver::default()
        });
        let settings = spawn_driver(Arc::clone(&driver)).await;
        let ran = AtomicUsize::new(0);

        let result = BrowserSession::scoped(&settings, |_session| async {
            ran.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(driver.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_failure_keeps_body_result() {
        let driver = Arc::new(Driver {
            fail_delete: true,
            ..Driver::default()
        });
        let settings = spawn_driver(Arc::clone(&driver)).await;

        let value = BrowserSession::scoped(&settings, |_session| async { anyhow::Ok(42) })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(driver.deletes.load(Ordering::SeqCst), 1);
    }
}
