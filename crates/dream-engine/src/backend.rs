use std::io::Read;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dream_contracts::form::GenerationRequest;
use dream_contracts::page::PageConfig;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_MAX_CHARS: usize = 512;

/// Where generation requests go and how the server is controlled.
pub trait GenerationBackend {
    fn name(&self) -> &str;

    /// Sends `request` and returns the response body, unread.
    fn open_stream(&self, request: &GenerationRequest) -> Result<Box<dyn Read>>;

    /// Asks the server to stop the generation in flight.
    fn cancel(&self) -> Result<()>;

    fn page_config(&self) -> Result<PageConfig>;
}

/// The dream web server.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    method: Method,
    action: String,
    stream_http: HttpClient,
    control_http: HttpClient,
}

impl HttpBackend {
    /// Posts generations to `<base_url>/`, as the web form does.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_action(base_url, Method::POST, "/")
    }

    pub fn with_action(base_url: &str, method: Method, action: &str) -> Result<Self> {
        // a generation can take minutes, so only connecting is bounded
        let stream_http = HttpClient::builder()
            .timeout(None::<Duration>)
            .connect_timeout(CONTROL_TIMEOUT)
            .build()
            .context("failed building generation HTTP client")?;
        let control_http = HttpClient::builder()
            .timeout(CONTROL_TIMEOUT)
            .build()
            .context("failed building control HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            method,
            action: action.to_string(),
            stream_http,
            control_http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        "dream-http"
    }

    fn open_stream(&self, request: &GenerationRequest) -> Result<Box<dyn Read>> {
        let url = self.endpoint(&self.action);
        let body = serde_json::to_vec(request)?;
        tracing::debug!(
            "{} {url} ({} bytes, {} total steps)",
            self.method,
            body.len(),
            request.total_steps()
        );
        let response = self
            .stream_http
            .request(self.method.clone(), &url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .with_context(|| format!("generation request failed ({url})"))?;
        let response = ensure_success("generation", response)?;
        Ok(Box::new(response))
    }

    fn cancel(&self) -> Result<()> {
        let url = self.endpoint("/cancel");
        let response = self
            .control_http
            .get(&url)
            .send()
            .with_context(|| format!("cancel request failed ({url})"))?;
        ensure_success("cancel", response)?;
        Ok(())
    }

    fn page_config(&self) -> Result<PageConfig> {
        let url = self.endpoint("/config.js");
        let response = self
            .control_http
            .get(&url)
            .send()
            .with_context(|| format!("page config request failed ({url})"))?;
        let script = ensure_success("page config", response)?
            .text()
            .context("page config body read failed")?;
        PageConfig::from_script(&script)
            .with_context(|| format!("no config object in {url}"))
    }
}

fn ensure_success(what: &str, response: HttpResponse) -> Result<HttpResponse> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    bail!(
        "{what} request failed ({}): {}",
        status.as_u16(),
        truncate_text(&body, ERROR_BODY_MAX_CHARS)
    );
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
