use anyhow::{bail, Context, Result};
use dream_contracts::translate::{interpret_response, Translation, TranslationQuery};
use reqwest::blocking::Client as HttpClient;
use serde_json::Value;

use crate::config::TranslateConfig;

/// Turns a prompt into the server's language. Never fails: on any problem
/// the original text comes back.
pub trait Translator {
    fn translate(&self, text: &str) -> String;
}

impl<T: Translator + ?Sized> Translator for Box<T> {
    fn translate(&self, text: &str) -> String {
        (**self).translate(text)
    }
}

/// Sends prompts through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Translator for Passthrough {
    fn translate(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Client for the signed Youdao text translation API.
#[derive(Debug, Clone)]
pub struct YoudaoTranslator {
    endpoint: String,
    app_key: String,
    app_secret: String,
    http: HttpClient,
}

impl YoudaoTranslator {
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .context("failed building translation HTTP client")?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            app_key: config.app_key.clone().unwrap_or_default(),
            app_secret: config.app_secret.clone().unwrap_or_default(),
            http,
        })
    }

    /// Same as [`Translator::translate`] but reports why a fallback happened.
    pub fn translate_detailed(&self, text: &str) -> Translation {
        if text.trim().is_empty() {
            return Translation::fallback(text, "empty prompt");
        }
        if self.app_key.is_empty() {
            return Translation::fallback(text, "no app key configured");
        }
        match self.request(text) {
            Ok(response) => interpret_response(text, &response),
            Err(err) => Translation::fallback(text, format!("{err:#}")),
        }
    }

    fn request(&self, text: &str) -> Result<Value> {
        let query = TranslationQuery::new(text, &self.app_key, &self.app_secret, chrono::Utc::now());
        let response = self
            .http
            .post(&self.endpoint)
            .form(&query)
            .send()
            .with_context(|| format!("translation request failed ({})", self.endpoint))?;
        let status = response.status();
        let body = response
            .text()
            .context("translation response body read failed")?;
        if !status.is_success() {
            bail!("translation request failed ({})", status.as_u16());
        }
        serde_json::from_str(&body).context("translation returned invalid JSON payload")
    }
}

impl Translator for YoudaoTranslator {
    fn translate(&self, text: &str) -> String {
        match self.translate_detailed(text) {
            Translation::Translated(translated) => {
                tracing::info!("translated prompt: {translated}");
                translated
            }
            Translation::Fallback { text, reason } => {
                tracing::warn!("using untranslated prompt: {reason}");
                text
            }
        }
    }
}
