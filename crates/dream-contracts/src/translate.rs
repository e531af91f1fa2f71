use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

pub const DEFAULT_TRANSLATE_ENDPOINT: &str = "https://openapi.youdao.com/api";
pub const SOURCE_LANG: &str = "zh-CHS";
pub const TARGET_LANG: &str = "en";
pub const SIGN_TYPE: &str = "v3";

/// Form parameters of a signed translation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationQuery {
    pub q: String,
    #[serde(rename = "appKey")]
    pub app_key: String,
    pub salt: String,
    pub from: String,
    pub to: String,
    pub sign: String,
    #[serde(rename = "signType")]
    pub sign_type: String,
    pub curtime: String,
}

impl TranslationQuery {
    /// Signs `text` at instant `now`: salt is the epoch in milliseconds,
    /// curtime the epoch rounded to seconds.
    pub fn new(text: &str, app_key: &str, app_secret: &str, now: DateTime<Utc>) -> Self {
        let salt = now.timestamp_millis().to_string();
        let curtime = (now.timestamp_millis() as f64 / 1000.0).round() as i64;
        let curtime = curtime.to_string();
        Self {
            q: text.to_string(),
            app_key: app_key.to_string(),
            sign: sign(app_key, text, &salt, &curtime, app_secret),
            salt,
            from: SOURCE_LANG.to_string(),
            to: TARGET_LANG.to_string(),
            sign_type: SIGN_TYPE.to_string(),
            curtime,
        }
    }
}

/// Shortens long queries for signing: the first 10 characters, the total
/// character count, then the last 10 characters.
pub fn truncate_query(query: &str) -> String {
    let chars = query.chars().collect::<Vec<_>>();
    let len = chars.len();
    if len <= 20 {
        return query.to_string();
    }
    let head = chars[..10].iter().collect::<String>();
    let tail = chars[len - 10..].iter().collect::<String>();
    format!("{head}{len}{tail}")
}

/// Lowercase hex SHA-256 of `appKey + truncate(q) + salt + curtime + secret`.
pub fn sign(app_key: &str, query: &str, salt: &str, curtime: &str, app_secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(app_key.as_bytes());
    hasher.update(truncate_query(query).as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(curtime.as_bytes());
    hasher.update(app_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Translated(String),
    Fallback { text: String, reason: String },
}

impl Translation {
    pub fn fallback(text: &str, reason: impl Into<String>) -> Self {
        Self::Fallback {
            text: text.to_string(),
            reason: reason.into(),
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Translation::Translated(text) | Translation::Fallback { text, .. } => text,
        }
    }
}

/// Picks the first translation out of a response body, falling back to
/// `original` when there is none.
pub fn interpret_response(original: &str, response: &Value) -> Translation {
    let first = response
        .get("translation")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty());
    match first {
        Some(text) => Translation::Translated(text.replacen('.', ",", 1)),
        None => {
            let code = response
                .get("errorCode")
                .and_then(Value::as_str)
                .unwrap_or("none");
            Translation::fallback(original, format!("no translation (errorCode {code})"))
        }
    }
}
