use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dream_contracts::form::parse_flag;
use dream_contracts::translate::DEFAULT_TRANSLATE_ENDPOINT;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:9090";
pub const DEFAULT_STATE_DIR: &str = ".dream";
pub const DEFAULT_TRANSLATE_TIMEOUT: Duration = Duration::from_secs(10);

const DOTENV_FILE: &str = "dream.env";
const FIELDS_FILE: &str = "fields.json";
const RESULTS_FILE: &str = "results.jsonl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateConfig {
    pub endpoint: String,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub timeout: Duration,
}

impl TranslateConfig {
    pub fn is_configured(&self) -> bool {
        self.app_key.is_some() && self.app_secret.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: String,
    pub state_dir: PathBuf,
    pub translate: TranslateConfig,
    /// Forces the post-processing capability flag instead of asking the server.
    pub gfpgan_available: Option<bool>,
}

impl ClientConfig {
    /// Layers `<state_dir>/dream.env` under the process environment.
    pub fn load(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        let dotenv = parse_dotenv(&state_dir.join(DOTENV_FILE));
        Self::resolve(state_dir, &dotenv, |key| env::var(key).ok())
    }

    /// Environment values win over dotenv values; blank values count as unset.
    pub fn resolve(
        state_dir: PathBuf,
        dotenv: &HashMap<String, String>,
        env_var: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let non_blank = |value: String| Some(value.trim().to_string()).filter(|v| !v.is_empty());
        let lookup = |key: &str| {
            env_var(key)
                .and_then(non_blank)
                .or_else(|| dotenv.get(key).cloned().and_then(non_blank))
        };

        let timeout = match lookup("DREAM_TRANSLATE_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs > 0.0 => Duration::from_secs_f64(secs),
                _ => {
                    tracing::warn!("ignoring DREAM_TRANSLATE_TIMEOUT_SECS={raw}");
                    DEFAULT_TRANSLATE_TIMEOUT
                }
            },
            None => DEFAULT_TRANSLATE_TIMEOUT,
        };

        Self {
            server_url: lookup("DREAM_SERVER_URL")
                .map(|value| value.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
            translate: TranslateConfig {
                endpoint: lookup("DREAM_TRANSLATE_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_TRANSLATE_ENDPOINT.to_string()),
                app_key: lookup("DREAM_TRANSLATE_APP_KEY"),
                app_secret: lookup("DREAM_TRANSLATE_APP_SECRET"),
                timeout,
            },
            gfpgan_available: lookup("DREAM_GFPGAN_AVAILABLE").and_then(|raw| parse_flag(&raw)),
            state_dir,
        }
    }

    pub fn fields_path(&self) -> PathBuf {
        self.state_dir.join(FIELDS_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.state_dir.join(RESULTS_FILE)
    }

    /// Resolves a server-relative URL (as results carry) against the server.
    pub fn resolve_url(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("data:") {
            return url.to_string();
        }
        format!("{}/{}", self.server_url, url.trim_start_matches('/'))
    }
}

/// Reads `KEY=value` lines; `#` comments, `export ` prefixes and matching
/// quotes are accepted. A missing file yields no entries.
pub fn parse_dotenv(path: &Path) -> HashMap<String, String> {
    let content = std::fs::read_to_string(path).unwrap_or_default();
    let mut vars = HashMap::new();
    for raw_line in content.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("export ") {
            line = stripped.trim();
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        vars.insert(key.to_string(), value.to_string());
    }
    vars
}
