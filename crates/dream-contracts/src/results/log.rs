use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::gallery::{Gallery, ResultRecord};

/// Append-only journal of rendered results (`results.jsonl`).
///
/// Each line is the record's fields plus a `ts` stamp, one compact JSON
/// object per line.
#[derive(Debug, Clone)]
pub struct ResultLog {
    path: PathBuf,
}

impl ResultLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &ResultRecord) -> anyhow::Result<()> {
        let mut row = match serde_json::to_value(record)? {
            Value::Object(row) => row,
            _ => Map::new(),
        };
        row.insert("ts".to_string(), Value::String(now_utc_iso()));

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(&row)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed opening {}", self.path.display()))?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Records in the order they were appended. Unparseable lines are skipped.
    pub fn read_all(&self) -> anyhow::Result<Vec<ResultRecord>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed reading {}", self.path.display()))
            }
        };
        let mut records = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ResultRecord>(line) {
                Ok(record) => records.push(record),
                Err(err) => tracing::warn!(
                    "skipping {} line {}: {err}",
                    self.path.display(),
                    idx + 1
                ),
            }
        }
        Ok(records)
    }

    pub fn load_gallery(&self) -> anyhow::Result<Gallery> {
        let mut gallery = Gallery::new();
        for record in self.read_all()? {
            gallery.insert(record);
        }
        Ok(gallery)
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::*;

    fn record(url: &str, seed: i64, prompt: &str) -> ResultRecord {
        ResultRecord {
            url: url.to_string(),
            seed,
            config: json!({ "prompt": prompt })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        }
    }

    #[test]
    fn append_writes_compact_lines_with_timestamp() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = ResultLog::new(temp.path().join("results.jsonl"));
        log.append(&record("a.png", 7, "x"))?;
        log.append(&record("b.png", 8, "y"))?;

        let content = fs::read_to_string(log.path())?;
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0])?;
        assert_eq!(first["url"], json!("a.png"));
        assert!(first.get("ts").and_then(Value::as_str).is_some());
        Ok(())
    }

    #[test]
    fn load_gallery_puts_latest_first_and_skips_garbage() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = ResultLog::new(temp.path().join("results.jsonl"));
        log.append(&record("a.png", 7, "x"))?;
        let mut file = OpenOptions::new().append(true).open(log.path())?;
        file.write_all(b"not json\n")?;
        log.append(&record("b.png", 8, "y"))?;

        let gallery = log.load_gallery()?;
        assert_eq!(gallery.len(), 2);
        assert_eq!(gallery.get(0).map(|entry| entry.alt.as_str()), Some("8 | y"));
        Ok(())
    }

    #[test]
    fn missing_journal_is_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let log = ResultLog::new(temp.path().join("none.jsonl"));
        assert!(log.read_all()?.is_empty());
        Ok(())
    }
}
