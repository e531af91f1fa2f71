use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

use super::KeyValueStore;

/// Key-value store persisted as one pretty-printed JSON object.
///
/// Every read refreshes from disk and every write merges only the keys this
/// handle changed, so several handles on the same file see each other's
/// writes instead of clobbering them.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    payload: Option<Map<String, Value>>,
    dirty_keys: Vec<String>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            payload: None,
            dirty_keys: Vec::new(),
        }
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        if self.payload.is_none() || self.dirty_keys.is_empty() {
            return Ok(());
        }

        let mut on_disk = read_json_object(&self.path);
        if let Some(payload) = &self.payload {
            for key in &self.dirty_keys {
                if let Some(value) = payload.get(key) {
                    on_disk.insert(key.clone(), value.clone());
                }
            }
        }
        write_json_object(&self.path, &on_disk)?;
        self.payload = Some(on_disk);
        self.dirty_keys.clear();
        Ok(())
    }

    fn refresh(&mut self) -> &mut Map<String, Value> {
        self.payload.insert(read_json_object(&self.path))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&mut self, key: &str) -> Option<String> {
        self.refresh()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let payload = self.refresh();
        let snapshot = Value::String(value.to_string());
        if payload.get(key) == Some(&snapshot) {
            return Ok(());
        }
        payload.insert(key.to_string(), snapshot);
        if !self.dirty_keys.iter().any(|existing| existing == key) {
            self.dirty_keys.push(key.to_string());
        }
        self.flush()
    }

    fn clear(&mut self) -> anyhow::Result<()> {
        let empty = Map::new();
        write_json_object(&self.path, &empty)?;
        self.payload = Some(empty);
        self.dirty_keys.clear();
        Ok(())
    }

    fn keys(&mut self) -> Vec<String> {
        self.refresh().keys().cloned().collect()
    }
}

fn read_json_object(path: &Path) -> Map<String, Value> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => return Map::new(),
        Err(err) => {
            tracing::warn!("field store unreadable at {}: {err}", path.display());
            return Map::new();
        }
    };
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(payload)) => payload,
        Ok(_) | Err(_) => {
            tracing::warn!(
                "field store corrupt at {}, treating as empty",
                path.display()
            );
            Map::new()
        }
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )
    .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut store = JsonFileStore::new(temp.path().join("fields.json"));
        store.set("steps", "25")?;
        assert_eq!(store.get("steps").as_deref(), Some("25"));
        assert_eq!(store.get("missing"), None);
        Ok(())
    }

    #[test]
    fn writes_merge_with_other_handles() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("fields.json");
        let mut store_a = JsonFileStore::new(&path);
        let mut store_b = JsonFileStore::new(&path);

        store_a.set("prompt", "a boat")?;
        store_b.set("seed", "42")?;
        store_a.set("steps", "30")?;

        let mut reloaded = JsonFileStore::new(path);
        assert_eq!(reloaded.get("prompt").as_deref(), Some("a boat"));
        assert_eq!(reloaded.get("seed").as_deref(), Some("42"));
        assert_eq!(reloaded.get("steps").as_deref(), Some("30"));
        Ok(())
    }

    #[test]
    fn clear_empties_the_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("fields.json");
        let mut store = JsonFileStore::new(&path);
        store.set("prompt", "a boat")?;
        store.clear()?;

        assert!(store.keys().is_empty());
        assert!(JsonFileStore::new(path).keys().is_empty());
        Ok(())
    }

    #[test]
    fn corrupt_file_reads_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("fields.json");
        std::fs::write(&path, "{not json")?;

        let mut store = JsonFileStore::new(&path);
        assert_eq!(store.get("prompt"), None);
        store.set("prompt", "recovered")?;
        assert_eq!(store.get("prompt").as_deref(), Some("recovered"));
        Ok(())
    }
}
