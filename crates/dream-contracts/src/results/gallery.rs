use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::form::{json_value_to_form_text, FormState, PROMPT_FIELD, SEED_FIELD};
use crate::store::{FieldStore, KeyValueStore};

/// One finished image and the form snapshot that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub url: String,
    pub seed: i64,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl ResultRecord {
    pub fn prompt(&self) -> String {
        self.config
            .get(PROMPT_FIELD)
            .map(json_value_to_form_text)
            .unwrap_or_default()
    }

    /// Accessible label, `"<seed> | <prompt>"`.
    pub fn alt_text(&self) -> String {
        format!("{} | {}", self.seed, self.prompt())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub src: String,
    pub alt: String,
    pub record: ResultRecord,
}

/// Rendered results, most recent first.
#[derive(Debug, Clone, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, url: &str, seed: i64, config: Map<String, Value>) -> &GalleryEntry {
        self.insert(ResultRecord {
            url: url.to_string(),
            seed,
            config,
        })
    }

    pub fn insert(&mut self, record: ResultRecord) -> &GalleryEntry {
        self.entries.insert(
            0,
            GalleryEntry {
                src: record.url.clone(),
                alt: record.alt_text(),
                record,
            },
        );
        &self.entries[0]
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&GalleryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads entry `index` back into the form, as clicking its image does,
    /// and persists the result. Returns `None` for an unknown index.
    pub fn recall<S: KeyValueStore>(
        &self,
        index: usize,
        form: &mut FormState,
        fields: &mut FieldStore<S>,
    ) -> anyhow::Result<Option<&GalleryEntry>> {
        let Some(entry) = self.entries.get(index) else {
            return Ok(None);
        };
        form.apply_snapshot(&entry.record.config);
        if form.contains(SEED_FIELD) {
            form.set_value(SEED_FIELD, &entry.record.seed.to_string())?;
        }
        fields.save(form)?;
        Ok(Some(entry))
    }
}
