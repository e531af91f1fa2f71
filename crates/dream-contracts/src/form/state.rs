use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

pub const PROMPT_FIELD: &str = "prompt";
pub const SEED_FIELD: &str = "seed";
pub const STEPS_FIELD: &str = "steps";
pub const STRENGTH_FIELD: &str = "strength";
pub const INIT_IMAGE_FIELD: &str = "initimg";
pub const PROGRESS_IMAGES_FIELD: &str = "progress_images";

/// Seed value the server interprets as "pick a random seed".
pub const RANDOM_SEED: i64 = -1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormError {
    #[error("unknown form field '{0}'")]
    UnknownField(String),
    #[error("form has no '{0}' field")]
    MissingField(&'static str),
    #[error("field '{field}' rejects value '{value}': {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl FormError {
    pub(crate) fn invalid(field: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    File(Option<PathBuf>),
}

impl FieldValue {
    pub fn is_file(&self) -> bool {
        matches!(self, FieldValue::File(_))
    }

    /// Text written to the field store. File inputs are never persisted.
    pub fn persisted_text(&self) -> Option<String> {
        match self {
            FieldValue::Text(raw) => Some(raw.clone()),
            FieldValue::Flag(checked) => Some(checked.to_string()),
            FieldValue::File(_) => None,
        }
    }

    pub fn display_text(&self) -> String {
        match self {
            FieldValue::Text(raw) => raw.clone(),
            FieldValue::Flag(checked) => (if *checked { "on" } else { "off" }).to_string(),
            FieldValue::File(path) => path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    value: FieldValue,
    default: FieldValue,
}

/// Ordered set of named form inputs with their current and reset values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    fields: IndexMap<String, Field>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The generation form served by the dream web UI, in document order.
    pub fn dream_defaults() -> Self {
        Self::new()
            .with_text(PROMPT_FIELD, "")
            .with_text("iterations", "1")
            .with_text(STEPS_FIELD, "50")
            .with_text("cfg_scale", "7.5")
            .with_text("sampler_name", "k_lms")
            .with_text("width", "512")
            .with_text("height", "512")
            .with_text(SEED_FIELD, &RANDOM_SEED.to_string())
            .with_file(INIT_IMAGE_FIELD)
            .with_text(STRENGTH_FIELD, "0.75")
            .with_flag("fit", true)
            .with_text("gfpgan_strength", "0.8")
            .with_text("upscale_level", "")
            .with_text("upscale_strength", "0.75")
            .with_flag(PROGRESS_IMAGES_FIELD, false)
    }

    pub fn with_text(self, name: &str, default: &str) -> Self {
        self.with_field(name, FieldValue::Text(default.to_string()))
    }

    pub fn with_flag(self, name: &str, default: bool) -> Self {
        self.with_field(name, FieldValue::Flag(default))
    }

    pub fn with_file(self, name: &str) -> Self {
        self.with_field(name, FieldValue::File(None))
    }

    fn with_field(mut self, name: &str, default: FieldValue) -> Self {
        self.fields.insert(
            name.to_string(),
            Field {
                value: default.clone(),
                default,
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, field)| (name.as_str(), &field.value))
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).map(|field| &field.value)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::Text(raw)) => Some(raw.as_str()),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        matches!(self.get(name), Some(FieldValue::Flag(true)))
    }

    pub fn file(&self, name: &str) -> Option<&Path> {
        match self.get(name) {
            Some(FieldValue::File(Some(path))) => Some(path.as_path()),
            _ => None,
        }
    }

    pub fn prompt(&self) -> &str {
        self.text(PROMPT_FIELD).unwrap_or_default()
    }

    /// Assigns `raw` the way typing into the named input would.
    ///
    /// Flags accept the usual boolean spellings; file inputs take a path and
    /// an empty string clears them.
    pub fn set_value(&mut self, name: &str, raw: &str) -> Result<(), FormError> {
        let field = self
            .fields
            .get_mut(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        field.value = match &field.value {
            FieldValue::Text(_) => FieldValue::Text(raw.to_string()),
            FieldValue::Flag(_) => FieldValue::Flag(
                parse_flag(raw).ok_or_else(|| FormError::invalid(name, raw, "expected on/off"))?,
            ),
            FieldValue::File(_) => {
                let trimmed = raw.trim();
                FieldValue::File((!trimmed.is_empty()).then(|| PathBuf::from(trimmed)))
            }
        };
        Ok(())
    }

    pub fn set_file(&mut self, name: &str, path: Option<PathBuf>) -> Result<(), FormError> {
        let field = self
            .fields
            .get_mut(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        if !field.value.is_file() {
            return Err(FormError::invalid(
                name,
                &path.unwrap_or_default().display().to_string(),
                "not a file input",
            ));
        }
        field.value = FieldValue::File(path);
        Ok(())
    }

    /// Restores every field to its declared default.
    pub fn reset(&mut self) {
        for field in self.fields.values_mut() {
            field.value = field.default.clone();
        }
    }

    /// Copies every non-file field present in `snapshot` into the form and
    /// returns how many fields were assigned.
    pub fn apply_snapshot(&mut self, snapshot: &Map<String, Value>) -> usize {
        let names = self
            .fields
            .iter()
            .filter(|(_, field)| !field.value.is_file())
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();
        let mut applied = 0;
        for name in names {
            let Some(value) = snapshot.get(&name) else {
                continue;
            };
            match self.set_value(&name, &json_value_to_form_text(value)) {
                Ok(()) => applied += 1,
                Err(err) => tracing::warn!("skipping snapshot value: {err}"),
            }
        }
        applied
    }
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    let lowered = raw.trim().to_ascii_lowercase();
    if matches!(lowered.as_str(), "1" | "true" | "yes" | "on") {
        Some(true)
    } else if matches!(lowered.as_str(), "" | "0" | "false" | "no" | "off") {
        Some(false)
    } else {
        None
    }
}

/// Renders a JSON config value the way an input element would display it.
pub fn json_value_to_form_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(raw) => raw.to_string(),
        Value::Number(raw) => raw.to_string(),
        Value::String(raw) => raw.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
