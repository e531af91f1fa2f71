use indexmap::IndexMap;
use serde::Serialize;

use super::state::{
    FieldValue, FormError, FormState, INIT_IMAGE_FIELD, PROGRESS_IMAGES_FIELD, PROMPT_FIELD,
    STEPS_FIELD, STRENGTH_FIELD,
};

/// Body posted to the generation endpoint.
///
/// Fields other than the four typed ones pass through as the text the form
/// holds. Checked flags are sent as `"on"` and unchecked flags are left out,
/// matching how a browser serializes checkboxes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub initimg: Option<String>,
    pub strength: f64,
    pub steps: u32,
    #[serde(flatten)]
    pub fields: IndexMap<String, String>,
}

impl GenerationRequest {
    /// Upper bound for the progress bar. Never sent to the server.
    pub fn total_steps(&self) -> u32 {
        total_steps(self.steps, self.strength, self.initimg.is_some())
    }

    pub fn wants_progress_images(&self) -> bool {
        self.fields.contains_key(PROGRESS_IMAGES_FIELD)
    }
}

/// An init image only runs the tail of the schedule, `floor(strength * steps)`.
pub fn total_steps(steps: u32, strength: f64, has_init_image: bool) -> u32 {
    if has_init_image {
        (strength * f64::from(steps)).floor() as u32
    } else {
        steps
    }
}

/// Assembles the request body from `form`.
///
/// `prompt` is the already translated prompt and replaces the form's own
/// value; `initimg` is the encoded init image, if the form names one.
pub fn build_request(
    form: &FormState,
    prompt: String,
    initimg: Option<String>,
) -> Result<GenerationRequest, FormError> {
    let strength = parse_strength(
        form.text(STRENGTH_FIELD)
            .ok_or(FormError::MissingField(STRENGTH_FIELD))?,
    )?;
    let steps = parse_steps(
        form.text(STEPS_FIELD)
            .ok_or(FormError::MissingField(STEPS_FIELD))?,
    )?;

    let mut fields = IndexMap::new();
    for (name, value) in form.entries() {
        if matches!(
            name,
            PROMPT_FIELD | INIT_IMAGE_FIELD | STRENGTH_FIELD | STEPS_FIELD
        ) {
            continue;
        }
        match value {
            FieldValue::Text(raw) => {
                fields.insert(name.to_string(), raw.clone());
            }
            FieldValue::Flag(true) => {
                fields.insert(name.to_string(), "on".to_string());
            }
            FieldValue::Flag(false) | FieldValue::File(_) => {}
        }
    }

    Ok(GenerationRequest {
        prompt,
        initimg,
        strength,
        steps,
        fields,
    })
}

fn parse_strength(raw: &str) -> Result<f64, FormError> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| FormError::invalid(STRENGTH_FIELD, raw, "expected a number"))?;
    if !(0.0..=1.0).contains(&value) {
        return Err(FormError::invalid(
            STRENGTH_FIELD,
            raw,
            "must be between 0.0 and 1.0",
        ));
    }
    Ok(value)
}

fn parse_steps(raw: &str) -> Result<u32, FormError> {
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => Err(FormError::invalid(
            STEPS_FIELD,
            raw,
            "expected a positive integer",
        )),
        Ok(value) => Ok(value),
    }
}
