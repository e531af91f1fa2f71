mod payload;
mod state;

pub use payload::{build_request, total_steps, GenerationRequest};
pub use state::{
    json_value_to_form_text, parse_flag, FieldValue, FormError, FormState, INIT_IMAGE_FIELD,
    PROGRESS_IMAGES_FIELD, PROMPT_FIELD, RANDOM_SEED, SEED_FIELD, STEPS_FIELD, STRENGTH_FIELD,
};
