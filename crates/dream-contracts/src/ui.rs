use crate::results::ResultRecord;

/// Data URL of an empty SVG, shown in the preview slot before the first step.
pub const BLANK_IMAGE_URL: &str = "data:image/svg+xml,<svg xmlns=\"http://www.w3.org/2000/svg\"/>";

pub const GENERATION_ERROR_MESSAGE: &str = "Error occurred while generating.";

/// Optional post-processing control gated by the page configuration.
pub const GFPGAN_CONTROL: &str = "gfpgan";

/// Display changes requested by the session. A surface applies them in order.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    ShowProgress { max: u32, preview_visible: bool },
    SetProgress { value: u64, max: u32 },
    HideProgress,
    SetPreview(String),
    DisableForm,
    EnableForm,
    SetPromptDisplay(String),
    RemoveNoResultsMessage,
    RenderResult(ResultRecord),
    ShowUpscaling { processed: String },
    HideUpscaling,
    SetControlVisible { control: &'static str, visible: bool },
    Alert(String),
}

/// Text shown in the prompt box while a generation is running.
pub fn generating_label(prompt: &str) -> String {
    format!("Generating: \"{prompt}\"")
}
