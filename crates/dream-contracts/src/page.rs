use serde::Deserialize;

/// Capability flags the server publishes for the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageConfig {
    #[serde(default)]
    pub gfpgan_model_exists: bool,
}

impl PageConfig {
    /// Reads the object literal out of a `let config = {...};` script.
    pub fn from_script(script: &str) -> Option<Self> {
        let start = script.find('{')?;
        let end = script.rfind('}')?;
        if end < start {
            return None;
        }
        serde_json::from_str(&script[start..=end]).ok()
    }
}
