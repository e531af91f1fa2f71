use serde::Deserialize;
use serde_json::{Map, Value};

/// One line of the generation response body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum StreamEvent {
    Result {
        url: String,
        seed: i64,
        #[serde(default)]
        config: Map<String, Value>,
    },
    /// `processed_file_cnt` is shown as sent; servers report either a
    /// count or a progress string such as `"1/2"`.
    UpscalingStarted {
        #[serde(default)]
        processed_file_cnt: Value,
    },
    UpscalingDone,
    Step {
        step: u64,
        #[serde(default)]
        url: Option<String>,
    },
    Canceled,
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    pub fn parse_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Result { .. } => "result",
            StreamEvent::UpscalingStarted { .. } => "upscaling-started",
            StreamEvent::UpscalingDone => "upscaling-done",
            StreamEvent::Step { .. } => "step",
            StreamEvent::Canceled => "canceled",
            StreamEvent::Unknown => "unknown",
        }
    }
}
