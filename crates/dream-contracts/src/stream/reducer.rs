use crate::form::json_value_to_form_text;
use crate::results::ResultRecord;
use crate::ui::{generating_label, UiAction, BLANK_IMAGE_URL, GENERATION_ERROR_MESSAGE};

use super::events::StreamEvent;
use super::framer::LineFramer;

const LOGGED_LINE_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    AwaitingChunk,
    Done,
}

/// How a generation stream ended. Decided once, when the stream closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalState {
    Completed { results: usize },
    Canceled { results: usize },
    Aborted { results: usize, error: String },
}

impl TerminalState {
    pub fn results(&self) -> usize {
        match self {
            TerminalState::Completed { results }
            | TerminalState::Canceled { results }
            | TerminalState::Aborted { results, .. } => *results,
        }
    }

    /// Nothing came back and nobody asked to stop.
    pub fn is_failure(&self) -> bool {
        !matches!(self, TerminalState::Canceled { .. }) && self.results() == 0
    }
}

/// Turns response chunks into display actions for one generation.
///
/// The reducer performs no I/O; callers feed it bytes as they arrive and
/// apply the returned actions.
#[derive(Debug, Clone)]
pub struct StreamReducer {
    total_steps: u32,
    original_prompt: String,
    framer: LineFramer,
    phase: StreamPhase,
    results: usize,
    canceled: bool,
    skipped_lines: usize,
}

impl StreamReducer {
    pub fn new(total_steps: u32, original_prompt: impl Into<String>) -> Self {
        Self {
            total_steps,
            original_prompt: original_prompt.into(),
            framer: LineFramer::new(),
            phase: StreamPhase::AwaitingChunk,
            results: 0,
            canceled: false,
            skipped_lines: 0,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn results(&self) -> usize {
        self.results
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Actions for the moment the request is sent.
    pub fn begin(&self, preview_visible: bool) -> Vec<UiAction> {
        vec![
            UiAction::ShowProgress {
                max: self.total_steps,
                preview_visible,
            },
            UiAction::SetPreview(BLANK_IMAGE_URL.to_string()),
            UiAction::DisableForm,
            UiAction::SetPromptDisplay(generating_label(&self.original_prompt)),
        ]
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<UiAction> {
        if self.phase == StreamPhase::Done {
            tracing::debug!("ignoring {} bytes after stream end", chunk.len());
            return Vec::new();
        }
        let mut actions = Vec::new();
        for line in self.framer.push(chunk) {
            self.dispatch_line(&line, &mut actions);
        }
        actions
    }

    pub fn apply(&mut self, event: StreamEvent) -> Vec<UiAction> {
        match event {
            StreamEvent::Result { url, seed, config } => {
                self.results += 1;
                vec![
                    UiAction::RemoveNoResultsMessage,
                    UiAction::RenderResult(ResultRecord { url, seed, config }),
                    UiAction::SetProgress {
                        value: 0,
                        max: self.total_steps,
                    },
                ]
            }
            StreamEvent::UpscalingStarted { processed_file_cnt } => {
                vec![UiAction::ShowUpscaling {
                    processed: json_value_to_form_text(&processed_file_cnt),
                }]
            }
            StreamEvent::UpscalingDone => vec![UiAction::HideUpscaling],
            StreamEvent::Step { step, url } => {
                let mut actions = vec![UiAction::SetProgress {
                    value: step,
                    max: self.total_steps,
                }];
                if let Some(url) = url.filter(|url| !url.is_empty()) {
                    actions.push(UiAction::SetPreview(url));
                }
                actions
            }
            StreamEvent::Canceled => {
                self.canceled = true;
                Vec::new()
            }
            StreamEvent::Unknown => {
                tracing::debug!("ignoring unrecognized stream event");
                Vec::new()
            }
        }
    }

    /// Closes the stream. `error` is the read failure that ended it early,
    /// if any. The cleanup actions are emitted exactly once.
    pub fn finish(&mut self, error: Option<String>) -> (TerminalState, Vec<UiAction>) {
        let mut actions = Vec::new();
        if self.phase == StreamPhase::Done {
            return (self.terminal_state(error), actions);
        }
        if let Some(line) = self.framer.finish() {
            self.dispatch_line(&line, &mut actions);
        }
        self.phase = StreamPhase::Done;

        let state = self.terminal_state(error);
        actions.extend([
            UiAction::HideProgress,
            UiAction::EnableForm,
            UiAction::SetPromptDisplay(self.original_prompt.clone()),
            UiAction::SetProgress {
                value: 0,
                max: self.total_steps,
            },
        ]);
        if state.is_failure() {
            actions.push(UiAction::Alert(GENERATION_ERROR_MESSAGE.to_string()));
        }
        (state, actions)
    }

    fn terminal_state(&self, error: Option<String>) -> TerminalState {
        let results = self.results;
        match error {
            _ if self.canceled => TerminalState::Canceled { results },
            Some(error) => TerminalState::Aborted { results, error },
            None => TerminalState::Completed { results },
        }
    }

    fn dispatch_line(&mut self, line: &str, actions: &mut Vec<UiAction>) {
        match StreamEvent::parse_line(line) {
            Ok(event) => {
                tracing::debug!("stream event: {}", event.kind());
                actions.extend(self.apply(event));
            }
            Err(err) => {
                self.skipped_lines += 1;
                tracing::warn!(
                    "skipping malformed stream line ({err}): {}",
                    truncate_text(line, LOGGED_LINE_MAX_CHARS)
                );
            }
        }
    }
}

/// Runs a whole stream through a fresh reducer: chunks in, actions out.
pub fn reduce_chunks<'a>(
    total_steps: u32,
    original_prompt: &str,
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> (TerminalState, Vec<UiAction>) {
    let mut reducer = StreamReducer::new(total_steps, original_prompt);
    let mut actions = Vec::new();
    for chunk in chunks {
        actions.extend(reducer.feed(chunk));
    }
    let (state, tail) = reducer.finish(None);
    actions.extend(tail);
    (state, actions)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn progress_values(actions: &[UiAction]) -> Vec<u64> {
        actions
            .iter()
            .filter_map(|action| match action {
                UiAction::SetProgress { value, .. } => Some(*value),
                _ => None,
            })
            .collect()
    }

    fn alerts(actions: &[UiAction]) -> usize {
        actions
            .iter()
            .filter(|action| matches!(action, UiAction::Alert(_)))
            .count()
    }

    #[test]
    fn step_then_result_renders_one_entry_without_alert() {
        let chunks: [&[u8]; 2] = [
            b"{\"event\":\"step\",\"step\":3}\n",
            b"{\"event\":\"result\",\"url\":\"a.png\",\"seed\":7,\"config\":{\"prompt\":\"x\"}}\n",
        ];
        let (state, actions) = reduce_chunks(10, "x", chunks);

        assert_eq!(state, TerminalState::Completed { results: 1 });
        assert_eq!(progress_values(&actions), vec![3, 0, 0]);
        let rendered = actions
            .iter()
            .filter_map(|action| match action {
                UiAction::RenderResult(record) => Some(record.alt_text()),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(rendered, vec!["7 | x".to_string()]);
        assert_eq!(alerts(&actions), 0);
    }

    #[test]
    fn empty_stream_alerts_exactly_once() {
        let mut reducer = StreamReducer::new(50, "boat");
        assert_eq!(reducer.feed(b"{\"event\":\"step\",\"step\":1}\n").len(), 1);
        let (state, actions) = reducer.finish(None);
        assert_eq!(state, TerminalState::Completed { results: 0 });
        assert_eq!(alerts(&actions), 1);

        let (again, repeated) = reducer.finish(None);
        assert_eq!(again, state);
        assert!(repeated.is_empty());
    }

    #[test]
    fn canceled_stream_does_not_alert() {
        let chunks: [&[u8]; 1] = [b"{\"event\":\"step\",\"step\":2}\n{\"event\":\"canceled\"}\n"];
        let (state, actions) = reduce_chunks(50, "boat", chunks);
        assert_eq!(state, TerminalState::Canceled { results: 0 });
        assert_eq!(alerts(&actions), 0);
    }

    #[test]
    fn aborted_stream_alerts_only_without_results() {
        let mut reducer = StreamReducer::new(5, "boat");
        let (state, actions) = reducer.finish(Some("connection reset".to_string()));
        assert!(matches!(state, TerminalState::Aborted { results: 0, .. }));
        assert_eq!(alerts(&actions), 1);

        let mut reducer = StreamReducer::new(5, "boat");
        reducer.feed(b"{\"event\":\"result\",\"url\":\"a.png\",\"seed\":1}\n");
        let (state, actions) = reducer.finish(Some("connection reset".to_string()));
        assert!(matches!(state, TerminalState::Aborted { results: 1, .. }));
        assert_eq!(alerts(&actions), 0);
    }

    #[test]
    fn malformed_line_is_skipped_and_neighbours_dispatched() {
        let mut reducer = StreamReducer::new(10, "boat");
        let actions = reducer.feed(
            b"{\"event\":\"step\",\"step\":1}\n{oops\n{\"event\":\"step\",\"step\":2}\n",
        );
        assert_eq!(progress_values(&actions), vec![1, 2]);
        assert_eq!(reducer.skipped_lines(), 1);
    }

    #[test]
    fn line_split_across_chunks_dispatches_once() {
        let chunks: [&[u8]; 3] = [
            b"{\"event\":\"res",
            b"ult\",\"url\":\"b.png\",\"seed\":9,",
            b"\"config\":{\"prompt\":\"y\"}}",
        ];
        let (state, actions) = reduce_chunks(10, "y", chunks);
        assert_eq!(state, TerminalState::Completed { results: 1 });
        assert_eq!(
            actions
                .iter()
                .filter(|action| matches!(action, UiAction::RenderResult(_)))
                .count(),
            1
        );
    }

    #[test]
    fn upscaling_and_preview_actions() {
        let mut reducer = StreamReducer::new(10, "boat");
        let actions = reducer.feed(
            concat!(
                "{\"event\":\"step\",\"step\":4,\"url\":\"intermediates/4.png\"}\n",
                "{\"event\":\"upscaling-started\",\"processed_file_cnt\":2}\n",
                "{\"event\":\"upscaling-done\"}\n",
                "{\"event\":\"mystery\"}\n",
            )
            .as_bytes(),
        );
        assert_eq!(
            actions,
            vec![
                UiAction::SetProgress { value: 4, max: 10 },
                UiAction::SetPreview("intermediates/4.png".to_string()),
                UiAction::ShowUpscaling {
                    processed: "2".to_string()
                },
                UiAction::HideUpscaling,
            ]
        );
        assert_eq!(reducer.skipped_lines(), 0);
    }

    #[test]
    fn upscaling_progress_strings_show_the_indicator() {
        let mut reducer = StreamReducer::new(10, "boat");
        let actions = reducer.feed(
            concat!(
                "{\"event\":\"upscaling-started\",\"processed_file_cnt\":\"1/2\"}\n",
                "{\"event\":\"upscaling-done\",\"processed_file_cnt\":\"2/2\"}\n",
            )
            .as_bytes(),
        );
        assert_eq!(
            actions,
            vec![
                UiAction::ShowUpscaling {
                    processed: "1/2".to_string()
                },
                UiAction::HideUpscaling,
            ]
        );
        assert_eq!(reducer.skipped_lines(), 0);
    }

    #[test]
    fn begin_and_finish_bracket_the_form() {
        let mut reducer = StreamReducer::new(37, "一只猫");
        assert_eq!(
            reducer.begin(true),
            vec![
                UiAction::ShowProgress {
                    max: 37,
                    preview_visible: true
                },
                UiAction::SetPreview(BLANK_IMAGE_URL.to_string()),
                UiAction::DisableForm,
                UiAction::SetPromptDisplay("Generating: \"一只猫\"".to_string()),
            ]
        );
        reducer.apply(StreamEvent::Result {
            url: "c.png".to_string(),
            seed: 3,
            config: json!({"prompt": "a cat"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        });
        let (_, actions) = reducer.finish(None);
        assert_eq!(
            actions,
            vec![
                UiAction::HideProgress,
                UiAction::EnableForm,
                UiAction::SetPromptDisplay("一只猫".to_string()),
                UiAction::SetProgress { value: 0, max: 37 },
            ]
        );
        assert_eq!(reducer.phase(), StreamPhase::Done);
        assert!(reducer.feed(b"{\"event\":\"canceled\"}\n").is_empty());
    }
}
