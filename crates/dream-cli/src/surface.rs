use dream_contracts::results::ResultRecord;
use dream_contracts::ui::{UiAction, BLANK_IMAGE_URL};
use dream_engine::{ClientConfig, UiSurface};
use indicatif::{ProgressBar, ProgressStyle};

const PROGRESS_TEMPLATE: &str = "{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";

/// Renders session actions on the terminal: a step bar on stderr, results
/// on stdout.
pub struct TerminalSurface {
    config: ClientConfig,
    bar: Option<ProgressBar>,
    preview: Option<String>,
    prompt_display: Option<String>,
    alerted: bool,
}

impl TerminalSurface {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            config: config.clone(),
            bar: None,
            preview: None,
            prompt_display: None,
            alerted: false,
        }
    }

    pub fn alerted(&self) -> bool {
        self.alerted
    }

    fn result_line(&self, record: &ResultRecord) -> String {
        format!(
            "{}  {}",
            self.config.resolve_url(&record.url),
            record.alt_text()
        )
    }

    fn print(&self, line: String) {
        match &self.bar {
            Some(bar) => bar.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }

    fn show_progress(&mut self, max: u32, preview_visible: bool) {
        let bar = ProgressBar::new(u64::from(max));
        let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        if preview_visible {
            bar.set_message("previews on");
        }
        self.preview = None;
        self.bar = Some(bar);
    }
}

impl UiSurface for TerminalSurface {
    fn apply(&mut self, action: &UiAction) {
        match action {
            UiAction::ShowProgress {
                max,
                preview_visible,
            } => self.show_progress(*max, *preview_visible),
            UiAction::SetProgress { value, max } => {
                if let Some(bar) = &self.bar {
                    bar.set_length(u64::from(*max));
                    bar.set_position(*value);
                }
            }
            UiAction::HideProgress => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
            }
            UiAction::SetPreview(url) => {
                if url == BLANK_IMAGE_URL {
                    return;
                }
                if self.preview.as_deref() != Some(url.as_str()) {
                    let resolved = self.config.resolve_url(url);
                    tracing::debug!("preview {resolved}");
                    if let Some(bar) = &self.bar {
                        bar.set_message(format!("preview {resolved}"));
                    }
                    self.preview = Some(url.clone());
                }
            }
            UiAction::SetPromptDisplay(text) => {
                // no bar once the stream has ended
                match &self.bar {
                    Some(bar) => bar.set_prefix(text.clone()),
                    None => eprintln!("Prompt: {text}"),
                }
                self.prompt_display = Some(text.clone());
            }
            UiAction::RenderResult(record) => {
                let line = self.result_line(record);
                self.print(line);
            }
            UiAction::ShowUpscaling { processed } => {
                let line = format!("Postprocessing... ({processed})");
                match &self.bar {
                    Some(bar) => bar.set_message(line),
                    None => eprintln!("{line}"),
                }
            }
            UiAction::HideUpscaling => {
                if let Some(bar) = &self.bar {
                    bar.set_message("");
                }
            }
            UiAction::SetControlVisible { control, visible } => {
                if !visible {
                    tracing::debug!("{control} unavailable on this server");
                }
            }
            UiAction::Alert(message) => {
                self.alerted = true;
                match &self.bar {
                    Some(bar) => bar.suspend(|| eprintln!("{message}")),
                    None => eprintln!("{message}"),
                }
            }
            UiAction::DisableForm | UiAction::EnableForm | UiAction::RemoveNoResultsMessage => {}
        }
    }
}
