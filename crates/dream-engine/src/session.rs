use std::io::{ErrorKind, Read};
use std::path::PathBuf;

use dream_contracts::form::{
    build_request, FormError, FormState, INIT_IMAGE_FIELD, RANDOM_SEED, SEED_FIELD,
};
use dream_contracts::page::PageConfig;
use dream_contracts::results::{Gallery, ResultLog};
use dream_contracts::store::{FieldStore, KeyValueStore};
use dream_contracts::stream::{StreamReducer, TerminalState};
use dream_contracts::ui::{UiAction, GFPGAN_CONTROL};
use thiserror::Error;

use crate::backend::GenerationBackend;
use crate::image_data::file_to_data_url;
use crate::translator::Translator;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Applies display actions to whatever shows the client to the user.
pub trait UiSurface {
    fn apply(&mut self, action: &UiAction);
}

/// Things the user can do to the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Submit,
    FieldChanged { name: String, value: String },
    ResetSeed,
    ResetAll,
    Cancel,
    ResultClicked(usize),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a generation is already in progress")]
    Busy,
    #[error("no result at index {0}")]
    NoSuchResult(usize),
    #[error("could not read init image {}", .path.display())]
    InitImage {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Wires form events to the field store, translator, backend and gallery.
pub struct Session<S, T, B> {
    form: FormState,
    fields: FieldStore<S>,
    translator: T,
    backend: B,
    gallery: Gallery,
    journal: Option<ResultLog>,
    form_enabled: bool,
}

impl<S, T, B> Session<S, T, B>
where
    S: KeyValueStore,
    T: Translator,
    B: GenerationBackend,
{
    /// Restores saved fields into `form` and applies the page capabilities.
    pub fn start(
        mut form: FormState,
        store: S,
        translator: T,
        backend: B,
        page: PageConfig,
        surface: &mut dyn UiSurface,
    ) -> Self {
        let mut fields = FieldStore::new(store);
        let restored = fields.load(&mut form);
        tracing::debug!("restored {restored} saved field(s)");
        surface.apply(&UiAction::SetControlVisible {
            control: GFPGAN_CONTROL,
            visible: page.gfpgan_model_exists,
        });
        Self {
            form,
            fields,
            translator,
            backend,
            gallery: Gallery::new(),
            journal: None,
            form_enabled: true,
        }
    }

    /// Records rendered results in `journal` and shows the ones already there.
    pub fn with_journal(mut self, journal: ResultLog) -> anyhow::Result<Self> {
        self.gallery = journal.load_gallery()?;
        self.journal = Some(journal);
        Ok(self)
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn fields(&self) -> &FieldStore<S> {
        &self.fields
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_form_enabled(&self) -> bool {
        self.form_enabled
    }

    /// Handles one event. Returns how the stream ended for `Submit`.
    pub fn handle(
        &mut self,
        event: UiEvent,
        surface: &mut dyn UiSurface,
    ) -> Result<Option<TerminalState>, SessionError> {
        match event {
            UiEvent::Submit => self.submit(surface).map(Some),
            UiEvent::FieldChanged { name, value } => {
                self.form.set_value(&name, &value)?;
                self.fields.save(&self.form)?;
                Ok(None)
            }
            UiEvent::ResetSeed => {
                self.form.set_value(SEED_FIELD, &RANDOM_SEED.to_string())?;
                self.fields.save(&self.form)?;
                Ok(None)
            }
            UiEvent::ResetAll => {
                self.fields.clear(&mut self.form)?;
                Ok(None)
            }
            UiEvent::Cancel => {
                if let Err(err) = self.backend.cancel() {
                    tracing::error!("cancel failed: {err:#}");
                }
                Ok(None)
            }
            UiEvent::ResultClicked(index) => {
                let entry = self
                    .gallery
                    .recall(index, &mut self.form, &mut self.fields)?
                    .ok_or(SessionError::NoSuchResult(index))?;
                tracing::info!("loaded settings from {}", entry.src);
                Ok(None)
            }
        }
    }

    fn submit(&mut self, surface: &mut dyn UiSurface) -> Result<TerminalState, SessionError> {
        if !self.form_enabled {
            return Err(SessionError::Busy);
        }
        let original_prompt = self.form.prompt().to_string();
        let prompt = self.translator.translate(&original_prompt);

        let initimg = match self.form.file(INIT_IMAGE_FIELD) {
            Some(path) => Some(file_to_data_url(path).map_err(|err| {
                SessionError::InitImage {
                    path: path.to_path_buf(),
                    source: err.into(),
                }
            })?),
            None => None,
        };
        let request = build_request(&self.form, prompt, initimg)?;

        let mut reducer = StreamReducer::new(request.total_steps(), original_prompt);
        self.apply_all(reducer.begin(request.wants_progress_images()), surface);

        let (state, actions) = match self.backend.open_stream(&request) {
            Ok(reader) => self.drive(reader, &mut reducer, surface),
            Err(err) => {
                tracing::error!("{} generation failed: {err:#}", self.backend.name());
                reducer.finish(Some(format!("{err:#}")))
            }
        };
        self.apply_all(actions, surface);
        tracing::info!("generation finished: {state:?}");
        Ok(state)
    }

    fn drive(
        &mut self,
        mut reader: Box<dyn Read>,
        reducer: &mut StreamReducer,
        surface: &mut dyn UiSurface,
    ) -> (TerminalState, Vec<UiAction>) {
        let mut buf = vec![0u8; READ_CHUNK_BYTES];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => return reducer.finish(None),
                Ok(read) => {
                    let actions = reducer.feed(&buf[..read]);
                    self.apply_all(actions, surface);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!("generation stream broke: {err}");
                    return reducer.finish(Some(err.to_string()));
                }
            }
        }
    }

    fn apply_all(&mut self, actions: Vec<UiAction>, surface: &mut dyn UiSurface) {
        for action in actions {
            match &action {
                UiAction::DisableForm => self.form_enabled = false,
                UiAction::EnableForm => self.form_enabled = true,
                UiAction::RenderResult(record) => {
                    self.gallery.insert(record.clone());
                    if let Some(journal) = &self.journal {
                        if let Err(err) = journal.append(record) {
                            tracing::warn!("result not journaled: {err:#}");
                        }
                    }
                }
                _ => {}
            }
            surface.apply(&action);
        }
    }
}
