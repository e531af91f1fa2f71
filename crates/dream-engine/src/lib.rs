pub mod backend;
pub mod config;
pub mod image_data;
pub mod session;
pub mod translator;

#[cfg(test)]
mod test_support;

pub use backend::{GenerationBackend, HttpBackend};
pub use config::{ClientConfig, TranslateConfig};
pub use session::{Session, SessionError, UiEvent, UiSurface};
pub use translator::{Passthrough, Translator, YoudaoTranslator};
