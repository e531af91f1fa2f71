use crate::form::{FormState, PROMPT_FIELD};

use super::KeyValueStore;

/// Remembers the last value of every form input between runs.
#[derive(Debug, Clone)]
pub struct FieldStore<S> {
    store: S,
}

impl<S: KeyValueStore> FieldStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Writes every non-file field under its own name.
    pub fn save(&mut self, form: &FormState) -> anyhow::Result<()> {
        for (name, value) in form.entries() {
            if let Some(text) = value.persisted_text() {
                self.store.set(name, &text)?;
            }
        }
        Ok(())
    }

    /// Restores stored values into matching fields and returns how many were
    /// restored. Fields without a stored value keep their current value.
    pub fn load(&mut self, form: &mut FormState) -> usize {
        let names = form
            .entries()
            .filter(|(_, value)| !value.is_file())
            .map(|(name, _)| name.to_string())
            .collect::<Vec<_>>();
        let mut restored = 0;
        for name in names {
            let Some(stored) = self.store.get(&name) else {
                continue;
            };
            match form.set_value(&name, &stored) {
                Ok(()) => restored += 1,
                Err(err) => tracing::warn!("ignoring stored field: {err}"),
            }
        }
        restored
    }

    /// Forgets everything and resets the form, keeping only what is
    /// currently typed into the prompt.
    pub fn clear(&mut self, form: &mut FormState) -> anyhow::Result<()> {
        self.store.clear()?;
        let prompt = form.prompt().to_string();
        form.reset();
        if form.contains(PROMPT_FIELD) {
            form.set_value(PROMPT_FIELD, &prompt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::form::{INIT_IMAGE_FIELD, PROGRESS_IMAGES_FIELD, SEED_FIELD, STEPS_FIELD};
    use crate::store::{JsonFileStore, MemoryStore};

    use super::*;

    fn edited_form() -> anyhow::Result<FormState> {
        let mut form = FormState::dream_defaults();
        form.set_value(PROMPT_FIELD, "a lighthouse at dusk")?;
        form.set_value(STEPS_FIELD, "80")?;
        form.set_value(SEED_FIELD, "1234")?;
        form.set_value(PROGRESS_IMAGES_FIELD, "on")?;
        form.set_file(INIT_IMAGE_FIELD, Some(PathBuf::from("sketch.png")))?;
        Ok(form)
    }

    #[test]
    fn save_then_load_restores_non_file_fields() -> anyhow::Result<()> {
        let form = edited_form()?;
        let mut fields = FieldStore::new(MemoryStore::new());
        fields.save(&form)?;

        let mut restored = FormState::dream_defaults();
        let count = fields.load(&mut restored);

        assert_eq!(count, form.len() - 1);
        for (name, value) in form.entries().filter(|(_, value)| !value.is_file()) {
            assert_eq!(restored.get(name), Some(value), "field {name}");
        }
        assert_eq!(restored.file(INIT_IMAGE_FIELD), None);
        Ok(())
    }

    #[test]
    fn save_never_writes_file_fields() -> anyhow::Result<()> {
        let form = edited_form()?;
        let mut fields = FieldStore::new(MemoryStore::new());
        fields.save(&form)?;

        let keys = fields.store_mut().keys();
        assert!(!keys.iter().any(|key| key == INIT_IMAGE_FIELD));
        assert_eq!(keys.len(), form.len() - 1);
        Ok(())
    }

    #[test]
    fn load_leaves_missing_keys_untouched() -> anyhow::Result<()> {
        let mut store = MemoryStore::new();
        store.set(STEPS_FIELD, "12")?;
        let mut fields = FieldStore::new(store);

        let mut form = FormState::dream_defaults();
        form.set_value(PROMPT_FIELD, "typed but unsaved")?;
        assert_eq!(fields.load(&mut form), 1);
        assert_eq!(form.text(STEPS_FIELD), Some("12"));
        assert_eq!(form.prompt(), "typed but unsaved");
        Ok(())
    }

    #[test]
    fn clear_resets_everything_but_the_prompt() -> anyhow::Result<()> {
        let mut form = edited_form()?;
        let mut fields = FieldStore::new(MemoryStore::new());
        fields.save(&form)?;

        fields.clear(&mut form)?;

        assert!(fields.store().is_empty());
        assert_eq!(form.prompt(), "a lighthouse at dusk");
        let mut expected = FormState::dream_defaults();
        expected.set_value(PROMPT_FIELD, "a lighthouse at dusk")?;
        assert_eq!(form, expected);
        Ok(())
    }

    #[test]
    fn file_backed_store_survives_restart() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("state").join("fields.json");
        let form = edited_form()?;
        FieldStore::new(JsonFileStore::new(&path)).save(&form)?;

        let mut restored = FormState::dream_defaults();
        FieldStore::new(JsonFileStore::new(&path)).load(&mut restored);
        assert_eq!(restored.prompt(), "a lighthouse at dusk");
        assert_eq!(restored.text(SEED_FIELD), Some("1234"));
        assert!(restored.flag(PROGRESS_IMAGES_FIELD));
        Ok(())
    }
}
