mod fields;
mod json_file;
mod memory;

pub use fields::FieldStore;
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

/// String key-value storage shared by the whole client.
///
/// Reads take `&mut self` so file-backed stores can refresh from disk before
/// answering.
pub trait KeyValueStore {
    fn get(&mut self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn clear(&mut self) -> anyhow::Result<()>;
    fn keys(&mut self) -> Vec<String>;
}
