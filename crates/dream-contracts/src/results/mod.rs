mod gallery;
mod log;

pub use gallery::{Gallery, GalleryEntry, ResultRecord};
pub use log::ResultLog;
