pub mod form;
pub mod page;
pub mod results;
pub mod store;
pub mod stream;
pub mod translate;
pub mod ui;
