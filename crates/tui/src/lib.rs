pub mod app;
pub mod confirm;
pub mod event;
pub mod form;
pub mod ui;

pub use app::App;
