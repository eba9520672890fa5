pub mod actions;
pub mod detect;
pub mod error;
pub mod executor;
pub mod hotkeys;
pub mod logger;
pub mod matching;
pub mod persist;
pub mod platform;
pub mod region;
pub mod scheduler;
pub mod settings;
pub mod sleep;
pub mod status;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
