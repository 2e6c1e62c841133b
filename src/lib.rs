pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod tray;

#[cfg(feature = "gtk")]
pub mod ui;
