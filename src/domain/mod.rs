pub mod address;
pub mod error;
pub mod icon_theme;
pub mod models;
pub mod status_notifier_service;
pub mod tray_container;
