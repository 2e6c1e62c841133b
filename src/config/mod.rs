pub mod tray_config;

pub use tray_config::{ScannerConfig, TrayConfig};
