use crate::domain::error::TrayError;
use crate::domain::models::WatcherCandidate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Настройки фонового сканера приложений трея
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Подстроки имён на шине, по которым узнаются приложения трея
    pub keywords: Vec<String>,
    /// Подстроки имён, которые никогда не считаются приложениями трея
    pub exclude_patterns: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 10,
            keywords: [
                "nm-applet",
                "blueberry-tray",
                "jamesdsp",
                "copyq",
                "kdeconnect",
                "flameshot",
                "steam",
                "discord",
                "telegram",
                "nextcloud",
                "dropbox",
                "redshift",
                "volumeicon",
                "pamac",
                "blueman",
                "applet",
                "tray",
                "indicator",
                "statusnotifier",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            exclude_patterns: [
                "StatusNotifierWatcher",
                "StatusNotifierHost",
                "org.gnome.Shell",
                "org.freedesktop.DBus",
                "org.freedesktop.portal",
                "org.gnome.ScreenSaver",
                "org.freedesktop.ScreenSaver",
                "org.mate.ScreenSaver",
                "org.cinnamon.ScreenSaver",
                "ibus",
                "fcitx",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Конфигурация трея
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrayConfig {
    /// Размер иконки в пикселях
    pub icon_size: u32,
    pub probe_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub rebind_initial_delay_ms: u64,
    pub rebind_max_delay_ms: u64,
    /// Кандидаты в StatusNotifierWatcher в порядке предпочтения
    pub watchers: Vec<WatcherCandidate>,
    /// Тема иконок; None означает тему по умолчанию
    pub icon_theme: Option<String>,
    pub scanner: ScannerConfig,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            icon_size: 24,
            probe_timeout_ms: 1000,
            call_timeout_ms: 25_000,
            rebind_initial_delay_ms: 250,
            rebind_max_delay_ms: 15_000,
            watchers: WatcherCandidate::defaults(),
            icon_theme: None,
            scanner: ScannerConfig::default(),
        }
    }
}

impl TrayConfig {
    /// Путь к файлу конфигурации
    pub fn config_path() -> PathBuf {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".config")
            });

        config_dir.join("hyprline/tray.json")
    }

    /// Загрузить конфигурацию из файла
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Загрузить конфигурацию из указанного файла; при любой ошибке берутся значения по умолчанию
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match serde_json::from_str::<TrayConfig>(&content) {
                    Ok(config) => {
                        info!("Loaded tray config from {:?}", path);
                        return config.sanitized();
                    }
                    Err(e) => warn!("Failed to parse tray config {:?}: {}", path, e),
                },
                Err(e) => warn!("Failed to read tray config {:?}: {}", path, e),
            }
        }

        info!("Using default tray configuration");
        Self::default()
    }

    /// Сохранить конфигурацию в файл
    pub fn save_to(&self, path: &Path) -> Result<(), TrayError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| TrayError::Config(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| TrayError::Config(e.to_string()))?;
        fs::write(path, content).map_err(|e| TrayError::Config(e.to_string()))
    }

    // Пустой список кандидатов или нулевой размер выключили бы трей целиком
    fn sanitized(mut self) -> Self {
        if self.watchers.is_empty() {
            warn!("Tray config has no watchers, using defaults");
            self.watchers = WatcherCandidate::defaults();
        }
        if self.icon_size == 0 {
            self.icon_size = Self::default().icon_size;
        }
        if self.rebind_max_delay_ms < self.rebind_initial_delay_ms {
            self.rebind_max_delay_ms = self.rebind_initial_delay_ms;
        }
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn rebind_initial_delay(&self) -> Duration {
        Duration::from_millis(self.rebind_initial_delay_ms)
    }

    pub fn rebind_max_delay(&self) -> Duration {
        Duration::from_millis(self.rebind_max_delay_ms)
    }
}
