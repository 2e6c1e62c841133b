use crate::config::ScannerConfig;
use crate::domain::address::TrayItemAddress;
use crate::domain::error::TrayError;
use crate::domain::models::WatcherCandidate;
use crate::infrastructure::status_notifier_proxy::StatusNotifierWatcherProxy;
use crate::tray::host::TrayHandle;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};
use zbus::fdo::DBusProxy;
use zbus::names::BusName;
use zbus::proxy::CacheProperties;
use zbus::Connection;

const APP_NAME_PREFIXES: [&str; 4] = ["org.", "com.", "io.", "net."];

/// Периодически ищет на шине приложения, похожие на приложения трея.
///
/// Работает в своём потоке со своим runtime и только отправляет
/// результаты в цикл событий трея.
pub struct TrayAppScanner {
    config: ScannerConfig,
    watchers: Vec<WatcherCandidate>,
    handle: TrayHandle,
}

impl TrayAppScanner {
    pub fn new(config: ScannerConfig, watchers: Vec<WatcherCandidate>, handle: TrayHandle) -> Self {
        Self {
            config,
            watchers,
            handle,
        }
    }

    /// Запускает сканирование в фоновом потоке
    pub fn start(self) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("Tray scanner runtime failed to start: {}", e);
                    return;
                }
            };

            rt.block_on(async move {
                if let Err(e) = self.run().await {
                    warn!("Tray scanner stopped: {}", e);
                }
            });
        })
    }

    async fn run(self) -> Result<(), TrayError> {
        let connection = Connection::session().await?;
        let dbus = DBusProxy::new(&connection).await?;
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut last = None;

        while !self.handle.is_closed() {
            match self.scan(&connection, &dbus).await {
                Ok(found) => {
                    if last.as_ref() != Some(&found) {
                        self.handle.post_candidates(found.clone());
                        last = Some(found);
                    }
                }
                Err(e) => debug!("Tray scan failed: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
        Ok(())
    }

    async fn scan(&self, connection: &Connection, dbus: &DBusProxy<'static>) -> Result<Vec<String>, TrayError> {
        let names: Vec<String> = dbus
            .list_names()
            .await?
            .into_iter()
            .map(|name| name.as_str().to_string())
            .collect();

        let mut roster = Vec::new();
        for watcher in &self.watchers {
            if !names.contains(&watcher.service) {
                continue;
            }
            match read_roster(connection, watcher).await {
                Ok(items) => roster.extend(items),
                Err(e) => debug!("Cannot read roster of {}: {}", watcher.service, e),
            }
        }

        let mut resolved = HashMap::new();
        for item in &roster {
            let service = TrayItemAddress::parse(item).service().to_string();
            if service.starts_with(':') && !resolved.contains_key(&service) {
                let info = describe_unique_name(dbus, &service).await;
                resolved.insert(service, info);
            }
        }

        Ok(find_tray_applications(&names, &roster, &self.config, &resolved))
    }
}

async fn read_roster(connection: &Connection, watcher: &WatcherCandidate) -> Result<Vec<String>, TrayError> {
    let proxy = StatusNotifierWatcherProxy::builder(connection)
        .destination(watcher.service.clone())?
        .path(watcher.path.clone())?
        .interface(watcher.interface.clone())?
        .cache_properties(CacheProperties::No)
        .build()
        .await?;
    Ok(proxy.registered_status_notifier_items().await?)
}

/// ":1.42" → ":1.42 (App: telegram, PID: 1234)"
async fn describe_unique_name(dbus: &DBusProxy<'static>, service: &str) -> String {
    let Ok(name) = BusName::try_from(service) else {
        return service.to_string();
    };

    match dbus.get_connection_unix_process_id(name).await {
        Ok(pid) => match std::fs::read_to_string(format!("/proc/{}/comm", pid)) {
            Ok(comm) => format!("{} (App: {}, PID: {})", service, comm.trim(), pid),
            Err(_) => format!("{} (PID: {})", service, pid),
        },
        Err(_) => format!("{} (PID unavailable)", service),
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn should_exclude(name: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| contains_ignore_case(name, pattern))
}

/// Имя приложения из строки вида ":1.42 (App: telegram, PID: 1234)"
fn app_name(info: &str) -> Option<&str> {
    let rest = info.split_once("(App: ")?.1;
    Some(rest.split_once(", PID: ")?.0)
}

/// Список приложений трея: элементы watcher'а плюс имена на шине,
/// совпавшие с ключевыми словами.
///
/// `resolved` сопоставляет уникальным именам их описание с процессом.
pub fn find_tray_applications(
    names: &[String],
    roster: &[String],
    config: &ScannerConfig,
    resolved: &HashMap<String, String>,
) -> Vec<String> {
    let mut found = BTreeSet::new();
    let mut seen_services = HashSet::new();
    let mut resolved_apps = Vec::new();

    for item in roster {
        let service = TrayItemAddress::parse(item).service().to_string();
        let info = resolved.get(&service).cloned().unwrap_or_else(|| service.clone());
        seen_services.insert(service.clone());

        if should_exclude(&info, &config.exclude_patterns) || should_exclude(&service, &config.exclude_patterns) {
            continue;
        }
        if let Some(app) = app_name(&info) {
            resolved_apps.push(app.to_string());
        }
        found.insert(info);
    }

    for name in names {
        if name.starts_with(':') || seen_services.contains(name) {
            continue;
        }
        if !APP_NAME_PREFIXES.iter().any(|prefix| name.starts_with(prefix)) {
            continue;
        }
        if should_exclude(name, &config.exclude_patterns) {
            continue;
        }

        let Some(keyword) = config.keywords.iter().find(|k| contains_ignore_case(name, k)) else {
            continue;
        };
        // Приложение уже найдено через watcher под уникальным именем
        let duplicate = resolved_apps.iter().any(|app| contains_ignore_case(app, keyword));
        if !duplicate {
            found.insert(name.clone());
        }
    }

    found.into_iter().collect()
}
