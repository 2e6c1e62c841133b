use crate::domain::error::TrayError;
use std::fmt;
use zbus::names::BusName;
use zbus::zvariant::ObjectPath;

/// Путь объекта по умолчанию, если адрес содержит только имя сервиса
pub const DEFAULT_ITEM_PATH: &str = "/StatusNotifierItem";

/// Канонический адрес элемента трея: (имя сервиса, путь объекта)
///
/// Watcher может прислать как `":1.42/org/ayatana/NotificationItem/app"`,
/// так и просто `"org.example.App"`. Оба варианта приводятся к одной паре,
/// которая используется как ключ реестра.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrayItemAddress {
    service: String,
    path: String,
}

impl TrayItemAddress {
    /// Разбирает строку адреса. Синтаксис не проверяется, см. [`Self::validate`].
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('/') {
            Some((service, path)) => Self {
                service: service.to_string(),
                path: format!("/{}", path),
            },
            None => Self {
                service: raw.to_string(),
                path: DEFAULT_ITEM_PATH.to_string(),
            },
        }
    }

    pub fn new(service: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Проверяет имя сервиса и путь по правилам D-Bus
    pub fn validate(&self) -> Result<(), TrayError> {
        BusName::try_from(self.service.as_str()).map_err(|e| TrayError::InvalidAddress {
            address: self.to_string(),
            reason: format!("bad service name: {}", e),
        })?;

        ObjectPath::try_from(self.path.as_str()).map_err(|e| TrayError::InvalidAddress {
            address: self.to_string(),
            reason: format!("bad object path: {}", e),
        })?;

        Ok(())
    }
}

impl fmt::Display for TrayItemAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.service, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_service_with_path() {
        let addr = TrayItemAddress::parse("com.example.App-1234/CustomPath");
        assert_eq!(addr.service(), "com.example.App-1234");
        assert_eq!(addr.path(), "/CustomPath");
    }

    #[test]
    fn parse_bare_service_uses_default_path() {
        let addr = TrayItemAddress::parse("com.example.App");
        assert_eq!(addr.service(), "com.example.App");
        assert_eq!(addr.path(), "/StatusNotifierItem");
    }

    #[test]
    fn both_spellings_share_one_key() {
        let bare = TrayItemAddress::parse("com.example.App");
        let full = TrayItemAddress::parse("com.example.App/StatusNotifierItem");
        assert_eq!(bare, full);
    }

    #[test]
    fn splits_at_first_slash_only() {
        let addr = TrayItemAddress::parse(":1.42/org/ayatana/NotificationItem/app");
        assert_eq!(addr.service(), ":1.42");
        assert_eq!(addr.path(), "/org/ayatana/NotificationItem/app");
        assert!(addr.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_names() {
        assert!(TrayItemAddress::parse("com.example.App").validate().is_ok());
        assert!(TrayItemAddress::parse("noDots").validate().is_err());
        assert!(TrayItemAddress::parse("com..broken").validate().is_err());
        assert!(TrayItemAddress::parse("").validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_paths() {
        assert!(TrayItemAddress::parse("com.example.App/with space").validate().is_err());
        assert!(TrayItemAddress::parse("com.example.App/trailing/").validate().is_err());
        assert!(TrayItemAddress::parse("com.example.App/a//b").validate().is_err());
    }

    #[test]
    fn display_is_service_then_path() {
        let addr = TrayItemAddress::parse("org.kde.app");
        assert_eq!(addr.to_string(), "org.kde.app/StatusNotifierItem");
    }
}
