use thiserror::Error;

/// Ошибки системного трея.
///
/// Ни одна из них не должна завершать процесс бара: каждая лишь
/// отключает часть функциональности (иконку, подсказку, весь трей).
#[derive(Debug, Error)]
pub enum TrayError {
    #[error("no StatusNotifierWatcher is available on the session bus")]
    NoWatcherAvailable,

    #[error("invalid tray item address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("some item properties are unavailable: {}", fields.join(", "))]
    PropertyFetchPartialFailure { fields: Vec<&'static str> },

    #[error("tray item {0} is unreachable")]
    ItemUnreachable(String),

    #[error("{method} failed: {reason}")]
    CallFailed { method: &'static str, reason: String },

    #[error("connection lost")]
    ConnectionLost,

    #[error("D-Bus call timed out")]
    Timeout,

    #[error("D-Bus error: {0}")]
    Bus(#[from] zbus::Error),

    #[error("D-Bus error: {0}")]
    Fdo(#[from] zbus::fdo::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl TrayError {
    /// Переводит ошибку транспорта в CallFailed для пользовательских действий
    pub fn into_call_failed(self, method: &'static str) -> Self {
        match self {
            TrayError::CallFailed { .. } => self,
            other => TrayError::CallFailed {
                method,
                reason: other.to_string(),
            },
        }
    }
}
