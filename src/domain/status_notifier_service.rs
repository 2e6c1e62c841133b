use crate::domain::address::TrayItemAddress;
use crate::domain::error::TrayError;
use crate::domain::models::{ItemSignal, Pixmap, ToolTip, WatcherCandidate, WatcherSignal};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Соединение с одним StatusNotifierItem.
///
/// Каждое свойство читается отдельно, чтобы ошибка одного поля
/// не мешала остальным.
#[async_trait]
pub trait ItemTransport: Send + Sync {
    async fn status(&self) -> Result<String, TrayError>;
    async fn icon_pixmap(&self) -> Result<Vec<Pixmap>, TrayError>;
    async fn icon_name(&self) -> Result<String, TrayError>;
    async fn attention_icon_name(&self) -> Result<String, TrayError>;
    async fn icon_theme_path(&self) -> Result<String, TrayError>;
    async fn title(&self) -> Result<String, TrayError>;
    async fn tool_tip(&self) -> Result<ToolTip, TrayError>;
    async fn menu(&self) -> Result<String, TrayError>;

    /// Поток сигналов элемента. Отписка происходит при drop потока.
    async fn signals(&self) -> Result<BoxStream<'static, ItemSignal>, TrayError>;

    async fn activate(&self, x: i32, y: i32) -> Result<(), TrayError>;
    async fn context_menu(&self, x: i32, y: i32) -> Result<(), TrayError>;
    async fn secondary_activate(&self, x: i32, y: i32) -> Result<(), TrayError>;
}

/// Фабрика соединений с элементами трея
#[async_trait]
pub trait ItemConnector: Send + Sync {
    async fn connect(&self, address: &TrayItemAddress) -> Result<Box<dyn ItemTransport>, TrayError>;
}

/// Доступ к шине для поиска и подключения к StatusNotifierWatcher
#[async_trait]
pub trait WatcherBus: Send + Sync {
    /// Уникальное имя владельца или None, если у имени нет владельца
    async fn name_owner(&self, name: &str) -> Result<Option<String>, TrayError>;

    async fn open(&self, candidate: &WatcherCandidate) -> Result<Box<dyn WatcherSession>, TrayError>;
}

/// Подключение к конкретному watcher'у
#[async_trait]
pub trait WatcherSession: Send + Sync {
    async fn registered_items(&self) -> Result<Vec<String>, TrayError>;

    /// Регистрации, удаления и потеря владельца имени watcher'а
    async fn signals(&self) -> Result<BoxStream<'static, WatcherSignal>, TrayError>;
}
