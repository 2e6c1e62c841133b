use crate::domain::address::TrayItemAddress;
use serde::{Deserialize, Serialize};

// System Tray models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemStatus {
    Passive,
    Active,
    NeedsAttention,
    #[default]
    Unknown,
}

impl ItemStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "Passive" => ItemStatus::Passive,
            "Active" => ItemStatus::Active,
            "NeedsAttention" => ItemStatus::NeedsAttention,
            _ => ItemStatus::Unknown,
        }
    }
}

/// Одна картинка из IconPixmap: ARGB32, порядок байт сетевой
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pixmap {
    pub width: i32,
    pub height: i32,
    pub bytes: Vec<u8>,
}

impl Pixmap {
    pub fn new(width: i32, height: i32, bytes: Vec<u8>) -> Self {
        Self { width, height, bytes }
    }
}

impl From<(i32, i32, Vec<u8>)> for Pixmap {
    fn from((width, height, bytes): (i32, i32, Vec<u8>)) -> Self {
        Self { width, height, bytes }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ToolTip {
    pub icon_name: String,
    pub title: String,
    pub body: String,
}

/// Подсказка для отрисовки: заголовок и необязательный текст под ним
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooltipText {
    pub title: String,
    pub body: Option<String>,
}

impl TooltipText {
    /// Заголовок и текст через перевод строки
    pub fn plain(&self) -> String {
        match &self.body {
            Some(body) => format!("{}\n{}", self.title, body),
            None => self.title.clone(),
        }
    }
}

/// Последнее известное состояние свойств элемента трея.
///
/// Меняется только начальным чтением и обновлениями по сигналам элемента.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyCache {
    pub status: ItemStatus,
    pub icon_pixmaps: Vec<Pixmap>,
    pub icon_name: Option<String>,
    pub attention_icon_name: Option<String>,
    pub icon_theme_path: Option<String>,
    pub title: Option<String>,
    pub tooltip: Option<ToolTip>,
    pub menu_path: Option<String>,
}

impl PropertyCache {
    /// Подсказка: ToolTip, иначе Title
    pub fn tooltip_text(&self) -> Option<TooltipText> {
        match &self.tooltip {
            Some(tip) if !tip.title.is_empty() => Some(TooltipText {
                title: tip.title.clone(),
                body: Some(tip.body.clone()).filter(|body| !body.is_empty()),
            }),
            _ => self.title.clone().filter(|t| !t.is_empty()).map(|title| TooltipText { title, body: None }),
        }
    }
}

/// Готовая к отрисовке RGBA картинка
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub const FALLBACK_ICON_NAME: &str = "image-missing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderableIcon {
    Pixels(Bitmap),
    Named {
        name: String,
        theme_path: Option<String>,
    },
    Fallback,
}

impl RenderableIcon {
    /// Имя иконки темы, если картинка задана именем
    pub fn icon_name(&self) -> Option<&str> {
        match self {
            RenderableIcon::Named { name, .. } => Some(name),
            RenderableIcon::Fallback => Some(FALLBACK_ICON_NAME),
            RenderableIcon::Pixels(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

impl MouseButton {
    /// Номер кнопки GDK: 1 - левая, 2 - средняя, 3 - правая
    pub fn from_gdk_button(button: u32) -> Option<Self> {
        match button {
            1 => Some(MouseButton::Primary),
            2 => Some(MouseButton::Middle),
            3 => Some(MouseButton::Secondary),
            _ => None,
        }
    }
}

/// Непрозрачный идентификатор визуального элемента, выдаётся контейнером
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VisualHandle(pub u64);

/// Всё, что контейнеру нужно для отрисовки одного элемента
#[derive(Debug, Clone, PartialEq)]
pub struct VisualState {
    pub address: TrayItemAddress,
    pub icon: RenderableIcon,
    pub tooltip: Option<TooltipText>,
    pub status: ItemStatus,
}

/// Сигналы элемента трея (org.kde.StatusNotifierItem)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSignal {
    NewIcon,
    NewAttentionIcon,
    NewOverlayIcon,
    NewToolTip,
    NewTitle,
    NewStatus(String),
    /// Владелец имени сервиса пропал с шины
    Vanished,
}

/// Сигналы StatusNotifierWatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherSignal {
    ItemRegistered(String),
    ItemUnregistered(String),
    ConnectionLost,
}

/// Кандидат на роль брокера: имя на шине, путь и интерфейс
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherCandidate {
    pub service: String,
    pub path: String,
    pub interface: String,
}

impl WatcherCandidate {
    pub fn new(service: &str, path: &str, interface: &str) -> Self {
        Self {
            service: service.to_string(),
            path: path.to_string(),
            interface: interface.to_string(),
        }
    }

    /// Известные имена watcher'ов в порядке предпочтения
    pub fn defaults() -> Vec<WatcherCandidate> {
        vec![
            WatcherCandidate::new(
                "org.kde.StatusNotifierWatcher",
                "/StatusNotifierWatcher",
                "org.kde.StatusNotifierWatcher",
            ),
            WatcherCandidate::new(
                "org.freedesktop.StatusNotifierWatcher",
                "/StatusNotifierWatcher",
                "org.freedesktop.StatusNotifierWatcher",
            ),
            WatcherCandidate::new(
                "org.ayatana.StatusNotifierWatcher",
                "/StatusNotifierWatcher",
                "org.kde.StatusNotifierWatcher",
            ),
            WatcherCandidate::new(
                "com.canonical.indicator.application.Watcher",
                "/com/canonical/indicator/application/watcher",
                "org.kde.StatusNotifierWatcher",
            ),
        ]
    }
}
