use crate::domain::address::TrayItemAddress;
use crate::domain::error::TrayError;
use crate::domain::models::{ItemSignal, ItemStatus, PropertyCache, ToolTip};
use crate::domain::status_notifier_service::ItemTransport;
use crate::tray::events::TrayEvent;
use crate::tray::subscription::SubscriptionToken;
use async_channel::Sender;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Поля кэша, которые надо перечитать после сигнала
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Status,
    IconPixmap,
    IconName,
    AttentionIconName,
    IconThemePath,
    Title,
    ToolTip,
    Menu,
}

impl Field {
    const ALL: [Field; 8] = [
        Field::Status,
        Field::IconPixmap,
        Field::IconName,
        Field::AttentionIconName,
        Field::IconThemePath,
        Field::Title,
        Field::ToolTip,
        Field::Menu,
    ];

    fn name(self) -> &'static str {
        match self {
            Field::Status => "Status",
            Field::IconPixmap => "IconPixmap",
            Field::IconName => "IconName",
            Field::AttentionIconName => "AttentionIconName",
            Field::IconThemePath => "IconThemePath",
            Field::Title => "Title",
            Field::ToolTip => "ToolTip",
            Field::Menu => "Menu",
        }
    }

    fn for_signal(signal: &ItemSignal) -> &'static [Field] {
        match signal {
            // Overlay мы не рисуем, но приложения часто меняют его вместе с основной иконкой
            ItemSignal::NewIcon | ItemSignal::NewOverlayIcon => {
                &[Field::IconPixmap, Field::IconName, Field::IconThemePath]
            }
            ItemSignal::NewAttentionIcon => &[Field::AttentionIconName],
            ItemSignal::NewToolTip => &[Field::ToolTip],
            ItemSignal::NewTitle => &[Field::Title],
            ItemSignal::NewStatus(_) | ItemSignal::Vanished => &[],
        }
    }
}

/// Соединение с одним элементом трея
pub struct ItemProxy {
    address: TrayItemAddress,
    transport: Box<dyn ItemTransport>,
    call_timeout: Duration,
}

impl ItemProxy {
    pub fn new(address: TrayItemAddress, transport: Box<dyn ItemTransport>, call_timeout: Duration) -> Self {
        Self {
            address,
            transport,
            call_timeout,
        }
    }

    /// Читает все свойства элемента.
    ///
    /// Ошибка одного свойства оставляет это поле пустым. Ошибка возвращается,
    /// если не удалось прочитать вообще ничего или элемент не ответил за `call_timeout`.
    pub async fn fetch_properties(&self) -> Result<PropertyCache, TrayError> {
        let mut cache = PropertyCache::default();
        let mut missing = Vec::new();

        for field in Field::ALL {
            match self.read_field(field, &mut cache).await {
                Ok(()) => {}
                // Зависший элемент не ждём по таймауту на каждое свойство
                Err(TrayError::Timeout) => {
                    debug!("{}: {} timed out", self.address, field.name());
                    return Err(TrayError::Timeout);
                }
                Err(e) => {
                    debug!("{}: {} unavailable: {}", self.address, field.name(), e);
                    missing.push(field.name());
                }
            }
        }

        if missing.len() == Field::ALL.len() {
            return Err(TrayError::ItemUnreachable(self.address.to_string()));
        }

        if !missing.is_empty() {
            let partial = TrayError::PropertyFetchPartialFailure { fields: missing };
            debug!("{}: {}", self.address, partial);
        }

        Ok(cache)
    }

    /// Перечитывает только поля, которых касается сигнал.
    /// При ошибке чтения старое значение поля сохраняется.
    pub async fn refresh(&self, signal: &ItemSignal, cache: &mut PropertyCache) -> Result<(), TrayError> {
        if let ItemSignal::NewStatus(status) = signal {
            cache.status = ItemStatus::parse(status);
            return Ok(());
        }

        let fields = Field::for_signal(signal);
        let mut last_error = None;
        let mut failed = 0;

        for &field in fields {
            if let Err(e) = self.read_field(field, cache).await {
                debug!("{}: refresh of {} failed: {}", self.address, field.name(), e);
                failed += 1;
                last_error = Some(e);
            }
        }

        match last_error {
            Some(e) if failed == fields.len() => Err(e),
            _ => Ok(()),
        }
    }

    /// Подписывается на сигналы элемента; они приходят в очередь цикла событий
    pub async fn subscribe(&self, sink: Sender<TrayEvent>) -> Result<SubscriptionToken, TrayError> {
        let stream = self.bounded(self.transport.signals()).await?;

        let address = self.address.clone();
        let end_address = self.address.clone();
        Ok(SubscriptionToken::forward(
            stream,
            sink,
            move |signal| TrayEvent::Item {
                address: address.clone(),
                signal,
            },
            Some(TrayEvent::Item {
                address: end_address,
                signal: ItemSignal::Vanished,
            }),
        ))
    }

    pub async fn activate(&self, x: i32, y: i32) -> Result<(), TrayError> {
        self.bounded(self.transport.activate(x, y))
            .await
            .map_err(|e| e.into_call_failed("Activate"))
    }

    pub async fn context_menu(&self, x: i32, y: i32) -> Result<(), TrayError> {
        self.bounded(self.transport.context_menu(x, y))
            .await
            .map_err(|e| e.into_call_failed("ContextMenu"))
    }

    pub async fn secondary_activate(&self, x: i32, y: i32) -> Result<(), TrayError> {
        self.bounded(self.transport.secondary_activate(x, y))
            .await
            .map_err(|e| e.into_call_failed("SecondaryActivate"))
    }

    async fn read_field(&self, field: Field, cache: &mut PropertyCache) -> Result<(), TrayError> {
        match field {
            Field::Status => {
                let status = self.bounded(self.transport.status()).await?;
                cache.status = ItemStatus::parse(&status);
            }
            Field::IconPixmap => {
                let pixmaps = self.bounded(self.transport.icon_pixmap()).await?;
                cache.icon_pixmaps = pixmaps;
            }
            Field::IconName => {
                cache.icon_name = non_empty(self.bounded(self.transport.icon_name()).await?);
            }
            Field::AttentionIconName => {
                cache.attention_icon_name = non_empty(self.bounded(self.transport.attention_icon_name()).await?);
            }
            Field::IconThemePath => {
                cache.icon_theme_path = non_empty(self.bounded(self.transport.icon_theme_path()).await?);
            }
            Field::Title => {
                cache.title = non_empty(self.bounded(self.transport.title()).await?);
            }
            Field::ToolTip => {
                let tooltip = self.bounded(self.transport.tool_tip()).await?;
                cache.tooltip = non_empty_tooltip(tooltip);
            }
            Field::Menu => {
                let menu = self.bounded(self.transport.menu()).await?;
                // "/" означает отсутствие меню
                cache.menu_path = non_empty(menu).filter(|path| path != "/");
            }
        }
        Ok(())
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T, TrayError>>) -> Result<T, TrayError> {
        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| TrayError::Timeout)?
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn non_empty_tooltip(tooltip: ToolTip) -> Option<ToolTip> {
    if tooltip.title.is_empty() && tooltip.body.is_empty() && tooltip.icon_name.is_empty() {
        None
    } else {
        Some(tooltip)
    }
}
