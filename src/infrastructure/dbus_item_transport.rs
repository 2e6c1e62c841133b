use crate::domain::address::TrayItemAddress;
use crate::domain::error::TrayError;
use crate::domain::models::{ItemSignal, Pixmap, ToolTip};
use crate::domain::status_notifier_service::{ItemConnector, ItemTransport};
use crate::infrastructure::status_notifier_proxy::{StatusNotifierItemProxy, ITEM_INTERFACES};
use async_trait::async_trait;
use futures::future::ready;
use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use tracing::debug;
use zbus::proxy::CacheProperties;
use zbus::Connection;

/// Подключение к элементам трея через session bus
pub struct DbusItemConnector {
    connection: Connection,
}

impl DbusItemConnector {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    /// Прокси на `interface`, если элемент отвечает на нём чтением Status
    async fn answering_proxy(
        &self,
        address: &TrayItemAddress,
        interface: &'static str,
    ) -> Result<StatusNotifierItemProxy<'static>, TrayError> {
        let proxy = StatusNotifierItemProxy::builder(&self.connection)
            .destination(address.service().to_string())?
            .path(address.path().to_string())?
            .interface(interface)?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;
        proxy.status().await?;
        Ok(proxy)
    }
}

/// Первый интерфейс, на котором `open` удался. Ошибка на одном
/// интерфейсе (в том числе при сборке прокси) не мешает попробовать следующий.
async fn first_answering<T, F, Fut>(address: &TrayItemAddress, interfaces: &[&'static str], open: F) -> Option<T>
where
    F: Fn(&'static str) -> Fut,
    Fut: Future<Output = Result<T, TrayError>>,
{
    for &interface in interfaces {
        match open(interface).await {
            Ok(value) => {
                debug!("{} speaks {}", address, interface);
                return Some(value);
            }
            Err(e) => debug!("{} does not answer on {}: {}", address, interface, e),
        }
    }
    None
}

#[async_trait]
impl ItemConnector for DbusItemConnector {
    /// Пробует org.kde-интерфейс, затем org.freedesktop: живым считается тот,
    /// у которого читается Status
    async fn connect(&self, address: &TrayItemAddress) -> Result<Box<dyn ItemTransport>, TrayError> {
        let proxy = first_answering(address, &ITEM_INTERFACES, |interface| self.answering_proxy(address, interface))
            .await
            .ok_or_else(|| TrayError::ItemUnreachable(address.to_string()))?;

        Ok(Box::new(DbusItemTransport {
            proxy,
            connection: self.connection.clone(),
            service: address.service().to_string(),
        }))
    }
}

struct DbusItemTransport {
    proxy: StatusNotifierItemProxy<'static>,
    connection: Connection,
    service: String,
}

#[async_trait]
impl ItemTransport for DbusItemTransport {
    async fn status(&self) -> Result<String, TrayError> {
        Ok(self.proxy.status().await?)
    }

    async fn icon_pixmap(&self) -> Result<Vec<Pixmap>, TrayError> {
        let pixmaps = self.proxy.icon_pixmap().await?;
        Ok(pixmaps.into_iter().map(Pixmap::from).collect())
    }

    async fn icon_name(&self) -> Result<String, TrayError> {
        Ok(self.proxy.icon_name().await?)
    }

    async fn attention_icon_name(&self) -> Result<String, TrayError> {
        Ok(self.proxy.attention_icon_name().await?)
    }

    async fn icon_theme_path(&self) -> Result<String, TrayError> {
        Ok(self.proxy.icon_theme_path().await?)
    }

    async fn title(&self) -> Result<String, TrayError> {
        Ok(self.proxy.title().await?)
    }

    async fn tool_tip(&self) -> Result<ToolTip, TrayError> {
        let (icon_name, _pixmaps, title, body) = self.proxy.tool_tip().await?;
        Ok(ToolTip { icon_name, title, body })
    }

    async fn menu(&self) -> Result<String, TrayError> {
        let path = self.proxy.menu().await?;
        Ok(path.as_str().to_string())
    }

    async fn signals(&self) -> Result<BoxStream<'static, ItemSignal>, TrayError> {
        let new_icon = self.proxy.receive_new_icon().await?.map(|_| ItemSignal::NewIcon).boxed();
        let new_attention_icon = self
            .proxy
            .receive_new_attention_icon()
            .await?
            .map(|_| ItemSignal::NewAttentionIcon)
            .boxed();
        let new_overlay_icon = self
            .proxy
            .receive_new_overlay_icon()
            .await?
            .map(|_| ItemSignal::NewOverlayIcon)
            .boxed();
        let new_tool_tip = self
            .proxy
            .receive_new_tool_tip()
            .await?
            .map(|_| ItemSignal::NewToolTip)
            .boxed();
        let new_title = self.proxy.receive_new_title().await?.map(|_| ItemSignal::NewTitle).boxed();
        let new_status = self
            .proxy
            .receive_new_status()
            .await?
            .filter_map(|signal| ready(signal.args().ok().map(|args| ItemSignal::NewStatus(args.status().to_string()))))
            .boxed();

        // Исчезновение владельца имени: приложение закрылось, не отписавшись
        let dbus = zbus::fdo::DBusProxy::new(&self.connection).await?;
        let vanished = dbus
            .receive_name_owner_changed_with_args(&[(0, self.service.as_str())])
            .await?
            .filter_map(|signal| {
                ready(match signal.args() {
                    Ok(args) if args.new_owner().is_none() => Some(ItemSignal::Vanished),
                    _ => None,
                })
            })
            .boxed();

        Ok(stream::select_all(vec![
            new_icon,
            new_attention_icon,
            new_overlay_icon,
            new_tool_tip,
            new_title,
            new_status,
            vanished,
        ])
        .boxed())
    }

    async fn activate(&self, x: i32, y: i32) -> Result<(), TrayError> {
        Ok(self.proxy.activate(x, y).await?)
    }

    async fn context_menu(&self, x: i32, y: i32) -> Result<(), TrayError> {
        Ok(self.proxy.context_menu(x, y).await?)
    }

    async fn secondary_activate(&self, x: i32, y: i32) -> Result<(), TrayError> {
        Ok(self.proxy.secondary_activate(x, y).await?)
    }
}
