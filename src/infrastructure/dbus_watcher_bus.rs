use crate::domain::error::TrayError;
use crate::domain::models::{WatcherCandidate, WatcherSignal};
use crate::domain::status_notifier_service::{WatcherBus, WatcherSession};
use crate::infrastructure::status_notifier_proxy::StatusNotifierWatcherProxy;
use async_trait::async_trait;
use futures::future::ready;
use futures::stream::{self, BoxStream, StreamExt};
use zbus::fdo::DBusProxy;
use zbus::names::BusName;
use zbus::proxy::CacheProperties;
use zbus::Connection;

/// Поиск StatusNotifierWatcher на session bus
pub struct DbusWatcherBus {
    connection: Connection,
    dbus: DBusProxy<'static>,
}

impl DbusWatcherBus {
    pub async fn new(connection: Connection) -> Result<Self, TrayError> {
        let dbus = DBusProxy::new(&connection).await?;
        Ok(Self { connection, dbus })
    }
}

#[async_trait]
impl WatcherBus for DbusWatcherBus {
    async fn name_owner(&self, name: &str) -> Result<Option<String>, TrayError> {
        let bus_name = BusName::try_from(name).map_err(|e| TrayError::InvalidAddress {
            address: name.to_string(),
            reason: e.to_string(),
        })?;

        match self.dbus.get_name_owner(bus_name).await {
            Ok(owner) => Ok(Some(owner.as_str().to_string())),
            Err(zbus::fdo::Error::NameHasNoOwner(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn open(&self, candidate: &WatcherCandidate) -> Result<Box<dyn WatcherSession>, TrayError> {
        let proxy = StatusNotifierWatcherProxy::builder(&self.connection)
            .destination(candidate.service.clone())?
            .path(candidate.path.clone())?
            .interface(candidate.interface.clone())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;

        Ok(Box::new(DbusWatcherSession {
            proxy,
            dbus: self.dbus.clone(),
            service: candidate.service.clone(),
        }))
    }
}

struct DbusWatcherSession {
    proxy: StatusNotifierWatcherProxy<'static>,
    dbus: DBusProxy<'static>,
    service: String,
}

#[async_trait]
impl WatcherSession for DbusWatcherSession {
    async fn registered_items(&self) -> Result<Vec<String>, TrayError> {
        Ok(self.proxy.registered_status_notifier_items().await?)
    }

    async fn signals(&self) -> Result<BoxStream<'static, WatcherSignal>, TrayError> {
        let registered = self
            .proxy
            .receive_status_notifier_item_registered()
            .await?
            .filter_map(|signal| {
                ready(
                    signal
                        .args()
                        .ok()
                        .map(|args| WatcherSignal::ItemRegistered(args.service().to_string())),
                )
            })
            .boxed();

        let unregistered = self
            .proxy
            .receive_status_notifier_item_unregistered()
            .await?
            .filter_map(|signal| {
                ready(
                    signal
                        .args()
                        .ok()
                        .map(|args| WatcherSignal::ItemUnregistered(args.service().to_string())),
                )
            })
            .boxed();

        // Watcher пропал с шины (перезапуск или падение)
        let lost = self
            .dbus
            .receive_name_owner_changed_with_args(&[(0, self.service.as_str())])
            .await?
            .filter_map(|signal| {
                ready(match signal.args() {
                    Ok(args) if args.new_owner().is_none() => Some(WatcherSignal::ConnectionLost),
                    _ => None,
                })
            })
            .boxed();

        Ok(stream::select_all(vec![registered, unregistered, lost]).boxed())
    }
}
