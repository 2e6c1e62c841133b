use crate::domain::address::TrayItemAddress;
use crate::domain::error::TrayError;
use crate::domain::models::{ItemSignal, PropertyCache, VisualHandle, VisualState};
use crate::domain::status_notifier_service::ItemConnector;
use crate::domain::tray_container::{DetachedContainer, TrayContainer};
use crate::tray::events::TrayEvent;
use crate::tray::icon_resolver::IconResolver;
use crate::tray::item_proxy::ItemProxy;
use crate::tray::subscription::SubscriptionToken;
use async_channel::Sender;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Callback на появление / удаление визуального элемента
pub type VisualCallback = Box<dyn Fn(VisualHandle) + Send>;

/// Зарегистрированный элемент трея
pub struct TrayItem {
    address: TrayItemAddress,
    proxy: ItemProxy,
    cache: PropertyCache,
    visual: VisualHandle,
    subscription: SubscriptionToken,
    stale: bool,
}

impl TrayItem {
    pub fn address(&self) -> &TrayItemAddress {
        &self.address
    }

    pub fn proxy(&self) -> &ItemProxy {
        &self.proxy
    }

    pub fn cache(&self) -> &PropertyCache {
        &self.cache
    }

    pub fn visual(&self) -> VisualHandle {
        self.visual
    }

    pub fn subscription(&self) -> &SubscriptionToken {
        &self.subscription
    }

    /// Элемент пропал с шины, но unregister от watcher'а ещё не пришёл
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

/// Единственный владелец всех элементов трея.
///
/// Только реестр создаёт и уничтожает `ItemProxy` и визуальные элементы.
pub struct ItemRegistry {
    items: BTreeMap<TrayItemAddress, TrayItem>,
    connector: Arc<dyn ItemConnector>,
    resolver: IconResolver,
    container: Box<dyn TrayContainer>,
    sink: Sender<TrayEvent>,
    icon_size: u32,
    call_timeout: Duration,
    on_added: Vec<VisualCallback>,
    on_removed: Vec<VisualCallback>,
}

impl ItemRegistry {
    pub fn new(
        connector: Arc<dyn ItemConnector>,
        resolver: IconResolver,
        sink: Sender<TrayEvent>,
        icon_size: u32,
        call_timeout: Duration,
    ) -> Self {
        Self {
            items: BTreeMap::new(),
            connector,
            resolver,
            container: Box::new(DetachedContainer::default()),
            sink,
            icon_size,
            call_timeout,
            on_added: Vec::new(),
            on_removed: Vec::new(),
        }
    }

    /// Подключает контейнер бара. Уже известные элементы переносятся в него,
    /// подписчики узнают о смене визуальных элементов через обычные callback'и.
    pub fn register_container(&mut self, mut container: Box<dyn TrayContainer>) {
        let mut moved = Vec::new();
        for item in self.items.values_mut() {
            self.container.remove_visual(item.visual);
            let state = visual_state(&self.resolver, self.icon_size, &item.address, &item.cache);
            let old = std::mem::replace(&mut item.visual, container.add_visual(&state));
            moved.push((old, item.visual));
        }
        self.container = container;

        for (old, new) in moved {
            for callback in &self.on_removed {
                callback(old);
            }
            for callback in &self.on_added {
                callback(new);
            }
        }
    }

    pub fn on_item_added(&mut self, callback: VisualCallback) {
        self.on_added.push(callback);
    }

    pub fn on_item_removed(&mut self, callback: VisualCallback) {
        self.on_removed.push(callback);
    }

    pub fn lookup(&self, address: &TrayItemAddress) -> Option<&TrayItem> {
        self.items.get(address)
    }

    pub fn lookup_visual(&self, visual: VisualHandle) -> Option<&TrayItem> {
        self.items.values().find(|item| item.visual == visual)
    }

    pub fn addresses(&self) -> Vec<TrayItemAddress> {
        self.items.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Добавляет элемент по адресу из watcher'а. Повторный вызов ничего не делает.
    ///
    /// Регистрация атомарна: если прокси, подписка или чтение свойств
    /// не удались, в реестре ничего не остаётся и визуальный элемент не создаётся.
    pub async fn upsert(&mut self, raw_address: &str) -> Result<(), TrayError> {
        let address = TrayItemAddress::parse(raw_address);

        if self.items.contains_key(&address) {
            debug!("Tray item {} already registered", address);
            return Ok(());
        }

        if let Err(e) = address.validate() {
            warn!("Skipping tray item: {}", e);
            return Err(e);
        }

        let transport = tokio::time::timeout(self.call_timeout, self.connector.connect(&address))
            .await
            .unwrap_or(Err(TrayError::Timeout))
            .map_err(|e| {
                warn!("Failed to connect to tray item {}: {}", address, e);
                e
            })?;
        let proxy = ItemProxy::new(address.clone(), transport, self.call_timeout);

        // Подписка до чтения: изменения во время чтения придут сигналами
        let mut subscription = proxy.subscribe(self.sink.clone()).await.map_err(|e| {
            warn!("Failed to subscribe to tray item {}: {}", address, e);
            e
        })?;

        let cache = match proxy.fetch_properties().await {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Failed to read tray item {}: {}", address, e);
                subscription.release();
                return Err(e);
            }
        };

        // Визуальный элемент создаём последним: дальше ничего не может упасть
        let state = visual_state(&self.resolver, self.icon_size, &address, &cache);
        let visual = self.container.add_visual(&state);

        self.items.insert(
            address.clone(),
            TrayItem {
                address: address.clone(),
                proxy,
                cache,
                visual,
                subscription,
                stale: false,
            },
        );
        info!("Tray item added: {}", address);

        for callback in &self.on_added {
            callback(visual);
        }
        Ok(())
    }

    /// Удаляет элемент: подписка → визуальный элемент → запись в реестре
    pub fn remove(&mut self, raw_address: &str) -> bool {
        self.remove_address(&TrayItemAddress::parse(raw_address))
    }

    pub fn remove_address(&mut self, address: &TrayItemAddress) -> bool {
        let visual = match self.items.get_mut(address) {
            Some(item) => {
                item.subscription.release();
                self.container.remove_visual(item.visual);
                item.visual
            }
            None => {
                debug!("Tray item {} is not registered", address);
                return false;
            }
        };

        self.items.remove(address);
        info!("Tray item removed: {}", address);

        for callback in &self.on_removed {
            callback(visual);
        }
        true
    }

    /// Удаляет все элементы (завершение работы)
    pub fn clear(&mut self) {
        for address in self.addresses() {
            self.remove_address(&address);
        }
    }

    /// Применяет сигнал элемента. Сигналы уже удалённых элементов игнорируются.
    pub async fn apply_signal(&mut self, address: &TrayItemAddress, signal: ItemSignal) {
        let Some(item) = self.items.get_mut(address) else {
            debug!("Signal {:?} for unknown tray item {}", signal, address);
            return;
        };

        if signal == ItemSignal::Vanished {
            debug!("Tray item {} vanished from the bus", address);
            item.stale = true;
            return;
        }

        match item.proxy.refresh(&signal, &mut item.cache).await {
            Ok(()) => {
                let state = visual_state(&self.resolver, self.icon_size, &item.address, &item.cache);
                self.container.update_visual(item.visual, &state);
            }
            Err(e) if item.stale => {
                warn!("Stale tray item {} failed again ({}), dropping it", address, e);
                self.remove_address(address);
            }
            Err(e) => debug!("Refresh of {} after {:?} failed: {}", address, signal, e),
        }
    }
}

fn visual_state(
    resolver: &IconResolver,
    icon_size: u32,
    address: &TrayItemAddress,
    cache: &PropertyCache,
) -> VisualState {
    VisualState {
        address: address.clone(),
        icon: resolver.resolve(cache, icon_size),
        tooltip: cache.tooltip_text(),
        status: cache.status,
    }
}
