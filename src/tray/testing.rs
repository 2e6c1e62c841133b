//! Заглушки транспорта и контейнера для тестов трея

use crate::domain::address::TrayItemAddress;
use crate::domain::error::TrayError;
use crate::domain::models::{
    ItemSignal, Pixmap, ToolTip, VisualHandle, VisualState, WatcherCandidate, WatcherSignal,
};
use crate::domain::status_notifier_service::{ItemConnector, ItemTransport, WatcherBus, WatcherSession};
use crate::domain::tray_container::TrayContainer;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Debug, Clone)]
pub struct MockState {
    pub status: Result<String, String>,
    pub icon_pixmap: Result<Vec<Pixmap>, String>,
    pub icon_name: Result<String, String>,
    pub attention_icon_name: Result<String, String>,
    pub icon_theme_path: Result<String, String>,
    pub title: Result<String, String>,
    pub tool_tip: Result<ToolTip, String>,
    pub menu: Result<String, String>,
    pub fail_calls: bool,
    pub fail_subscribe: bool,
    /// Чтения, вызовы и подписка никогда не завершаются
    pub hang: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            status: Ok("Active".into()),
            icon_pixmap: Ok(Vec::new()),
            icon_name: Ok(String::new()),
            attention_icon_name: Ok(String::new()),
            icon_theme_path: Ok(String::new()),
            title: Ok(String::new()),
            tool_tip: Ok(ToolTip::default()),
            menu: Ok("/".into()),
            fail_calls: false,
            fail_subscribe: false,
            hang: false,
        }
    }
}

/// Удалённый элемент трея в памяти.
///
/// Как и на настоящей шине, сигнал получают только уже подписанные.
#[derive(Clone)]
pub struct MockItem {
    state: Arc<Mutex<MockState>>,
    reads: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<(&'static str, i32, i32)>>>,
    subscribers: Arc<Mutex<Vec<async_channel::Sender<ItemSignal>>>>,
    closed: Arc<AtomicBool>,
    emit_on_read: Arc<Mutex<Option<ItemSignal>>>,
}

impl MockItem {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            reads: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(AtomicBool::new(false)),
            emit_on_read: Arc::new(Mutex::new(None)),
        }
    }

    pub fn unreachable() -> Self {
        let item = Self::new();
        item.set(|s| {
            let gone = || Err("org.freedesktop.DBus.Error.ServiceUnknown".to_string());
            s.status = gone();
            s.icon_pixmap = Err("org.freedesktop.DBus.Error.ServiceUnknown".into());
            s.icon_name = gone();
            s.attention_icon_name = gone();
            s.icon_theme_path = gone();
            s.title = gone();
            s.tool_tip = Err("org.freedesktop.DBus.Error.ServiceUnknown".into());
            s.menu = gone();
        });
        item
    }

    pub fn set(&self, update: impl FnOnce(&mut MockState)) {
        update(&mut self.state.lock().unwrap());
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(&'static str, i32, i32)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn emit(&self, signal: ItemSignal) {
        for subscriber in self.subscribers.lock().unwrap().iter() {
            let _ = subscriber.try_send(signal.clone());
        }
    }

    /// Элемент пошлёт сигнал во время первого же чтения свойства
    pub fn emit_during_fetch(&self, signal: ItemSignal) {
        *self.emit_on_read.lock().unwrap() = Some(signal);
    }

    /// Закрывает поток сигналов, как будто элемент пропал
    pub fn close_signals(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for subscriber in self.subscribers.lock().unwrap().iter() {
            subscriber.close();
        }
    }

    async fn stall_if_hung(&self) {
        let hang = self.state.lock().unwrap().hang;
        if hang {
            futures::future::pending::<()>().await;
        }
    }

    pub fn transport(&self) -> MockTransport {
        MockTransport { item: self.clone() }
    }
}

pub struct MockTransport {
    item: MockItem,
}

impl MockTransport {
    async fn read<T: Clone>(&self, pick: impl FnOnce(&MockState) -> Result<T, String>) -> Result<T, TrayError> {
        self.item.stall_if_hung().await;
        self.item.reads.fetch_add(1, Ordering::SeqCst);
        let value = pick(&self.item.state.lock().unwrap());

        let pending = self.item.emit_on_read.lock().unwrap().take();
        if let Some(signal) = pending {
            self.item.emit(signal);
        }
        value.map_err(|reason| TrayError::CallFailed { method: "Get", reason })
    }

    async fn call(&self, method: &'static str, x: i32, y: i32) -> Result<(), TrayError> {
        self.item.calls.lock().unwrap().push((method, x, y));
        self.item.stall_if_hung().await;
        if self.item.state.lock().unwrap().fail_calls {
            Err(TrayError::ConnectionLost)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ItemTransport for MockTransport {
    async fn status(&self) -> Result<String, TrayError> {
        self.read(|s| s.status.clone()).await
    }

    async fn icon_pixmap(&self) -> Result<Vec<Pixmap>, TrayError> {
        self.read(|s| s.icon_pixmap.clone()).await
    }

    async fn icon_name(&self) -> Result<String, TrayError> {
        self.read(|s| s.icon_name.clone()).await
    }

    async fn attention_icon_name(&self) -> Result<String, TrayError> {
        self.read(|s| s.attention_icon_name.clone()).await
    }

    async fn icon_theme_path(&self) -> Result<String, TrayError> {
        self.read(|s| s.icon_theme_path.clone()).await
    }

    async fn title(&self) -> Result<String, TrayError> {
        self.read(|s| s.title.clone()).await
    }

    async fn tool_tip(&self) -> Result<ToolTip, TrayError> {
        self.read(|s| s.tool_tip.clone()).await
    }

    async fn menu(&self) -> Result<String, TrayError> {
        self.read(|s| s.menu.clone()).await
    }

    async fn signals(&self) -> Result<BoxStream<'static, ItemSignal>, TrayError> {
        self.item.stall_if_hung().await;
        if self.item.state.lock().unwrap().fail_subscribe {
            return Err(TrayError::ConnectionLost);
        }

        let (tx, rx) = async_channel::unbounded();
        if self.item.closed.load(Ordering::SeqCst) {
            tx.close();
        }
        self.item.subscribers.lock().unwrap().push(tx);
        Ok(rx.boxed())
    }

    async fn activate(&self, x: i32, y: i32) -> Result<(), TrayError> {
        self.call("Activate", x, y).await
    }

    async fn context_menu(&self, x: i32, y: i32) -> Result<(), TrayError> {
        self.call("ContextMenu", x, y).await
    }

    async fn secondary_activate(&self, x: i32, y: i32) -> Result<(), TrayError> {
        self.call("SecondaryActivate", x, y).await
    }
}

/// Набор элементов, доступных по адресу
#[derive(Clone, Default)]
pub struct MockConnector {
    items: Arc<Mutex<HashMap<TrayItemAddress, MockItem>>>,
    hung: Arc<Mutex<Vec<TrayItemAddress>>>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, raw_address: &str, item: MockItem) {
        self.items
            .lock()
            .unwrap()
            .insert(TrayItemAddress::parse(raw_address), item);
    }

    /// Подключение к этому адресу никогда не завершается
    pub fn hang_on(&self, raw_address: &str) {
        self.hung.lock().unwrap().push(TrayItemAddress::parse(raw_address));
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ItemConnector for MockConnector {
    async fn connect(&self, address: &TrayItemAddress) -> Result<Box<dyn ItemTransport>, TrayError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let hang = self.hung.lock().unwrap().contains(address);
        if hang {
            futures::future::pending::<()>().await;
        }
        match self.items.lock().unwrap().get(address) {
            Some(item) => Ok(Box::new(item.transport())),
            None => Err(TrayError::ItemUnreachable(address.to_string())),
        }
    }
}

/// Контейнер, записывающий все операции в журнал
pub struct MockContainer {
    log: Log,
    next_id: u64,
    pub visuals: Arc<Mutex<HashMap<VisualHandle, VisualState>>>,
}

impl MockContainer {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            next_id: 0,
            visuals: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl TrayContainer for MockContainer {
    fn add_visual(&mut self, state: &VisualState) -> VisualHandle {
        self.next_id += 1;
        let handle = VisualHandle(self.next_id);
        self.visuals.lock().unwrap().insert(handle, state.clone());
        self.log.lock().unwrap().push(format!("add {}", state.address));
        handle
    }

    fn update_visual(&mut self, handle: VisualHandle, state: &VisualState) {
        self.visuals.lock().unwrap().insert(handle, state.clone());
        self.log.lock().unwrap().push(format!("update {}", state.address));
    }

    fn remove_visual(&mut self, handle: VisualHandle) {
        self.visuals.lock().unwrap().remove(&handle);
        self.log.lock().unwrap().push(format!("remove {}", handle.0));
    }
}

/// Один watcher на шине
#[derive(Clone)]
pub struct MockWatcher {
    items: Arc<Mutex<Vec<String>>>,
    roster_hangs: Arc<AtomicBool>,
    signal_tx: async_channel::Sender<WatcherSignal>,
    signal_rx: async_channel::Receiver<WatcherSignal>,
}

impl MockWatcher {
    pub fn new(items: &[&str]) -> Self {
        let (signal_tx, signal_rx) = async_channel::unbounded();
        Self {
            items: Arc::new(Mutex::new(items.iter().map(|s| s.to_string()).collect())),
            roster_hangs: Arc::new(AtomicBool::new(false)),
            signal_tx,
            signal_rx,
        }
    }

    pub fn emit(&self, signal: WatcherSignal) {
        let _ = self.signal_tx.try_send(signal);
    }

    /// RegisteredStatusNotifierItems никогда не отвечает
    pub fn hang_roster(&self) {
        self.roster_hangs.store(true, Ordering::SeqCst);
    }
}

struct MockWatcherSession {
    watcher: MockWatcher,
}

#[async_trait]
impl WatcherSession for MockWatcherSession {
    async fn registered_items(&self) -> Result<Vec<String>, TrayError> {
        if self.watcher.roster_hangs.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        Ok(self.watcher.items.lock().unwrap().clone())
    }

    async fn signals(&self) -> Result<BoxStream<'static, WatcherSignal>, TrayError> {
        Ok(self.watcher.signal_rx.clone().boxed())
    }
}

/// Шина с набором владельцев имён
#[derive(Clone, Default)]
pub struct MockBus {
    owners: Arc<Mutex<HashMap<String, MockWatcher>>>,
    slow: Arc<Mutex<Vec<String>>>,
    pub probes: Log,
    pub opened: Log,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn own(&self, name: &str, watcher: MockWatcher) {
        self.owners.lock().unwrap().insert(name.to_string(), watcher);
    }

    pub fn release(&self, name: &str) {
        self.owners.lock().unwrap().remove(name);
    }

    /// Проверка этого имени зависает дольше любого таймаута
    pub fn hang_on(&self, name: &str) {
        self.slow.lock().unwrap().push(name.to_string());
    }
}

#[async_trait]
impl WatcherBus for MockBus {
    async fn name_owner(&self, name: &str) -> Result<Option<String>, TrayError> {
        self.probes.lock().unwrap().push(name.to_string());
        let hang = self.slow.lock().unwrap().iter().any(|n| n == name);
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(self
            .owners
            .lock()
            .unwrap()
            .contains_key(name)
            .then(|| format!(":1.{}", name.len())))
    }

    async fn open(&self, candidate: &WatcherCandidate) -> Result<Box<dyn WatcherSession>, TrayError> {
        self.opened.lock().unwrap().push(candidate.service.clone());
        let watcher = self
            .owners
            .lock()
            .unwrap()
            .get(&candidate.service)
            .cloned()
            .ok_or(TrayError::ConnectionLost)?;
        Ok(Box::new(MockWatcherSession { watcher }))
    }
}
