use crate::config::TrayConfig;
use crate::domain::error::TrayError;
use crate::domain::icon_theme::IconTheme;
use crate::domain::models::{MouseButton, VisualHandle, WatcherSignal};
use crate::domain::status_notifier_service::{ItemConnector, WatcherBus};
use crate::domain::tray_container::TrayContainer;
use crate::tray::events::TrayEvent;
use crate::tray::icon_resolver::IconResolver;
use crate::tray::input_dispatcher::InputDispatcher;
use crate::tray::item_registry::ItemRegistry;
use crate::tray::watcher_connector::{Backoff, WatcherBinding, WatcherConnector};
use async_channel::{Receiver, Sender};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Ручка для общения UI и фоновых задач с циклом событий трея
#[derive(Clone)]
pub struct TrayHandle {
    sender: Sender<TrayEvent>,
}

impl TrayHandle {
    /// Клик по иконке; ждёт результата вызова метода элемента
    pub async fn dispatch_click(&self, visual: VisualHandle, button: MouseButton, x: i32, y: i32) -> Result<(), TrayError> {
        let (reply, result) = oneshot::channel();
        self.sender
            .send(TrayEvent::Click {
                visual,
                button,
                x,
                y,
                reply: Some(reply),
            })
            .await
            .map_err(|_| TrayError::ConnectionLost)?;
        result.await.map_err(|_| TrayError::ConnectionLost)?
    }

    /// Клик без ожидания результата (для callback'ов тулкита)
    pub fn post_click(&self, visual: VisualHandle, button: MouseButton, x: i32, y: i32) {
        let event = TrayEvent::Click {
            visual,
            button,
            x,
            y,
            reply: None,
        };
        if self.sender.try_send(event).is_err() {
            debug!("Tray loop is gone, click dropped");
        }
    }

    /// Результат сканирования приложений трея
    pub fn post_candidates(&self, candidates: Vec<String>) {
        let _ = self.sender.try_send(TrayEvent::CandidatesChanged(candidates));
    }

    pub fn shutdown(&self) {
        let _ = self.sender.try_send(TrayEvent::Shutdown);
    }

    /// Цикл событий завершился
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Цикл событий трея: владеет реестром, подключением к watcher'у и диспетчером кликов
pub struct TrayHost {
    registry: ItemRegistry,
    watchers: WatcherConnector,
    dispatcher: InputDispatcher,
    binding: Option<WatcherBinding>,
    backoff: Backoff,
    rebind_at: Option<Instant>,
    candidates: Vec<String>,
    sender: Sender<TrayEvent>,
    events: Receiver<TrayEvent>,
}

impl TrayHost {
    pub fn new(
        config: &TrayConfig,
        bus: Arc<dyn WatcherBus>,
        connector: Arc<dyn ItemConnector>,
        theme: Arc<dyn IconTheme>,
    ) -> Self {
        let (sender, events) = async_channel::unbounded();

        Self {
            registry: ItemRegistry::new(
                connector,
                IconResolver::new(theme),
                sender.clone(),
                config.icon_size,
                config.call_timeout(),
            ),
            watchers: WatcherConnector::new(
                bus,
                config.watchers.clone(),
                config.probe_timeout(),
                config.call_timeout(),
            ),
            dispatcher: InputDispatcher::new(),
            binding: None,
            backoff: Backoff::new(config.rebind_initial_delay(), config.rebind_max_delay()),
            rebind_at: None,
            candidates: Vec::new(),
            sender,
            events,
        }
    }

    pub fn handle(&self) -> TrayHandle {
        TrayHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn register_container(&mut self, container: Box<dyn TrayContainer>) {
        self.registry.register_container(container);
    }

    pub fn on_item_added(&mut self, callback: impl Fn(VisualHandle) + Send + 'static) {
        self.registry.on_item_added(Box::new(callback));
    }

    pub fn on_item_removed(&mut self, callback: impl Fn(VisualHandle) + Send + 'static) {
        self.registry.on_item_removed(Box::new(callback));
    }

    pub fn registry(&self) -> &ItemRegistry {
        &self.registry
    }

    pub fn binding(&self) -> Option<&WatcherBinding> {
        self.binding.as_ref()
    }

    /// Запускает цикл до `TrayHandle::shutdown`
    pub async fn run(mut self) {
        info!("Tray host started");
        self.bind().await;

        loop {
            let event = match self.rebind_at {
                Some(deadline) => {
                    tokio::select! {
                        event = self.events.recv() => event,
                        _ = tokio::time::sleep_until(deadline) => {
                            self.rebind_at = None;
                            self.bind().await;
                            continue;
                        }
                    }
                }
                None => self.events.recv().await,
            };

            let Ok(event) = event else { break };
            if !self.handle_event(event).await {
                break;
            }
        }

        self.shutdown();
    }

    /// Подключается к watcher'у и забирает список уже зарегистрированных элементов.
    /// При неудаче планирует повтор с растущей задержкой.
    pub async fn bind(&mut self) {
        // Старая подписка снимается до новой попытки
        self.binding = None;

        let binding = match self.watchers.connect(self.sender.clone()).await {
            Ok(binding) => binding,
            Err(e) => {
                self.schedule_rebind(e);
                return;
            }
        };

        let roster = match binding.registered_items().await {
            Ok(roster) => roster,
            Err(e) => {
                warn!("Failed to read registered items from {}: {}", binding.candidate().service, e);
                drop(binding);
                self.schedule_rebind(e);
                return;
            }
        };

        self.backoff.reset();
        self.binding = Some(binding);

        debug!("Watcher reports {} registered items", roster.len());
        for raw in roster {
            // Ошибки уже залогированы реестром
            let _ = self.registry.upsert(&raw).await;
        }
    }

    /// Обрабатывает одно событие; false означает завершение цикла
    pub async fn handle_event(&mut self, event: TrayEvent) -> bool {
        match event {
            TrayEvent::Watcher { generation, signal } => {
                let current = self.binding.as_ref().map(|b| b.generation());
                if current != Some(generation) {
                    debug!("Ignoring {:?} from stale watcher binding #{}", signal, generation);
                    return true;
                }
                self.on_watcher_signal(signal).await;
            }
            TrayEvent::Item { address, signal } => {
                self.registry.apply_signal(&address, signal).await;
            }
            TrayEvent::Click {
                visual,
                button,
                x,
                y,
                reply,
            } => {
                let result = self.dispatcher.dispatch(&mut self.registry, visual, button, x, y).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            TrayEvent::CandidatesChanged(candidates) => self.on_candidates(candidates),
            TrayEvent::Shutdown => return false,
        }
        true
    }

    async fn on_watcher_signal(&mut self, signal: WatcherSignal) {
        match signal {
            WatcherSignal::ItemRegistered(raw) => {
                let _ = self.registry.upsert(&raw).await;
            }
            WatcherSignal::ItemUnregistered(raw) => {
                self.registry.remove(&raw);
            }
            WatcherSignal::ConnectionLost => {
                if let Some(binding) = self.binding.take() {
                    warn!(
                        "Lost StatusNotifierWatcher {} ({})",
                        binding.candidate().service,
                        binding.owner()
                    );
                }
                self.schedule_rebind(TrayError::ConnectionLost);
            }
        }
    }

    fn on_candidates(&mut self, candidates: Vec<String>) {
        if candidates == self.candidates {
            return;
        }
        if candidates.is_empty() {
            info!("No tray applications detected");
        } else {
            info!("Tray applications detected: {}", candidates.join(", "));
        }
        self.candidates = candidates;
    }

    /// Последний результат сканера приложений трея
    pub fn scanned_candidates(&self) -> &[String] {
        &self.candidates
    }

    fn schedule_rebind(&mut self, reason: TrayError) {
        let delay = self.backoff.next_delay();
        info!("{}; retrying watcher discovery in {:?}", reason, delay);
        self.rebind_at = Some(Instant::now() + delay);
    }

    /// Снимает все элементы и подписку на watcher
    pub fn shutdown(&mut self) {
        self.rebind_at = None;
        self.binding = None;
        self.registry.clear();
        info!("Tray host stopped");
    }
}
