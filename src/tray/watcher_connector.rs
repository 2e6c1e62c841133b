use crate::domain::error::TrayError;
use crate::domain::models::{WatcherCandidate, WatcherSignal};
use crate::domain::status_notifier_service::{WatcherBus, WatcherSession};
use crate::tray::events::TrayEvent;
use crate::tray::subscription::SubscriptionToken;
use async_channel::Sender;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Активное подключение к StatusNotifierWatcher
pub struct WatcherBinding {
    // Подписка объявлена первой: при drop она снимается раньше сессии
    subscription: SubscriptionToken,
    session: Box<dyn WatcherSession>,
    candidate: WatcherCandidate,
    owner: String,
    generation: u64,
    call_timeout: Duration,
}

impl WatcherBinding {
    pub fn candidate(&self) -> &WatcherCandidate {
        &self.candidate
    }

    /// Уникальное имя процесса, владеющего именем watcher'а
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_subscribed(&self) -> bool {
        !self.subscription.is_released()
    }

    /// Текущий список зарегистрированных элементов
    pub async fn registered_items(&self) -> Result<Vec<String>, TrayError> {
        tokio::time::timeout(self.call_timeout, self.session.registered_items())
            .await
            .unwrap_or(Err(TrayError::Timeout))
    }
}

impl Drop for WatcherBinding {
    fn drop(&mut self) {
        self.subscription.release();
        debug!("Watcher binding #{} to {} dropped", self.generation, self.candidate.service);
    }
}

/// Ищет живой watcher среди кандидатов и подписывается на его сигналы
pub struct WatcherConnector {
    bus: Arc<dyn WatcherBus>,
    candidates: Vec<WatcherCandidate>,
    probe_timeout: Duration,
    call_timeout: Duration,
    generation: u64,
}

impl WatcherConnector {
    /// `probe_timeout` ограничивает GetNameOwner, `call_timeout` - все остальные вызовы
    pub fn new(
        bus: Arc<dyn WatcherBus>,
        candidates: Vec<WatcherCandidate>,
        probe_timeout: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            bus,
            candidates,
            probe_timeout,
            call_timeout,
            generation: 0,
        }
    }

    /// Поколение последнего успешного подключения (0, если их не было)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Перебирает кандидатов по порядку; побеждает первый с живым владельцем.
    ///
    /// Подписка на сигналы оформляется до того, как вызывающий прочитает
    /// список элементов, поэтому регистрации между ними не теряются.
    pub async fn connect(&mut self, sink: Sender<TrayEvent>) -> Result<WatcherBinding, TrayError> {
        for candidate in &self.candidates {
            let owner = match tokio::time::timeout(self.probe_timeout, self.bus.name_owner(&candidate.service)).await {
                Ok(Ok(Some(owner))) => owner,
                Ok(Ok(None)) => {
                    debug!("{} has no owner", candidate.service);
                    continue;
                }
                Ok(Err(e)) => {
                    debug!("Probe of {} failed: {}", candidate.service, e);
                    continue;
                }
                Err(_) => {
                    debug!("Probe of {} timed out", candidate.service);
                    continue;
                }
            };

            let session = match tokio::time::timeout(self.call_timeout, self.bus.open(candidate))
                .await
                .unwrap_or(Err(TrayError::Timeout))
            {
                Ok(session) => session,
                Err(e) => {
                    warn!("Failed to open {}: {}", candidate.service, e);
                    continue;
                }
            };

            let stream = match tokio::time::timeout(self.call_timeout, session.signals())
                .await
                .unwrap_or(Err(TrayError::Timeout))
            {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Failed to subscribe to {}: {}", candidate.service, e);
                    continue;
                }
            };

            let generation = self.generation + 1;
            let subscription = SubscriptionToken::forward(
                stream,
                sink.clone(),
                move |signal| TrayEvent::Watcher { generation, signal },
                Some(TrayEvent::Watcher {
                    generation,
                    signal: WatcherSignal::ConnectionLost,
                }),
            );
            self.generation = generation;

            info!("Bound to {} ({}), binding #{}", candidate.service, owner, generation);
            return Ok(WatcherBinding {
                subscription,
                session,
                candidate: candidate.clone(),
                owner,
                generation,
                call_timeout: self.call_timeout,
            });
        }

        Err(TrayError::NoWatcherAvailable)
    }
}

/// Задержки между попытками переподключения: удваиваются до потолка
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.next = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tray::testing::{entries, MockBus, MockWatcher};

    fn connector(bus: &MockBus) -> WatcherConnector {
        WatcherConnector::new(
            Arc::new(bus.clone()),
            WatcherCandidate::defaults(),
            Duration::from_millis(50),
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn first_live_candidate_wins() {
        let bus = MockBus::new();
        bus.own("org.freedesktop.StatusNotifierWatcher", MockWatcher::new(&[]));
        bus.own("org.ayatana.StatusNotifierWatcher", MockWatcher::new(&[]));
        let (tx, _rx) = async_channel::unbounded();

        let binding = connector(&bus).connect(tx).await.unwrap();
        assert_eq!(binding.candidate().service, "org.freedesktop.StatusNotifierWatcher");
        assert_eq!(
            entries(&bus.probes),
            vec!["org.kde.StatusNotifierWatcher", "org.freedesktop.StatusNotifierWatcher"]
        );
        assert_eq!(entries(&bus.opened), vec!["org.freedesktop.StatusNotifierWatcher"]);
    }

    #[tokio::test]
    async fn hanging_probe_is_skipped() {
        let bus = MockBus::new();
        bus.own("org.kde.StatusNotifierWatcher", MockWatcher::new(&[]));
        bus.hang_on("org.kde.StatusNotifierWatcher");
        bus.own("org.freedesktop.StatusNotifierWatcher", MockWatcher::new(&[]));
        let (tx, _rx) = async_channel::unbounded();

        let binding = connector(&bus).connect(tx).await.unwrap();
        assert_eq!(binding.candidate().service, "org.freedesktop.StatusNotifierWatcher");
    }

    #[tokio::test]
    async fn no_owner_means_no_watcher() {
        let bus = MockBus::new();
        let (tx, _rx) = async_channel::unbounded();

        let err = connector(&bus).connect(tx).await.err().unwrap();
        assert!(matches!(err, TrayError::NoWatcherAvailable));
        assert_eq!(entries(&bus.probes).len(), 4);
        assert!(entries(&bus.opened).is_empty());
    }

    #[tokio::test]
    async fn binding_forwards_signals_with_generation() {
        let bus = MockBus::new();
        let watcher = MockWatcher::new(&["org.example.App"]);
        bus.own("org.kde.StatusNotifierWatcher", watcher.clone());
        let (tx, rx) = async_channel::unbounded();
        let mut connector = connector(&bus);

        let first = connector.connect(tx.clone()).await.unwrap();
        assert_eq!(first.generation(), 1);
        assert_eq!(first.registered_items().await.unwrap(), vec!["org.example.App"]);
        drop(first);

        let second = connector.connect(tx).await.unwrap();
        assert_eq!(second.generation(), 2);
        assert!(second.is_subscribed());

        watcher.emit(WatcherSignal::ItemRegistered("org.example.Other".into()));
        match rx.recv().await.unwrap() {
            TrayEvent::Watcher { generation, signal } => {
                assert_eq!(generation, 2);
                assert_eq!(signal, WatcherSignal::ItemRegistered("org.example.Other".into()));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn hung_roster_read_times_out() {
        let bus = MockBus::new();
        let watcher = MockWatcher::new(&["org.example.App"]);
        watcher.hang_roster();
        bus.own("org.kde.StatusNotifierWatcher", watcher);
        let (tx, _rx) = async_channel::unbounded();

        let binding = connector(&bus).connect(tx).await.unwrap();
        assert!(binding.owner().starts_with(':'));
        let result = tokio::time::timeout(Duration::from_secs(2), binding.registered_items())
            .await
            .expect("roster read must give up after call_timeout");
        assert!(matches!(result, Err(TrayError::Timeout)));
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut backoff = Backoff::new(Duration::from_millis(250), Duration::from_secs(1));
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![250, 500, 1000, 1000, 1000]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(250));
    }
}
