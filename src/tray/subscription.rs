use crate::tray::events::TrayEvent;
use async_channel::Sender;
use futures::stream::{Stream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::AbortHandle;

/// Подписка на поток сигналов, пересылаемых в цикл событий.
///
/// После `release` ни одно событие больше не попадёт в очередь:
/// флаг проверяется перед каждой отправкой, задача пересылки отменяется.
#[derive(Debug)]
pub struct SubscriptionToken {
    live: Arc<AtomicBool>,
    task: Option<AbortHandle>,
}

/// Наблюдатель за состоянием подписки (не продлевает её жизнь)
#[derive(Debug, Clone)]
pub struct SubscriptionObserver {
    live: Arc<AtomicBool>,
}

impl SubscriptionObserver {
    pub fn is_released(&self) -> bool {
        !self.live.load(Ordering::Acquire)
    }
}

impl SubscriptionToken {
    /// Запускает пересылку `stream` в `sink`.
    /// Если поток закончится сам, в очередь уйдёт `end_event`.
    pub fn forward<S, T, F>(stream: S, sink: Sender<TrayEvent>, wrap: F, end_event: Option<TrayEvent>) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
        T: Send + 'static,
        F: Fn(T) -> TrayEvent + Send + 'static,
    {
        let live = Arc::new(AtomicBool::new(true));
        let flag = live.clone();

        let handle = tokio::spawn(async move {
            let mut stream = Box::pin(stream);
            while let Some(item) = stream.next().await {
                if !flag.load(Ordering::Acquire) {
                    return;
                }
                if sink.send(wrap(item)).await.is_err() {
                    return;
                }
            }

            if flag.load(Ordering::Acquire) {
                if let Some(event) = end_event {
                    let _ = sink.send(event).await;
                }
            }
        });

        Self {
            live,
            task: Some(handle.abort_handle()),
        }
    }

    pub fn release(&mut self) {
        self.live.store(false, Ordering::Release);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_released(&self) -> bool {
        !self.live.load(Ordering::Acquire)
    }

    pub fn observer(&self) -> SubscriptionObserver {
        SubscriptionObserver {
            live: self.live.clone(),
        }
    }
}

impl Drop for SubscriptionToken {
    fn drop(&mut self) {
        self.release();
    }
}
