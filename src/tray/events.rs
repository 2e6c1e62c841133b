use crate::domain::address::TrayItemAddress;
use crate::domain::error::TrayError;
use crate::domain::models::{ItemSignal, MouseButton, VisualHandle, WatcherSignal};
use tokio::sync::oneshot;

/// Всё, что попадает в цикл событий трея
#[derive(Debug)]
pub enum TrayEvent {
    /// Сигнал watcher'а. `generation` отличает текущее подключение от старых.
    Watcher { generation: u64, signal: WatcherSignal },

    /// Сигнал одного элемента трея
    Item { address: TrayItemAddress, signal: ItemSignal },

    /// Клик по визуальному элементу
    Click {
        visual: VisualHandle,
        button: MouseButton,
        x: i32,
        y: i32,
        reply: Option<oneshot::Sender<Result<(), TrayError>>>,
    },

    /// Результат фонового сканера приложений трея
    CandidatesChanged(Vec<String>),

    Shutdown,
}
