use crate::domain::models::{RenderableIcon, VisualHandle, VisualState};
use crate::domain::tray_container::TrayContainer;
use std::collections::HashMap;
use tracing::info;

/// Контейнер без UI: печатает состояние трея в лог
#[derive(Debug, Default)]
pub struct LoggingContainer {
    next_id: u64,
    shown: HashMap<VisualHandle, String>,
}

impl LoggingContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

fn describe(state: &VisualState) -> String {
    let icon = match &state.icon {
        RenderableIcon::Pixels(bitmap) => format!("{}x{} pixmap", bitmap.width, bitmap.height),
        RenderableIcon::Named { name, .. } => format!("icon '{}'", name),
        RenderableIcon::Fallback => "fallback icon".to_string(),
    };
    match &state.tooltip {
        Some(tooltip) => format!("{} [{:?}] {}: {}", state.address, state.status, icon, tooltip.plain().replace('\n', " / ")),
        None => format!("{} [{:?}] {}", state.address, state.status, icon),
    }
}

impl TrayContainer for LoggingContainer {
    fn add_visual(&mut self, state: &VisualState) -> VisualHandle {
        self.next_id += 1;
        let handle = VisualHandle(self.next_id);
        info!("[Tray] + {}", describe(state));
        self.shown.insert(handle, state.address.to_string());
        handle
    }

    fn update_visual(&mut self, _handle: VisualHandle, state: &VisualState) {
        info!("[Tray] ~ {}", describe(state));
    }

    fn remove_visual(&mut self, handle: VisualHandle) {
        if let Some(address) = self.shown.remove(&handle) {
            info!("[Tray] - {}", address);
        }
    }
}
