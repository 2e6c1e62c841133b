use crate::domain::address::TrayItemAddress;
use crate::domain::error::TrayError;
use crate::domain::models::{MouseButton, VisualHandle};
use crate::tray::item_registry::ItemRegistry;
use tracing::{debug, info, warn};

/// Переводит клики по иконкам в вызовы методов элемента.
///
/// Клик по уже удалённому элементу молча игнорируется.
#[derive(Debug, Default, Clone, Copy)]
pub struct InputDispatcher;

impl InputDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Клик по визуальному элементу контейнера
    pub async fn dispatch(
        &self,
        registry: &mut ItemRegistry,
        visual: VisualHandle,
        button: MouseButton,
        x: i32,
        y: i32,
    ) -> Result<(), TrayError> {
        let Some(address) = registry.lookup_visual(visual).map(|item| item.address().clone()) else {
            debug!("Click on unknown visual {:?} ignored", visual);
            return Ok(());
        };

        match button {
            MouseButton::Primary => self.on_primary_click(registry, &address, x, y).await,
            MouseButton::Secondary => self.on_secondary_click(registry, &address, x, y).await,
            MouseButton::Middle => self.on_middle_click(registry, &address, x, y).await,
        }
    }

    pub async fn on_primary_click(
        &self,
        registry: &mut ItemRegistry,
        address: &TrayItemAddress,
        x: i32,
        y: i32,
    ) -> Result<(), TrayError> {
        let result = match registry.lookup(address) {
            Some(item) => {
                debug!("Activate {} at ({}, {})", address, x, y);
                item.proxy().activate(x, y).await
            }
            None => return Ok(()),
        };
        settle(registry, address, result)
    }

    pub async fn on_secondary_click(
        &self,
        registry: &mut ItemRegistry,
        address: &TrayItemAddress,
        x: i32,
        y: i32,
    ) -> Result<(), TrayError> {
        let result = match registry.lookup(address) {
            Some(item) => {
                match &item.cache().menu_path {
                    Some(menu) => debug!("ContextMenu {} at ({}, {}), menu {}", address, x, y, menu),
                    None => debug!("ContextMenu {} at ({}, {})", address, x, y),
                }
                item.proxy().context_menu(x, y).await
            }
            None => return Ok(()),
        };
        settle(registry, address, result)
    }

    pub async fn on_middle_click(
        &self,
        registry: &mut ItemRegistry,
        address: &TrayItemAddress,
        x: i32,
        y: i32,
    ) -> Result<(), TrayError> {
        let result = match registry.lookup(address) {
            Some(item) => {
                debug!("SecondaryActivate {} at ({}, {})", address, x, y);
                item.proxy().secondary_activate(x, y).await
            }
            None => return Ok(()),
        };
        settle(registry, address, result)
    }
}

/// Вторая ошибка подряд у пропавшего элемента убирает его из трея
fn settle(registry: &mut ItemRegistry, address: &TrayItemAddress, result: Result<(), TrayError>) -> Result<(), TrayError> {
    if let Err(e) = &result {
        let stale = registry.lookup(address).map(|item| item.is_stale()).unwrap_or(false);
        if stale {
            info!("Dropping vanished tray item {} after failed call: {}", address, e);
            registry.remove_address(address);
        } else {
            warn!("Tray item {}: {}", address, e);
        }
    }
    result
}
