pub mod events;
pub mod host;
pub mod icon_resolver;
pub mod input_dispatcher;
pub mod item_proxy;
pub mod item_registry;
pub mod subscription;
pub mod watcher_connector;

#[cfg(test)]
mod testing;

pub use host::{TrayHandle, TrayHost};
