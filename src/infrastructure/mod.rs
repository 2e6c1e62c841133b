pub mod dbus_item_transport;
pub mod dbus_watcher_bus;
pub mod logging_container;
pub mod status_notifier_proxy;
pub mod tray_app_scanner;
pub mod xdg_icon_theme;
