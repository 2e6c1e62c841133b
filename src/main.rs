use anyhow::Context;
use hyprline_tray::config::TrayConfig;
use hyprline_tray::domain::icon_theme::IconTheme;
use hyprline_tray::infrastructure::dbus_item_transport::DbusItemConnector;
use hyprline_tray::infrastructure::dbus_watcher_bus::DbusWatcherBus;
use hyprline_tray::infrastructure::tray_app_scanner::TrayAppScanner;
use hyprline_tray::tray::{TrayHandle, TrayHost};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = TrayConfig::load();

    #[cfg(feature = "gtk")]
    return gtk_ui::run(config);

    #[cfg(not(feature = "gtk"))]
    run_headless(config)
}

fn new_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}

async fn build_host(config: &TrayConfig, theme: Arc<dyn IconTheme>) -> anyhow::Result<TrayHost> {
    let connection = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    let bus = DbusWatcherBus::new(connection.clone()).await?;

    Ok(TrayHost::new(
        config,
        Arc::new(bus),
        Arc::new(DbusItemConnector::new(connection)),
        theme,
    ))
}

fn start_scanner(config: &TrayConfig, handle: TrayHandle) {
    if config.scanner.enabled {
        TrayAppScanner::new(config.scanner.clone(), config.watchers.clone(), handle).start();
    }
}

#[cfg(not(feature = "gtk"))]
fn run_headless(config: TrayConfig) -> anyhow::Result<()> {
    use hyprline_tray::infrastructure::logging_container::LoggingContainer;
    use hyprline_tray::infrastructure::xdg_icon_theme::XdgIconTheme;

    let rt = new_runtime()?;
    rt.block_on(async move {
        let theme = Arc::new(XdgIconTheme::new(config.icon_theme.as_deref()));
        let mut host = build_host(&config, theme).await?;
        host.register_container(Box::new(LoggingContainer::new()));

        let handle = host.handle();
        start_scanner(&config, handle.clone());

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, shutting down");
                handle.shutdown();
            }
        });

        host.run().await;
        Ok(())
    })
}

#[cfg(feature = "gtk")]
mod gtk_ui {
    use super::*;
    use gtk4::prelude::*;
    use gtk4::glib;
    use hyprline_tray::ui::gtk_icon_theme::GtkIconTheme;
    use hyprline_tray::ui::system_tray::SystemTrayWidget;

    pub fn run(config: TrayConfig) -> anyhow::Result<()> {
        let app = gtk4::Application::builder()
            .application_id("ru.hyprline.tray")
            .build();

        app.connect_activate(move |app| {
            if let Err(e) = build_ui(app, &config) {
                tracing::error!("Failed to start tray: {:#}", e);
                app.quit();
            }
        });

        // Аргументы командной строки GTK не нужны
        app.run_with_args::<&str>(&[]);
        Ok(())
    }

    fn build_ui(app: &gtk4::Application, config: &TrayConfig) -> anyhow::Result<()> {
        let rt = new_runtime()?;
        // Тему иконок спрашиваем у GTK; icon_theme из конфига тут не нужен
        let theme = Arc::new(GtkIconTheme::new(config.probe_timeout()));
        let mut host = rt.block_on(build_host(config, theme))?;

        let handle = host.handle();
        let (widget, container) = SystemTrayWidget::new(handle.clone(), config.icon_size as i32);
        host.register_container(Box::new(container));
        start_scanner(config, handle.clone());

        // Цикл событий трея живёт в своём потоке, как мониторинг трея в баре
        std::thread::spawn(move || rt.block_on(host.run()));

        let window = gtk4::ApplicationWindow::builder()
            .application(app)
            .title("hyprline-tray")
            .child(widget.widget())
            .build();

        window.connect_close_request(move |_| {
            handle.shutdown();
            glib::Propagation::Proceed
        });
        window.present();
        Ok(())
    }
}
