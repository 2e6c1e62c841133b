use crate::domain::icon_theme::IconTheme;
use gtk4::{gdk, glib};
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;
use tracing::debug;

/// Тема иконок GTK для цикла событий трея.
///
/// `gtk4::IconTheme` живёт только в GTK потоке, поэтому вопрос уходит
/// в главный контекст GLib, а ответ ждём не дольше `reply_timeout`.
pub struct GtkIconTheme {
    reply_timeout: Duration,
}

impl GtkIconTheme {
    pub fn new(reply_timeout: Duration) -> Self {
        Self { reply_timeout }
    }
}

impl IconTheme for GtkIconTheme {
    fn has_icon(&self, name: &str, extra_path: Option<&str>) -> bool {
        let path = Path::new(name);
        if path.is_absolute() {
            return path.is_file();
        }

        let (tx, rx) = mpsc::channel();
        let name = name.to_string();
        let extra_path = extra_path.map(str::to_string);

        glib::MainContext::default().invoke(move || {
            let found = match gdk::Display::default() {
                Some(display) => {
                    let theme = gtk4::IconTheme::for_display(&display);
                    if let Some(extra) = &extra_path {
                        // IconThemePath элемента добавляем в поиск один раз
                        if !theme.search_path().iter().any(|p| p == Path::new(extra)) {
                            theme.add_search_path(extra);
                        }
                    }
                    theme.has_icon(&name)
                }
                None => false,
            };
            let _ = tx.send(found);
        });

        match rx.recv_timeout(self.reply_timeout) {
            Ok(found) => found,
            Err(e) => {
                debug!("GTK icon theme did not answer: {}", e);
                false
            }
        }
    }
}
