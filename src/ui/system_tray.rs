use crate::domain::models::{ItemStatus, MouseButton, RenderableIcon, TooltipText, VisualHandle, VisualState};
use crate::domain::tray_container::TrayContainer;
use crate::tray::host::TrayHandle;
use gtk4::prelude::*;
use gtk4::{gdk, gdk_pixbuf, glib};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Команда для GTK потока
enum UiCommand {
    Add(VisualHandle, VisualState),
    Update(VisualHandle, VisualState),
    Remove(VisualHandle),
}

/// Контейнер трея для цикла событий: пересылает команды в GTK main loop
pub struct GtkTrayContainer {
    next_id: u64,
    tx: async_channel::Sender<UiCommand>,
}

impl TrayContainer for GtkTrayContainer {
    fn add_visual(&mut self, state: &VisualState) -> VisualHandle {
        self.next_id += 1;
        let handle = VisualHandle(self.next_id);
        let _ = self.tx.try_send(UiCommand::Add(handle, state.clone()));
        handle
    }

    fn update_visual(&mut self, handle: VisualHandle, state: &VisualState) {
        let _ = self.tx.try_send(UiCommand::Update(handle, state.clone()));
    }

    fn remove_visual(&mut self, handle: VisualHandle) {
        let _ = self.tx.try_send(UiCommand::Remove(handle));
    }
}

pub struct SystemTrayWidget {
    container: gtk4::Box,
}

impl SystemTrayWidget {
    /// Создаёт виджет и парный ему контейнер для `TrayHost::register_container`
    pub fn new(handle: TrayHandle, icon_size: i32) -> (Self, GtkTrayContainer) {
        let container = gtk4::Box::new(gtk4::Orientation::Horizontal, 0);
        container.add_css_class("system-tray");

        let (tx, rx) = async_channel::unbounded();
        let buttons: Rc<RefCell<HashMap<VisualHandle, gtk4::Button>>> = Rc::new(RefCell::new(HashMap::new()));

        let container_clone = container.clone();
        glib::timeout_add_local(std::time::Duration::from_millis(100), move || {
            while let Ok(command) = rx.try_recv() {
                match command {
                    UiCommand::Add(visual, state) => {
                        let button = Self::create_button(&handle, visual, icon_size);
                        Self::apply_state(&button, &state, icon_size);
                        container_clone.append(&button);
                        buttons.borrow_mut().insert(visual, button);
                    }
                    UiCommand::Update(visual, state) => {
                        if let Some(button) = buttons.borrow().get(&visual) {
                            Self::apply_state(button, &state, icon_size);
                        }
                    }
                    UiCommand::Remove(visual) => {
                        if let Some(button) = buttons.borrow_mut().remove(&visual) {
                            container_clone.remove(&button);
                        }
                    }
                }
            }

            if rx.is_closed() && rx.is_empty() {
                glib::ControlFlow::Break
            } else {
                glib::ControlFlow::Continue
            }
        });

        (Self { container }, GtkTrayContainer { next_id: 0, tx })
    }

    pub fn widget(&self) -> &gtk4::Box {
        &self.container
    }

    fn create_button(handle: &TrayHandle, visual: VisualHandle, icon_size: i32) -> gtk4::Button {
        let button = gtk4::Button::new();
        button.add_css_class("tray-item");
        button.set_size_request(icon_size, icon_size);

        // Все кнопки мыши; какая нажата, решает MouseButton::from_gdk_button
        let gesture = gtk4::GestureClick::new();
        gesture.set_button(0);
        let handle = handle.clone();
        gesture.connect_released(move |gesture, _, x, y| {
            if let Some(button) = MouseButton::from_gdk_button(gesture.current_button()) {
                handle.post_click(visual, button, x as i32, y as i32);
            }
        });
        button.add_controller(gesture);

        button
    }

    fn apply_state(button: &gtk4::Button, state: &VisualState, icon_size: i32) {
        let image = match &state.icon {
            RenderableIcon::Pixels(bitmap) => {
                let pixbuf = gdk_pixbuf::Pixbuf::from_mut_slice(
                    bitmap.rgba.clone(),
                    gdk_pixbuf::Colorspace::Rgb,
                    true, // has_alpha
                    8,    // bits_per_sample
                    bitmap.width as i32,
                    bitmap.height as i32,
                    bitmap.width as i32 * 4, // rowstride
                );
                let texture = gdk::Texture::for_pixbuf(&pixbuf);
                gtk4::Image::from_paintable(Some(&texture))
            }
            RenderableIcon::Named { name, theme_path } => {
                if let (Some(path), Some(display)) = (theme_path, gdk::Display::default()) {
                    gtk4::IconTheme::for_display(&display).add_search_path(path);
                }
                gtk4::Image::from_icon_name(name)
            }
            RenderableIcon::Fallback => gtk4::Image::from_icon_name(crate::domain::models::FALLBACK_ICON_NAME),
        };
        image.set_pixel_size(icon_size);
        button.set_child(Some(&image));

        button.set_tooltip_markup(state.tooltip.as_ref().map(tooltip_markup).as_deref());

        if state.status == ItemStatus::NeedsAttention {
            button.add_css_class("needs-attention");
        } else {
            button.remove_css_class("needs-attention");
        }
        button.set_visible(state.status != ItemStatus::Passive);
    }
}

/// Экранированный заголовок, текст под ним мельче
fn tooltip_markup(tooltip: &TooltipText) -> String {
    let title = glib::markup_escape_text(&tooltip.title);
    match &tooltip.body {
        Some(body) => format!("{}\n<small>{}</small>", title, glib::markup_escape_text(body)),
        None => title.to_string(),
    }
}
