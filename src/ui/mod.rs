pub mod gtk_icon_theme;
pub mod system_tray;
