use crate::domain::icon_theme::IconTheme;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const FALLBACK_THEME: &str = "hicolor";

const ICON_EXTENSIONS: [&str; 3] = ["png", "svg", "xpm"];

// Глубже size/category иконки в темах не лежат
const MAX_DEPTH: usize = 3;

/// Поиск иконок по каталогам XDG без GTK.
///
/// Тема проверяется вместе с темами из `Inherits` её `index.theme`, последней идёт hicolor.
pub struct XdgIconTheme {
    themes: Vec<String>,
    roots: Vec<PathBuf>,
}

impl XdgIconTheme {
    /// Каталоги из XDG_DATA_HOME / XDG_DATA_DIRS, тема пользователя плюс hicolor
    pub fn new(theme: Option<&str>) -> Self {
        let mut roots = Vec::new();

        let data_home = std::env::var("XDG_DATA_HOME").map(PathBuf::from).unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".local/share")
        });
        roots.push(data_home.join("icons"));

        let data_dirs = std::env::var("XDG_DATA_DIRS").unwrap_or_else(|_| "/usr/local/share:/usr/share".to_string());
        for dir in data_dirs.split(':').filter(|d| !d.is_empty()) {
            roots.push(Path::new(dir).join("icons"));
        }
        roots.push(PathBuf::from("/usr/share/pixmaps"));

        Self::with_roots(theme, roots)
    }

    pub fn with_roots(theme: Option<&str>, roots: Vec<PathBuf>) -> Self {
        let mut themes = Vec::new();
        let mut pending: Vec<String> = theme.map(str::to_string).into_iter().collect();

        // Обход в ширину; циклы в Inherits отсекаются
        while !pending.is_empty() {
            let mut next = Vec::new();
            for name in pending {
                if themes.contains(&name) {
                    continue;
                }
                next.extend(inherited_themes(&roots, &name));
                themes.push(name);
            }
            pending = next;
        }

        if !themes.iter().any(|t| t == FALLBACK_THEME) {
            themes.push(FALLBACK_THEME.to_string());
        }
        debug!("Icon theme chain: {}", themes.join(" -> "));

        Self { themes, roots }
    }

    pub fn themes(&self) -> &[String] {
        &self.themes
    }

    fn find_in(&self, root: &Path, name: &str) -> bool {
        if contains_icon(root, name) {
            return true;
        }
        self.themes
            .iter()
            .any(|theme| find_recursive(&root.join(theme), name, MAX_DEPTH))
    }
}

/// Значение `Inherits` из первого найденного index.theme темы
fn inherited_themes(roots: &[PathBuf], theme: &str) -> Vec<String> {
    for root in roots {
        let Ok(index) = fs::read_to_string(root.join(theme).join("index.theme")) else {
            continue;
        };
        return index
            .lines()
            .filter_map(|line| line.trim().strip_prefix("Inherits="))
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
    }
    Vec::new()
}

impl IconTheme for XdgIconTheme {
    fn has_icon(&self, name: &str, extra_path: Option<&str>) -> bool {
        let path = Path::new(name);
        if path.is_absolute() {
            return path.is_file();
        }

        if let Some(extra) = extra_path {
            let extra = Path::new(extra);
            if contains_icon(extra, name) || find_recursive(extra, name, MAX_DEPTH) {
                return true;
            }
        }

        self.roots.iter().any(|root| self.find_in(root, name))
    }
}

fn contains_icon(dir: &Path, name: &str) -> bool {
    ICON_EXTENSIONS
        .iter()
        .any(|ext| dir.join(format!("{}.{}", name, ext)).is_file())
}

fn find_recursive(dir: &Path, name: &str, depth: usize) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if contains_icon(&path, name) {
            return true;
        }
        if depth > 1 && find_recursive(&path, name, depth - 1) {
            return true;
        }
    }
    false
}
