/// Текущая тема иконок
pub trait IconTheme: Send + Sync {
    /// Есть ли иконка с таким именем. `extra_path` - IconThemePath элемента.
    fn has_icon(&self, name: &str, extra_path: Option<&str>) -> bool;
}

/// Тема, в которой нет ни одной иконки
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyIconTheme;

impl IconTheme for EmptyIconTheme {
    fn has_icon(&self, _name: &str, _extra_path: Option<&str>) -> bool {
        false
    }
}
