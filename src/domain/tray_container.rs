use crate::domain::models::{VisualHandle, VisualState};

/// Контейнер бара, в который трей добавляет свои элементы.
///
/// Все методы вызываются только из цикла событий трея.
pub trait TrayContainer: Send {
    fn add_visual(&mut self, state: &VisualState) -> VisualHandle;

    fn update_visual(&mut self, handle: VisualHandle, state: &VisualState);

    fn remove_visual(&mut self, handle: VisualHandle);
}

/// Контейнер без отрисовки: только выдаёт идентификаторы
#[derive(Debug, Default)]
pub struct DetachedContainer {
    next_id: u64,
}

impl TrayContainer for DetachedContainer {
    fn add_visual(&mut self, _state: &VisualState) -> VisualHandle {
        self.next_id += 1;
        VisualHandle(self.next_id)
    }

    fn update_visual(&mut self, _handle: VisualHandle, _state: &VisualState) {}

    fn remove_visual(&mut self, _handle: VisualHandle) {}
}
