pub mod event;
pub mod frontend;
pub mod r#loop;
pub mod update;

pub use event::Command;
pub use frontend::ChatView;
pub use r#loop::Dispatcher;
pub use update::UiUpdate;
