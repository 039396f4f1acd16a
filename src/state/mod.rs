pub mod history;
pub mod login;
pub mod render;
pub mod session;

pub use history::{EntryOutcome, HistoryEntry, HistoryStore, InMemoryHistory};
pub use login::LoginGate;
pub use render::{render_markdown, IncrementalRenderer, MessageView, ScrollMetrics};
pub use session::{CancellationController, SessionId, StreamSession};
