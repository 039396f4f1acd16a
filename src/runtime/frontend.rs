use crate::state::{HistoryEntry, MessageView};
use crate::types::ModelId;

/// The chat surface the dispatcher drives. The current assistant message is
/// reached through the `MessageView` half.
pub trait ChatView: MessageView {
    fn push_user_message(&mut self, prompt: &str);
    /// Opens an empty assistant message that following content replaces.
    fn begin_assistant_message(&mut self, model: ModelId);
    /// Mirrors Idle/Streaming on the submit/stop affordance.
    fn set_streaming(&mut self, streaming: bool);
    fn set_models(&mut self, models: &[ModelId]);
    fn select_model(&mut self, model: ModelId);
    fn show_notice(&mut self, notice: &str);
    fn show_history(&mut self, entries: &[(usize, &HistoryEntry)]);
    fn clear(&mut self);
}
