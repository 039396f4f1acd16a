use crate::types::ModelId;

/// Everything the user can ask the chat front end to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(String),
    Submit {
        prompt: String,
        file_reference: Option<String>,
    },
    Stop,
    /// `variant` overrides the provider's default model name, e.g.
    /// `deepseek-reasoner`.
    SelectModel {
        model: ModelId,
        variant: Option<String>,
    },
    NewChat,
    LoadHistory(usize),
    DeleteHistory(usize),
    SearchHistory(String),
    RefreshModels,
    Quit,
}
