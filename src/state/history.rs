use crate::api::StreamOutcome;
use crate::types::ModelId;

const TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    Reply,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub user_prompt: String,
    pub final_response_markdown: String,
    pub model: ModelId,
    pub outcome: EntryOutcome,
}

impl HistoryEntry {
    /// Applies the recording policy: replies with text and errors are kept,
    /// empty replies and aborted streams are not.
    pub fn from_outcome(
        user_prompt: impl Into<String>,
        model: ModelId,
        outcome: &StreamOutcome,
    ) -> Option<Self> {
        let (final_response_markdown, outcome) = match outcome {
            StreamOutcome::Completed(text) if !text.trim().is_empty() => {
                (text.clone(), EntryOutcome::Reply)
            }
            StreamOutcome::Errored(message) => (message.clone(), EntryOutcome::Error),
            StreamOutcome::Completed(_) | StreamOutcome::Cancelled => return None,
        };
        Some(Self {
            user_prompt: user_prompt.into(),
            final_response_markdown,
            model,
            outcome,
        })
    }

    /// Sidebar label: the prompt cut to 50 characters.
    pub fn title(&self) -> String {
        let mut title: String = self.user_prompt.chars().take(TITLE_CHARS).collect();
        if self.user_prompt.chars().count() > TITLE_CHARS {
            title.push_str("...");
        }
        title
    }

    pub fn is_error(&self) -> bool {
        self.outcome == EntryOutcome::Error
    }
}

/// Where finished turns go. Indices are positions in insertion order and
/// shift down after a removal.
pub trait HistoryStore: Send {
    fn record(&mut self, entry: HistoryEntry) -> usize;
    fn get(&self, index: usize) -> Option<&HistoryEntry>;
    fn remove(&mut self, index: usize) -> Option<HistoryEntry>;
    /// Case-insensitive match on the prompt.
    fn search(&self, term: &str) -> Vec<(usize, &HistoryEntry)>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: Vec<HistoryEntry>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for InMemoryHistory {
    fn record(&mut self, entry: HistoryEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    fn remove(&mut self, index: usize) -> Option<HistoryEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    fn search(&self, term: &str) -> Vec<(usize, &HistoryEntry)> {
        let needle = term.trim().to_lowercase();
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.user_prompt.to_lowercase().contains(&needle))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
