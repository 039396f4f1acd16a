use crate::runtime::{ChatView, Command};
use crate::state::{EntryOutcome, HistoryEntry, MessageView, ScrollMetrics};
use crate::types::ModelId;
use std::io::Write;

/// Line-oriented chat view. Streams the Markdown source as it grows; HTML is
/// for richer front ends and is ignored here.
pub struct TerminalView<W: Write> {
    out: W,
    printed: String,
    streaming: bool,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: String::new(),
            streaming: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }

    fn end_message(&mut self) {
        if !self.printed.is_empty() && !self.printed.ends_with('\n') {
            let _ = writeln!(self.out);
        }
        self.printed.clear();
    }
}

impl<W: Write> MessageView for TerminalView<W> {
    fn replace_content(&mut self, markdown: &str, _html: &str) {
        match markdown.strip_prefix(self.printed.as_str()) {
            Some(suffix) => {
                let _ = write!(self.out, "{suffix}");
            }
            // Rewritten rather than extended (error, stop notice): start over.
            None => {
                let _ = write!(self.out, "\n{markdown}");
            }
        }
        let _ = self.out.flush();
        self.printed = markdown.to_string();
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        ScrollMetrics::default()
    }

    fn scroll_to_bottom(&mut self) {}
}

impl<W: Write> ChatView for TerminalView<W> {
    fn push_user_message(&mut self, prompt: &str) {
        self.end_message();
        self.line(&format!("> {prompt}"));
    }

    fn begin_assistant_message(&mut self, model: ModelId) {
        self.end_message();
        let _ = write!(self.out, "[{model}] ");
        let _ = self.out.flush();
    }

    fn set_streaming(&mut self, streaming: bool) {
        if self.streaming && !streaming {
            self.end_message();
        }
        self.streaming = streaming;
    }

    fn set_models(&mut self, models: &[ModelId]) {
        let names: Vec<&str> = models.iter().map(|model| model.slug()).collect();
        self.line(&format!("models: {}", names.join(", ")));
    }

    fn select_model(&mut self, model: ModelId) {
        self.line(&format!("using {model}"));
    }

    fn show_notice(&mut self, notice: &str) {
        self.end_message();
        self.line(&format!("* {notice}"));
    }

    fn show_history(&mut self, entries: &[(usize, &HistoryEntry)]) {
        if entries.is_empty() {
            self.line("* no matching history");
            return;
        }
        for (index, entry) in entries {
            let marker = match entry.outcome {
                EntryOutcome::Reply => "",
                EntryOutcome::Error => " (error)",
            };
            self.line(&format!("{index:>3}  {}{marker}", entry.title()));
        }
    }

    fn clear(&mut self) {
        self.end_message();
        self.line("---- new chat ----");
    }
}

/// What a line typed at the prompt turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineAction {
    Command(Command),
    Help,
    Invalid(String),
    Nothing,
}

pub const HELP: &str = "\
commands:
  /stop               stop the current response
  /model <id> [name]  gpt | deepseek | gemini, optionally a provider model name
  /models             refresh the model list
  /new                start a new chat
  /history            list history
  /search <term>      filter history
  /load <n>           show history entry n
  /delete <n>         delete history entry n
  /login <code>       enter the access code
  /file <url>         attach a file URL to the next prompt
  /quit               exit";

/// Turns input lines into commands. `/file` is held until the next prompt.
#[derive(Debug, Default)]
pub struct InputParser {
    pending_file: Option<String>,
}

impl InputParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_file(&self) -> Option<&str> {
        self.pending_file.as_deref()
    }

    pub fn parse(&mut self, line: &str) -> LineAction {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            if line.is_empty() && self.pending_file.is_none() {
                return LineAction::Nothing;
            }
            return LineAction::Command(Command::Submit {
                prompt: line.to_string(),
                file_reference: self.pending_file.take(),
            });
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "stop" => LineAction::Command(Command::Stop),
            "new" => LineAction::Command(Command::NewChat),
            "models" => LineAction::Command(Command::RefreshModels),
            "history" => LineAction::Command(Command::SearchHistory(String::new())),
            "search" => LineAction::Command(Command::SearchHistory(arg.to_string())),
            "login" => LineAction::Command(Command::Login(arg.to_string())),
            "quit" | "exit" => LineAction::Command(Command::Quit),
            "help" => LineAction::Help,
            "model" => {
                let (model, variant) = match arg.split_once(char::is_whitespace) {
                    Some((model, variant)) => (model, Some(variant.trim().to_string())),
                    None => (arg, None),
                };
                match model.parse::<ModelId>() {
                    Ok(model) => LineAction::Command(Command::SelectModel { model, variant }),
                    Err(error) => LineAction::Invalid(error.to_string()),
                }
            }
            "load" | "delete" => match arg.parse::<usize>() {
                Ok(index) if name == "load" => LineAction::Command(Command::LoadHistory(index)),
                Ok(index) => LineAction::Command(Command::DeleteHistory(index)),
                Err(_) => LineAction::Invalid(format!("/{name} needs an entry number")),
            },
            "file" if !arg.is_empty() => {
                self.pending_file = Some(arg.to_string());
                LineAction::Nothing
            }
            "file" => LineAction::Invalid("/file needs a URL".to_string()),
            _ => LineAction::Invalid(format!("unknown command /{name}")),
        }
    }
}
