use super::event::Command;
use super::frontend::ChatView;
use super::update::UiUpdate;
use crate::api::{PromptRequest, StreamOutcome, TransportClient};
use crate::state::{
    CancellationController, HistoryEntry, HistoryStore, InMemoryHistory, IncrementalRenderer,
    LoginGate, SessionId,
};
use crate::types::ModelId;
use anyhow::Result;
use tokio::sync::mpsc;

const LOGIN_REQUIRED_NOTICE: &str = "Please enter the access code first.";
const NO_MODEL_NOTICE: &str = "No model is available. Check that the relay has API keys configured.";

struct PendingTurn {
    session: SessionId,
    prompt: String,
    model: ModelId,
}

/// Single owner of the chat view. Commands arrive from the user, updates
/// from streaming tasks; both are applied here in arrival order.
pub struct Dispatcher<V: ChatView, H: HistoryStore = InMemoryHistory> {
    client: TransportClient,
    view: V,
    history: H,
    gate: LoginGate,
    controller: CancellationController,
    renderer: IncrementalRenderer,
    models: Vec<ModelId>,
    selected: Option<ModelId>,
    variant: Option<String>,
    pending: Option<PendingTurn>,
    update_tx: mpsc::UnboundedSender<UiUpdate>,
    update_rx: mpsc::UnboundedReceiver<UiUpdate>,
}

impl<V: ChatView> Dispatcher<V, InMemoryHistory> {
    pub fn new(client: TransportClient, view: V, gate: LoginGate) -> Self {
        Self::with_history(client, view, gate, InMemoryHistory::new())
    }
}

impl<V: ChatView, H: HistoryStore> Dispatcher<V, H> {
    pub fn with_history(client: TransportClient, view: V, gate: LoginGate, history: H) -> Self {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        Self {
            client,
            view,
            history,
            gate,
            controller: CancellationController::new(),
            renderer: IncrementalRenderer::new(),
            models: Vec::new(),
            selected: None,
            variant: None,
            pending: None,
            update_tx,
            update_rx,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn selected_model(&self) -> Option<ModelId> {
        self.selected
    }

    pub fn selected_variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        self.controller.is_streaming()
    }

    /// Runs until `Quit` or until the command channel closes. An in-flight
    /// stream is cancelled on the way out.
    pub async fn run(&mut self, mut commands: mpsc::UnboundedReceiver<Command>) -> Result<()> {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Quit) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(update) = self.update_rx.recv() => self.apply_update(update),
            }
        }
        self.controller.stop();
        Ok(())
    }

    /// Applies the next streaming update. Returns false if none can arrive.
    pub async fn process_next_update(&mut self) -> bool {
        match self.update_rx.recv().await {
            Some(update) => {
                self.apply_update(update);
                true
            }
            None => false,
        }
    }

    /// Applies updates until no stream is active.
    pub async fn wait_idle(&mut self) {
        while self.controller.is_streaming() {
            if !self.process_next_update().await {
                break;
            }
        }
    }

    pub async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Login(secret) => self.login(&secret).await,
            Command::Submit {
                prompt,
                file_reference,
            } => self.submit(prompt, file_reference),
            Command::Stop => self.stop(),
            Command::SelectModel { model, variant } => self.select_model(model, variant),
            Command::NewChat => {
                self.abandon_active();
                self.renderer = IncrementalRenderer::new();
                self.view.clear();
            }
            Command::LoadHistory(index) => self.load_history(index),
            Command::DeleteHistory(index) => match self.history.remove(index) {
                Some(entry) => self
                    .view
                    .show_notice(&format!("Deleted \"{}\".", entry.title())),
                None => self
                    .view
                    .show_notice(&format!("No history entry {index}.")),
            },
            Command::SearchHistory(term) => {
                let hits = self.history.search(&term);
                self.view.show_history(&hits);
            }
            Command::RefreshModels => self.refresh_models().await,
            Command::Quit => self.abandon_active(),
        }
    }

    async fn login(&mut self, secret: &str) {
        if self.gate.authorize(secret) {
            self.view.show_notice("Access granted.");
            self.refresh_models().await;
        } else {
            self.view.show_notice("Incorrect access code.");
        }
    }

    async fn refresh_models(&mut self) {
        match self.client.available_models().await {
            Ok(models) => {
                self.models = models;
                self.view.set_models(&self.models);
                let keep = self
                    .selected
                    .filter(|selected| self.models.contains(selected));
                if keep.is_none() {
                    self.variant = None;
                }
                self.selected = keep.or_else(|| self.models.first().copied());
                match self.selected {
                    Some(model) => self.view.select_model(model),
                    None => self.view.show_notice(NO_MODEL_NOTICE),
                }
            }
            Err(error) => {
                tracing::warn!(%error, "model discovery failed");
                self.view
                    .show_notice(&format!("Error: unable to load models - {error}"));
            }
        }
    }

    fn select_model(&mut self, model: ModelId, variant: Option<String>) {
        if self.models.contains(&model) {
            self.selected = Some(model);
            self.variant = variant.filter(|variant| !variant.trim().is_empty());
            self.view.select_model(model);
        } else {
            self.view
                .show_notice(&format!("{model} is not available on this relay."));
        }
    }

    fn submit(&mut self, prompt: String, file_reference: Option<String>) {
        if !self.gate.is_authorized() {
            self.view.show_notice(LOGIN_REQUIRED_NOTICE);
            return;
        }
        let Some(model) = self.selected else {
            self.view.show_notice(NO_MODEL_NOTICE);
            return;
        };

        let mut request = PromptRequest::new(prompt.trim(), model);
        if let Some(file_reference) = file_reference.filter(|file| !file.trim().is_empty()) {
            request = request.with_file_reference(file_reference.trim());
        }
        if let Some(variant) = &self.variant {
            request = request.with_variant(variant.clone());
        }
        if !request.is_submittable() {
            return;
        }

        if self.controller.is_streaming() {
            self.renderer.mark_stopped(&mut self.view);
        }
        let session = self.controller.begin();
        let shown_prompt = match (&request.file_reference, request.prompt_text.is_empty()) {
            (Some(file), true) => file.clone(),
            (Some(file), false) => format!("{}\n{file}", request.prompt_text),
            (None, _) => request.prompt_text.clone(),
        };

        self.renderer = IncrementalRenderer::new();
        self.view.push_user_message(&shown_prompt);
        self.view.begin_assistant_message(model);
        self.view.set_streaming(true);
        self.pending = Some(PendingTurn {
            session: session.id,
            prompt: shown_prompt,
            model,
        });

        let client = self.client.clone();
        let update_tx = self.update_tx.clone();
        tracing::debug!(session = session.id, %model, "starting stream");
        tokio::spawn(async move {
            let outcome = client
                .stream_prompt(&request, &session.token, |text| {
                    let _ = update_tx.send(UiUpdate::Delta {
                        session: session.id,
                        text: text.to_string(),
                    });
                })
                .await;
            let _ = update_tx.send(UiUpdate::Finished {
                session: session.id,
                outcome,
            });
        });
    }

    fn stop(&mut self) {
        if self.controller.stop().is_some() {
            self.pending = None;
            self.renderer.mark_stopped(&mut self.view);
            self.view.set_streaming(false);
        }
    }

    /// Cancels without touching the current message, for actions that
    /// replace the whole view.
    fn abandon_active(&mut self) {
        if self.controller.stop().is_some() {
            self.pending = None;
            self.view.set_streaming(false);
        }
    }

    fn load_history(&mut self, index: usize) {
        let Some(entry) = self.history.get(index).cloned() else {
            self.view
                .show_notice(&format!("No history entry {index}."));
            return;
        };

        self.abandon_active();
        self.view.clear();
        self.view.push_user_message(&entry.user_prompt);
        self.view.begin_assistant_message(entry.model);
        self.renderer = IncrementalRenderer::new();
        if entry.is_error() {
            self.renderer
                .show_error(&entry.final_response_markdown, &mut self.view);
        } else {
            self.renderer
                .load(&entry.final_response_markdown, &mut self.view);
        }
        if self.models.contains(&entry.model) {
            if self.selected != Some(entry.model) {
                self.variant = None;
            }
            self.selected = Some(entry.model);
            self.view.select_model(entry.model);
        }
    }

    fn apply_update(&mut self, update: UiUpdate) {
        if !self.controller.is_current(update.session()) {
            tracing::trace!(session = update.session(), "dropping update from stale stream");
            return;
        }

        match update {
            UiUpdate::Delta { text, .. } => self.renderer.on_increment(&text, &mut self.view),
            UiUpdate::Finished { session, outcome } => {
                self.controller.finish(session);
                self.finish_turn(session, outcome);
                self.view.set_streaming(false);
            }
        }
    }

    fn finish_turn(&mut self, session: SessionId, outcome: StreamOutcome) {
        match &outcome {
            StreamOutcome::Completed(_) => {
                self.renderer.finish();
            }
            StreamOutcome::Errored(message) => self.renderer.show_error(message, &mut self.view),
            StreamOutcome::Cancelled => self.renderer.mark_stopped(&mut self.view),
        }

        let Some(turn) = self.pending.take().filter(|turn| turn.session == session) else {
            return;
        };
        if let Some(entry) = HistoryEntry::from_outcome(turn.prompt, turn.model, &outcome) {
            self.history.record(entry);
        }
    }
}
