use pulldown_cmark::{html, Options, Parser};

/// Distance from the bottom still treated as "at the bottom".
pub const BOTTOM_SLACK_PX: f64 = 5.0;
pub const STOPPED_NOTICE: &str = "Conversation stopped.";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn is_at_bottom(&self) -> bool {
        self.scroll_height - self.scroll_top - self.client_height <= BOTTOM_SLACK_PX
    }
}

/// The message surface a response is rendered into.
pub trait MessageView {
    /// Replaces the whole message body. `html` is already sanitized.
    fn replace_content(&mut self, markdown: &str, html: &str);
    fn scroll_metrics(&self) -> ScrollMetrics;
    fn scroll_to_bottom(&mut self);
}

/// Markdown to sanitized HTML. Raw HTML in the source survives only as far
/// as the sanitizer allows.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut unsafe_html = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut unsafe_html, Parser::new_ext(markdown, options));
    ammonia::clean(&unsafe_html)
}

/// Accumulates one response and re-renders all of it on every fragment.
///
/// Partial Markdown (an unclosed fence, half a table) renders as whatever the
/// parser makes of it; the next fragment corrects it.
#[derive(Debug, Default)]
pub struct IncrementalRenderer {
    accumulated: String,
}

impl IncrementalRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn on_increment(&mut self, fragment: &str, view: &mut dyn MessageView) {
        if fragment.is_empty() {
            return;
        }
        self.accumulated.push_str(fragment);
        let html = render_markdown(&self.accumulated);
        replace_pinned(view, &self.accumulated, &html);
    }

    /// Shows stored Markdown through the same pipeline, e.g. a history reload.
    pub fn load(&mut self, markdown: &str, view: &mut dyn MessageView) {
        self.accumulated = markdown.to_string();
        let html = render_markdown(&self.accumulated);
        replace_pinned(view, &self.accumulated, &html);
    }

    /// Replaces the message with `message` as escaped plain text.
    pub fn show_error(&mut self, message: &str, view: &mut dyn MessageView) {
        let html = format!("<p class=\"error\">{}</p>", ammonia::clean_text(message));
        replace_pinned(view, message, &html);
    }

    pub fn mark_stopped(&mut self, view: &mut dyn MessageView) {
        let notice = format!("<p class=\"notice\">{STOPPED_NOTICE}</p>");
        if self.accumulated.trim().is_empty() {
            replace_pinned(view, STOPPED_NOTICE, &notice);
            return;
        }
        let html = render_markdown(&self.accumulated) + &notice;
        let markdown = format!("{}\n\n{STOPPED_NOTICE}", self.accumulated);
        replace_pinned(view, &markdown, &html);
    }

    /// Hands back the final Markdown and resets for reuse.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.accumulated)
    }
}

fn replace_pinned(view: &mut dyn MessageView, markdown: &str, html: &str) {
    let pinned = view.scroll_metrics().is_at_bottom();
    view.replace_content(markdown, html);
    if pinned {
        view.scroll_to_bottom();
    }
}
