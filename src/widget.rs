//! Chat widget state: transcript, typing indicator and the submit sequence

use chrono::{DateTime, Utc};
use std::fmt;

use crate::client::ReplySource;

/// Who wrote a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    User,
    Bot,
}

#[derive(Debug, Clone)]
pub struct ChatEntry {
    pub sender: Sender,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl fmt::Display for ChatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let who = match self.sender {
            Sender::User => "you",
            Sender::Bot => "bot",
        };
        write!(f, "[{}] {}> {}", self.at.format("%H:%M:%S"), who, self.text)
    }
}

/// Rendering hooks the widget drives
pub trait ChatView: Send {
    fn message_added(&mut self, entry: &ChatEntry);
    fn typing_changed(&mut self, typing: bool);
}

/// View that renders nothing
#[derive(Debug, Default)]
pub struct NullView;

impl ChatView for NullView {
    fn message_added(&mut self, _entry: &ChatEntry) {}
    fn typing_changed(&mut self, _typing: bool) {}
}

pub struct ChatWidget<S, V> {
    source: S,
    view: V,
    transcript: Vec<ChatEntry>,
    typing: bool,
}

impl<S: ReplySource, V: ChatView> ChatWidget<S, V> {
    pub fn new(source: S, view: V) -> Self {
        Self {
            source,
            view,
            transcript: Vec::new(),
            typing: false,
        }
    }

    pub fn transcript(&self) -> &[ChatEntry] {
        &self.transcript
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Submit user input. Blank input is ignored and returns `None`;
    /// otherwise returns the bot entry appended for it.
    pub async fn submit(&mut self, input: &str) -> Option<&ChatEntry> {
        if input.trim().is_empty() {
            return None;
        }

        self.add_message(input, Sender::User);
        self.show_typing_indicator();

        let reply = self.source.send(input).await;

        self.hide_typing_indicator();
        self.add_message(&reply, Sender::Bot);
        self.transcript.last()
    }

    pub fn add_message(&mut self, text: &str, sender: Sender) {
        let entry = ChatEntry {
            sender,
            text: text.to_string(),
            at: Utc::now(),
        };
        self.view.message_added(&entry);
        self.transcript.push(entry);
    }

    /// No-op when the indicator is already showing
    pub fn show_typing_indicator(&mut self) {
        if self.typing {
            return;
        }
        self.typing = true;
        self.view.typing_changed(true);
    }

    pub fn hide_typing_indicator(&mut self) {
        if !self.typing {
            return;
        }
        self.typing = false;
        self.view.typing_changed(false);
    }
}
