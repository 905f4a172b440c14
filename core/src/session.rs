use log::{error, warn};

use crate::decode::{ReplyEvent, Utf8Assembler};
use crate::history::{History, HistoryStore, StoreError};
use crate::models::{Exchange, Message};

/// Reply currently being streamed into the chat.
#[derive(Debug)]
struct PendingReply {
    user: Message,
    /// Index of the assistant placeholder in `current_chat`; `None` once the
    /// view was reset under it.
    placeholder: Option<usize>,
    decoder: Utf8Assembler,
    buffer: String,
}

/// Client-side chat state: persisted history, the visible thread, the draft
/// input and the reply in flight.
///
/// The streaming flag is the presence of a pending reply. It is set by
/// [`submit_message`](Self::submit_message) and cleared by exactly one of
/// [`finish_reply`](Self::finish_reply) or [`abort_reply`](Self::abort_reply).
#[derive(Debug)]
pub struct ChatSession<S> {
    store: S,
    history: History,
    current_chat: Vec<Message>,
    draft: String,
    pending: Option<PendingReply>,
}

impl<S: HistoryStore> ChatSession<S> {
    /// Loads history from `store`. A missing entry means no history; an
    /// unreadable one is logged and treated the same way.
    pub fn load(store: S) -> Self {
        let history = match store.read() {
            Ok(Some(json)) => History::from_json(&json).unwrap_or_else(|e| {
                warn!("Ignoring unreadable chat history: {e}");
                History::new()
            }),
            Ok(None) => History::new(),
            Err(e) => {
                warn!("Chat history storage unavailable: {e}");
                History::new()
            }
        };

        Self {
            store,
            history,
            current_chat: Vec::new(),
            draft: String::new(),
            pending: None,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn current_chat(&self) -> &[Message] {
        &self.current_chat
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn is_streaming(&self) -> bool {
        self.pending.is_some()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Starts an exchange for `text` and returns the prompt to send.
    ///
    /// Returns `None` without touching any state when `text` is blank or a
    /// reply is already streaming.
    pub fn submit_message(&mut self, text: &str, timestamp: impl Into<String>) -> Option<String> {
        if text.trim().is_empty() || self.is_streaming() {
            return None;
        }

        let timestamp = timestamp.into();
        let user = Message::user(text, timestamp.clone());
        self.current_chat.push(user.clone());
        self.draft.clear();

        self.current_chat.push(Message::assistant(String::new(), timestamp));
        self.pending = Some(PendingReply {
            user,
            placeholder: Some(self.current_chat.len() - 1),
            decoder: Utf8Assembler::new(),
            buffer: String::new(),
        });

        Some(text.to_string())
    }

    /// Appends a body chunk to the reply and mirrors the whole buffer into the
    /// placeholder message.
    pub fn push_chunk(&mut self, bytes: &[u8]) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let text = pending.decoder.push(bytes);
        pending.buffer.push_str(&text);

        if let Some(message) = pending.placeholder.and_then(|i| self.current_chat.get_mut(i)) {
            message.content.clone_from(&pending.buffer);
        }
    }

    /// Commits the streamed exchange to history and persists it.
    ///
    /// The in-memory history and the streaming flag are updated even when the
    /// write fails.
    pub fn finish_reply(&mut self) -> Result<(), StoreError> {
        let Some(mut pending) = self.pending.take() else {
            return Ok(());
        };
        let tail = pending.decoder.finish();
        pending.buffer.push_str(&tail);

        if let Some(message) = pending.placeholder.and_then(|i| self.current_chat.get_mut(i)) {
            message.content.clone_from(&pending.buffer);
        }

        let assistant = Message::assistant(pending.buffer, pending.user.timestamp.clone());
        self.history.push(Exchange::new(pending.user, assistant));
        self.persist()
    }

    /// Drops the reply in flight. Nothing reaches history; the placeholder
    /// keeps whatever text already arrived.
    pub fn abort_reply(&mut self, reason: &str) {
        if self.pending.take().is_some() {
            error!("Stream error: {reason}");
        }
    }

    pub fn apply(&mut self, event: ReplyEvent<'_>) {
        match event {
            ReplyEvent::Chunk(bytes) => self.push_chunk(bytes),
            ReplyEvent::End => {
                if let Err(e) = self.finish_reply() {
                    error!("Failed to save chat history: {e}");
                }
            }
            ReplyEvent::Failed(reason) => self.abort_reply(&reason),
        }
    }

    /// Clears the visible thread. History is untouched; a reply in flight
    /// keeps streaming into history but is no longer shown.
    pub fn start_new_chat(&mut self) {
        self.current_chat.clear();
        self.detach_placeholder();
    }

    /// Wipes history, its stored entry and the visible thread once `confirm`
    /// agrees. Returns whether anything was deleted.
    pub fn delete_all_history(
        &mut self,
        confirm: impl FnOnce() -> bool,
    ) -> Result<bool, StoreError> {
        if !confirm() {
            return Ok(false);
        }
        self.history.clear();
        self.current_chat.clear();
        self.detach_placeholder();
        self.store.remove()?;
        Ok(true)
    }

    /// Shows the exchange at `index` as the current thread.
    ///
    /// Exchange `k` holds the messages at flattened positions `2k` and
    /// `2k + 1`. Returns `false` and leaves the view alone when out of range.
    pub fn open_history_entry(&mut self, index: usize) -> bool {
        let Some(exchange) = self.history.get(index) else {
            warn!("No history entry at index {index}");
            return false;
        };
        self.current_chat = exchange.to_messages().to_vec();
        self.detach_placeholder();
        true
    }

    fn detach_placeholder(&mut self) {
        if let Some(pending) = self.pending.as_mut() {
            pending.placeholder = None;
        }
    }

    fn persist(&self) -> Result<(), StoreError> {
        let json = self.history.to_json()?;
        self.store.write(&json)
    }
}
