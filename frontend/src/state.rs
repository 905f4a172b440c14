use chat_core::{ChatSession, Exchange, Message, pump};
use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::api;
use crate::storage::{BrowserStorage, SessionStore};

const DELETE_CONFIRMATION: &str = "This will permanently delete ALL saved history. Continue?";

/// Shared application state, provided via Leptos context.
#[derive(Clone, Copy)]
pub struct AppState {
    pub set_session: WriteSignal<ChatSession<SessionStore>>,

    // --- Derived views (components subscribe to these) ---
    pub current_chat: Memo<Vec<Message>>,
    pub history: Memo<Vec<Exchange>>,
    pub draft: Memo<String>,
    pub is_streaming: Memo<bool>,
}

impl AppState {
    /// Load persisted history and provide the state in the current context.
    pub fn provide() -> Self {
        let (session, set_session) = signal(ChatSession::load(SessionStore::new(BrowserStorage)));

        // Chunks only touch the current chat, so the history list is
        // re-read when its length changes.
        let history_len = Memo::new(move |_| session.with(|s| s.history().len()));

        let state = Self {
            set_session,
            current_chat: Memo::new(move |_| session.with(|s| s.current_chat().to_vec())),
            history: Memo::new(move |_| {
                history_len.track();
                session.with_untracked(|s| s.history().exchanges().to_vec())
            }),
            draft: Memo::new(move |_| session.with(|s| s.draft().to_string())),
            is_streaming: Memo::new(move |_| session.with(|s| s.is_streaming())),
        };

        provide_context(state);
        state
    }

    pub fn set_draft(&self, text: String) {
        self.set_session.update(|s| s.set_draft(text));
    }

    /// Send `text` and stream the reply into the current chat.
    pub fn send_message(&self, text: String) {
        let mut prompt = None;
        self.set_session
            .update(|s| prompt = s.submit_message(&text, display_time()));
        let Some(prompt) = prompt else {
            return;
        };

        let set_session = self.set_session;
        spawn_local(async move {
            match api::open_chat_stream(&prompt).await {
                Ok(chunks) => {
                    pump(chunks, |event| set_session.update(|s| s.apply(event))).await;
                }
                Err(e) => set_session.update(|s| s.abort_reply(&e)),
            }
        });
    }

    pub fn start_new_chat(&self) {
        self.set_session.update(|s| s.start_new_chat());
    }

    pub fn open_history_entry(&self, index: usize) {
        self.set_session.update(|s| {
            s.open_history_entry(index);
        });
    }

    /// Asks the user first; nothing happens unless they agree.
    pub fn delete_all_history(&self) {
        let confirmed = window()
            .confirm_with_message(DELETE_CONFIRMATION)
            .unwrap_or(false);

        self.set_session.update(|s| match s.delete_all_history(|| confirmed) {
            Ok(true) => log::info!("Chat history deleted"),
            Ok(false) => {}
            Err(e) => log::error!("Failed to delete chat history: {e}"),
        });
    }
}

/// Local wall-clock time as `HH:MM`.
fn display_time() -> String {
    let now = js_sys::Date::new_0();
    format!("{:02}:{:02}", now.get_hours(), now.get_minutes())
}
