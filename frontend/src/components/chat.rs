use chat_core::Message;
use leptos::ev;
use leptos::html;
use leptos::prelude::*;

use crate::state::AppState;

/// Main chat area: header, current thread, typing indicator and input.
#[component]
pub fn ChatArea() -> impl IntoView {
    let state = expect_context::<AppState>();
    let scroll_ref = NodeRef::<html::Main>::new();

    // Keep the newest message in view
    Effect::new(move |_| {
        state.current_chat.track();
        request_animation_frame(move || {
            if let Some(el) = scroll_ref.get_untracked() {
                el.set_scroll_top(el.scroll_height());
            }
        });
    });

    view! {
        <div class="chat-area">
            <header class="chat-header">
                <h1>"Gemini Chat"</h1>
                <button class="new-chat-btn" on:click=move |_| state.start_new_chat()>
                    "NEW CHAT"
                </button>
            </header>

            <main class="messages-container" node_ref=scroll_ref>
                {move || {
                    state
                        .current_chat
                        .get()
                        .into_iter()
                        .map(|message| view! { <MessageBubble message=message /> })
                        .collect_view()
                }}
                {move || {
                    state.is_streaming.get().then(|| {
                        view! { <div class="typing-indicator">"AI IS TYPING..."</div> }
                    })
                }}
            </main>

            <ChatInput />
        </div>
    }
}

/// A single chat message bubble.
#[component]
fn MessageBubble(message: Message) -> impl IntoView {
    let css_class = if message.is_user() {
        "message user"
    } else {
        "message assistant"
    };

    view! {
        <div class=css_class>
            <div class="bubble">{message.content}</div>
            <span class="timestamp">{message.timestamp}</span>
        </div>
    }
}

/// Chat input form with text field and send button.
#[component]
fn ChatInput() -> impl IntoView {
    let state = expect_context::<AppState>();

    let is_sending = move || state.is_streaming.get();

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        state.send_message(state.draft.get_untracked());
    };

    view! {
        <footer class="input-area">
            <form class="input-row" on:submit=on_submit>
                <input
                    type="text"
                    placeholder="Type your message..."
                    prop:value=move || state.draft.get()
                    on:input=move |ev| state.set_draft(event_target_value(&ev))
                    disabled=is_sending
                />
                <button
                    type="submit"
                    class="send-btn"
                    disabled=move || is_sending() || state.draft.get().trim().is_empty()
                >
                    "SEND"
                </button>
            </form>
        </footer>
    }
}
