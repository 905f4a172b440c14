use leptos::prelude::*;

use crate::state::AppState;

/// Sidebar listing past exchanges, with the clear-history button.
#[component]
pub fn Sidebar() -> impl IntoView {
    let state = expect_context::<AppState>();

    view! {
        <aside class="sidebar">
            <div class="sidebar-header">
                <span>"Past Conversations"</span>
            </div>
            <div class="conversation-list">
                {move || {
                    let exchanges = state.history.get();
                    if exchanges.is_empty() {
                        view! { <p class="empty-state">"No history saved yet."</p> }.into_any()
                    } else {
                        exchanges
                            .into_iter()
                            .enumerate()
                            .map(|(index, exchange)| {
                                view! {
                                    <button
                                        class="conversation-item"
                                        on:click=move |_| state.open_history_entry(index)
                                    >
                                        <p class="timestamp">{exchange.user.timestamp}</p>
                                        <p class="prompt">{exchange.user.content}</p>
                                    </button>
                                }
                            })
                            .collect_view()
                            .into_any()
                    }
                }}
            </div>
            <div class="sidebar-footer">
                <button class="clear-history-btn" on:click=move |_| state.delete_all_history()>
                    "Clear All History"
                </button>
            </div>
        </aside>
    }
}
