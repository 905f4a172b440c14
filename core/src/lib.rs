//! Data model and client-side chat state shared by the relay server and the
//! browser frontend.

pub mod decode;
pub mod history;
pub mod models;
pub mod session;

pub use decode::{ReplyEvent, Utf8Assembler, check_status, pump};
pub use history::{FallbackStore, HISTORY_KEY, History, HistoryStore, MemoryStore, StoreError};
pub use models::{ChatRequest, ErrorBody, Exchange, Message, Role};
pub use session::ChatSession;
