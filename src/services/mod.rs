//! Service layer modules for external integrations.
//!
//! Contains the Gemini client, upload handling, history persistence and
//! chat session bookkeeping.

pub mod chat;
pub mod gemini;
pub mod history;
pub mod history_store;
pub mod sse;
pub mod uploads;

pub use chat::ChatSessions;
pub use gemini::GeminiClient;
pub use history::HistoryService;
pub use history_store::HistoryStore;
