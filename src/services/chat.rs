//! Follow-up chat about a finished assessment.
//!
//! Each session is seeded with the beginning of the assessment text. The
//! display transcript (`messages`) and the context sent to the model
//! (`turns`) are kept apart: a failed turn stays visible in the transcript
//! but is never replayed to the model.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::gemini::{Content, GeminiClient, GeminiError};
use crate::domain::chat::{ChatMessage, ChatRole, ChatStreamEvent};
use crate::error::{ApiError, ApiResult};

/// Text of a reply that finished without any content.
pub const NO_REPLY_TEXT: &str = "AIからの応答がありませんでした。";

/// Build the system instruction from the first `context_chars` characters
/// of the assessment text.
pub fn system_instruction(estimate_text: &str, context_chars: usize) -> String {
    let excerpt: String = estimate_text.chars().take(context_chars).collect();
    format!(
        "あなたは親切なAIアシスタントです。ユーザーは提供された画像と特定の指示に基づいて解体現場を受け取りました。\
         提供された現場は以下の通りです：「{}」。\
         あなたの役割は、この特定の現場情報取得に関するフォローアップの質問に答えることです。\
         簡潔に、現場情報内の点を明確にするか、詳しく説明することに焦点を当ててください。\
         質問が現場情報の範囲外である場合は、丁寧にお知らせください。",
        excerpt
    )
}

/// A turn accepted by [`ChatSession::begin_turn`], ready to be sent.
#[derive(Debug, Clone)]
pub struct Turn {
    pub message_id: Uuid,
    pub system_instruction: String,
    pub history: Vec<Content>,
    pub text: String,
}

#[derive(Debug)]
pub struct ChatSession {
    pub id: Uuid,
    pub entry_id: Option<Uuid>,
    system_instruction: String,
    messages: Vec<ChatMessage>,
    turns: Vec<Content>,
    /// Question of the turn in flight, committed to `turns` on success.
    pending: Option<String>,
}

impl ChatSession {
    pub fn new(entry_id: Option<Uuid>, estimate_text: &str, context_chars: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            entry_id,
            system_instruction: system_instruction(estimate_text, context_chars),
            messages: Vec::new(),
            turns: Vec::new(),
            pending: None,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Record the user's question and an empty model reply to stream into.
    pub fn begin_turn(&mut self, text: &str) -> ApiResult<Turn> {
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest("Message must not be empty".to_string()));
        }
        if self.is_busy() {
            return Err(ApiError::Conflict(
                "A reply is still being generated for this session".to_string(),
            ));
        }

        self.messages.push(ChatMessage::new(ChatRole::User, text));
        let reply = ChatMessage::new(ChatRole::Model, "");
        let message_id = reply.id;
        self.messages.push(reply);
        self.pending = Some(text.to_string());

        Ok(Turn {
            message_id,
            system_instruction: self.system_instruction.clone(),
            history: self.turns.clone(),
            text: text.to_string(),
        })
    }

    pub fn append_fragment(&mut self, message_id: Uuid, fragment: &str) {
        if let Some(message) = self.message_mut(message_id) {
            message.text.push_str(fragment);
        }
    }

    /// Finish the turn successfully and return the final reply.
    pub fn complete_turn(&mut self, message_id: Uuid) -> Option<ChatMessage> {
        let question = self.pending.take();
        let message = self.message_mut(message_id)?;
        if message.text.is_empty() {
            message.text = NO_REPLY_TEXT.to_string();
        }
        let message = message.clone();

        if let Some(question) = question {
            self.turns.push(Content::text("user", question));
            self.turns.push(Content::text("model", message.text.clone()));
        }
        Some(message)
    }

    /// Finish the turn with an error.
    ///
    /// Partial reply text is kept; an empty reply placeholder is dropped.
    /// The error itself is appended as a separate model message.
    pub fn fail_turn(&mut self, message_id: Uuid, error: &str) -> ChatMessage {
        self.pending = None;
        self.messages
            .retain(|m| m.id != message_id || !m.text.is_empty());

        let message = ChatMessage::new(ChatRole::Model, format!("エラー: {}", error));
        self.messages.push(message.clone());
        message
    }

    fn message_mut(&mut self, message_id: Uuid) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }
}

pub type SharedSession = Arc<Mutex<ChatSession>>;

#[derive(Default)]
struct Registry {
    sessions: HashMap<Uuid, SharedSession>,
    order: VecDeque<Uuid>,
}

/// Open chat sessions, oldest evicted once `max_sessions` is reached.
pub struct ChatSessions {
    inner: Mutex<Registry>,
    max_sessions: usize,
    context_chars: usize,
}

impl ChatSessions {
    pub fn new(max_sessions: usize, context_chars: usize) -> Self {
        Self {
            inner: Mutex::new(Registry::default()),
            max_sessions: max_sessions.max(1),
            context_chars,
        }
    }

    /// Start a session about `estimate_text` and return its id.
    pub fn open(&self, entry_id: Option<Uuid>, estimate_text: &str) -> Uuid {
        let session = ChatSession::new(entry_id, estimate_text, self.context_chars);
        let id = session.id;

        let mut inner = self.inner.lock();
        while inner.order.len() >= self.max_sessions {
            if let Some(oldest) = inner.order.pop_front() {
                inner.sessions.remove(&oldest);
                tracing::debug!(session_id = %oldest, "Chat session evicted");
            }
        }
        inner.order.push_back(id);
        inner.sessions.insert(id, Arc::new(Mutex::new(session)));

        tracing::info!(session_id = %id, entry_id = ?entry_id, "Chat session opened");
        id
    }

    pub fn get(&self, id: Uuid) -> Option<SharedSession> {
        self.inner.lock().sessions.get(&id).cloned()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }
}

/// Send a turn to the model and stream the reply into the session.
pub async fn run_turn(
    client: GeminiClient,
    session: SharedSession,
    turn: Turn,
    events: mpsc::Sender<ChatStreamEvent>,
) {
    match client
        .stream_chat(&turn.system_instruction, &turn.history, &turn.text)
        .await
    {
        Ok(fragments) => drive_turn(&session, turn.message_id, fragments, &events).await,
        Err(e) => fail(&session, turn.message_id, &e, &events).await,
    }
}

/// Apply streamed fragments to the session, forwarding each as an event.
///
/// A closed event channel does not stop the turn; the reply is still
/// completed so the transcript stays consistent.
pub async fn drive_turn<S>(
    session: &SharedSession,
    message_id: Uuid,
    mut fragments: S,
    events: &mpsc::Sender<ChatStreamEvent>,
) where
    S: Stream<Item = Result<String, GeminiError>> + Unpin,
{
    while let Some(fragment) = fragments.next().await {
        match fragment {
            Ok(text) if text.is_empty() => {}
            Ok(text) => {
                session.lock().append_fragment(message_id, &text);
                let _ = events
                    .send(ChatStreamEvent::Delta { message_id, text })
                    .await;
            }
            Err(e) => return fail(session, message_id, &e, events).await,
        }
    }

    let completed = session.lock().complete_turn(message_id);
    if let Some(message) = completed {
        let _ = events.send(ChatStreamEvent::Done { message }).await;
    }
}

async fn fail(
    session: &SharedSession,
    message_id: Uuid,
    error: &GeminiError,
    events: &mpsc::Sender<ChatStreamEvent>,
) {
    tracing::error!(error = %error, "Chat turn failed");
    let message = session.lock().fail_turn(message_id, &error.user_message());
    let _ = events.send(ChatStreamEvent::Error { message }).await;
}
