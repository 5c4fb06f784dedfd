//! Prompt construction and best-effort query rewriting.
//!
//! Query rewriting turns a follow-up like "what about its pricing?" into a
//! standalone retrieval query using the last few conversation turns. It is
//! modelled as [`QueryRewrite`], a result that always carries a usable
//! query: a failed rewrite degrades to the original message instead of
//! failing the request.

use tracing::{debug, warn};

use crate::completion::{CompletionGateway, CompletionRequest};
use crate::models::{ChatMessage, Mode};

/// Number of trailing history messages (three exchanges) used for rewriting.
pub const DEFAULT_HISTORY_WINDOW: usize = 6;

/// Sampling settings for the rewrite call.
#[derive(Debug, Clone, PartialEq)]
pub struct RewriteSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub history_window: usize,
}

impl Default for RewriteSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 200,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// The query used for retrieval, and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRewrite {
    /// No history; the message is used verbatim.
    Original(String),
    /// The model produced a standalone query.
    Enhanced(String),
    /// The rewrite call failed or returned nothing; the message is used verbatim.
    Fallback { query: String, reason: String },
}

impl QueryRewrite {
    pub fn query(&self) -> &str {
        match self {
            QueryRewrite::Original(q) | QueryRewrite::Enhanced(q) => q,
            QueryRewrite::Fallback { query, .. } => query,
        }
    }

    pub fn into_query(self) -> String {
        match self {
            QueryRewrite::Original(q) | QueryRewrite::Enhanced(q) => q,
            QueryRewrite::Fallback { query, .. } => query,
        }
    }
}

/// Render the last `window` messages as `role: content` lines, skipping
/// messages with empty content.
pub fn render_history(history: &[ChatMessage], window: usize) -> String {
    let start = history.len().saturating_sub(window);
    history[start..]
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn rewrite_prompt(conversation: &str, message: &str) -> String {
    format!(
        "Given the conversation history below, rewrite the current user question to make it \
standalone and include necessary context for document retrieval.

Conversation History:
{conversation}

Current Question: {message}

Instructions:
- Rewrite the question to be self-contained
- Include relevant context from the conversation history
- Expand abbreviations or pronouns with their referents
- Keep the enhanced query concise but complete
- Focus on what information needs to be retrieved from documents

Enhanced Query:"
    )
}

/// Rewrite `message` into a standalone query. Never fails.
pub async fn rewrite_query(
    gateway: &dyn CompletionGateway,
    settings: &RewriteSettings,
    message: &str,
    history: &[ChatMessage],
) -> QueryRewrite {
    if history.is_empty() {
        return QueryRewrite::Original(message.to_string());
    }

    let conversation = render_history(history, settings.history_window);
    let request = CompletionRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage::user(rewrite_prompt(&conversation, message))],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    };

    match gateway.complete(&request).await {
        Ok(text) => {
            let rewritten = text.trim();
            if rewritten.is_empty() {
                warn!("query rewrite returned empty text; using original message");
                QueryRewrite::Fallback {
                    query: message.to_string(),
                    reason: "empty rewrite".to_string(),
                }
            } else {
                debug!(original = message, rewritten, "query rewritten");
                QueryRewrite::Enhanced(rewritten.to_string())
            }
        }
        Err(e) => {
            warn!(error = %e, "query rewrite failed; using original message");
            QueryRewrite::Fallback {
                query: message.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// System instruction naming the active mode and embedding the context.
pub fn system_prompt(mode: Mode, context: &str) -> String {
    let usage = match mode {
        Mode::Retrieval => "Use the document excerpts below to answer the user's question.",
        Mode::FullContext => "Use the full documents below to answer the user's question.",
    };
    format!(
        "You are a helpful assistant that answers questions based on the provided documents.

Current mode: {mode}
{usage}

Documents:
{context}

Instructions:
- Answer based only on the information provided in the documents
- If the answer is not in the documents, say so clearly
- Cite which document(s) you're referencing when possible
- Be concise but comprehensive"
    )
}

/// System prompt, then the prior conversation, then the raw user message.
pub fn answer_messages(
    mode: Mode,
    context: &str,
    history: &[ChatMessage],
    message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt(mode, context)));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(message));
    messages
}
