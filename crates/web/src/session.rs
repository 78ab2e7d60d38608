//! Chat sessions and signed session tokens.
//!
//! A token is `<uuid>.<hex hmac-sha256(uuid)>`. Tokens that fail
//! verification or name an unknown session get a fresh session.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use teller_agent::{AgentFactory, BankServiceAgent, ChatMessage};
use teller_core::{AppError, AppResult};
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// First message of every conversation.
pub const WELCOME_MESSAGE: &str = "👋 Hello! I am your bank customer-support assistant.

I can help you with:
- 📝 Questions about banking services
- 💰 Wealth management products
- 🏠 Loan application procedures
- 💳 Credit card questions
- 🌐 The latest financial news

How can I help you today?";

/// Signs and verifies session ids.
#[derive(Clone)]
pub struct TokenSigner {
    key: Vec<u8>,
}

impl TokenSigner {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Signer using `secret`, or a random per-process key when unset.
    pub fn from_secret(secret: Option<&str>) -> Self {
        match secret {
            Some(secret) => Self::new(secret.as_bytes()),
            None => {
                tracing::warn!(
                    "SECRET_KEY not set, using an ephemeral session key; sessions end on restart"
                );
                let key: Vec<u8> = [Uuid::new_v4(), Uuid::new_v4()]
                    .iter()
                    .flat_map(|id| id.as_bytes().to_vec())
                    .collect();
                Self::new(key)
            }
        }
    }

    fn mac(&self) -> AppResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::Session(format!("Invalid session key: {}", e)))
    }

    pub fn sign(&self, id: Uuid) -> AppResult<String> {
        let mut mac = self.mac()?;
        mac.update(id.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", id, signature))
    }

    /// Session id carried by a correctly signed token.
    pub fn verify(&self, token: &str) -> Option<Uuid> {
        let (id, signature) = token.split_once('.')?;
        let id = Uuid::parse_str(id).ok()?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac().ok()?;
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(id)
    }
}

/// One browser conversation.
pub struct ChatSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    messages: Vec<ChatMessage>,
    agent: BankServiceAgent,
}

impl ChatSession {
    fn new(id: Uuid, agent: BankServiceAgent) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            messages: vec![ChatMessage::assistant(WELCOME_MESSAGE)],
            agent,
        }
    }

    /// Messages shown in the chat window.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Answer `message`, recording both sides for display.
    pub async fn chat(&mut self, message: &str) -> teller_agent::ChatReply {
        self.messages.push(ChatMessage::user(message));
        let reply = self.agent.chat(message).await;
        self.messages.push(ChatMessage::assistant(reply.answer.clone()));
        reply
    }

    /// Forget displayed messages and agent history.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.agent.clear_history();
        tracing::info!(
            "Cleared chat session {} (started {})",
            self.id,
            self.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

/// Shared handle to a session; one request at a time per session.
pub type SessionHandle = Arc<tokio::sync::Mutex<ChatSession>>;

struct SessionEntry {
    session: SessionHandle,
    last_seen: Instant,
}

/// A session looked up or created for a request.
pub struct ResolvedSession {
    pub token: String,
    pub session: SessionHandle,
    pub created: bool,
}

/// All live chat sessions.
pub struct SessionStore {
    factory: Arc<AgentFactory>,
    signer: TokenSigner,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

impl SessionStore {
    pub fn new(factory: Arc<AgentFactory>, signer: TokenSigner, idle_timeout: Duration) -> Self {
        Self {
            factory,
            signer,
            idle_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> AppResult<std::sync::MutexGuard<'_, HashMap<Uuid, SessionEntry>>> {
        self.sessions
            .lock()
            .map_err(|_| AppError::Session("Session store lock poisoned".to_string()))
    }

    /// Start a new session with a fresh agent.
    pub fn create(&self) -> AppResult<ResolvedSession> {
        let id = Uuid::new_v4();
        let token = self.signer.sign(id)?;
        let session = Arc::new(tokio::sync::Mutex::new(ChatSession::new(id, self.factory.create())));

        self.lock()?.insert(
            id,
            SessionEntry {
                session: session.clone(),
                last_seen: Instant::now(),
            },
        );

        tracing::info!("Created chat session {}", id);
        Ok(ResolvedSession {
            token,
            session,
            created: true,
        })
    }

    /// Existing session for `token`.
    pub fn get(&self, token: &str) -> AppResult<Option<SessionHandle>> {
        let Some(id) = self.signer.verify(token) else {
            tracing::debug!("Rejected invalid session token");
            return Ok(None);
        };

        let mut sessions = self.lock()?;
        Ok(sessions.get_mut(&id).map(|entry| {
            entry.last_seen = Instant::now();
            entry.session.clone()
        }))
    }

    /// Session for `token`, or a new one if it is missing or invalid.
    pub fn resolve(&self, token: Option<&str>) -> AppResult<ResolvedSession> {
        if let Some(token) = token {
            if let Some(session) = self.get(token)? {
                return Ok(ResolvedSession {
                    token: token.to_string(),
                    session,
                    created: false,
                });
            }
        }
        self.create()
    }

    /// Clear the session's messages and history. False if unknown.
    pub async fn clear(&self, token: &str) -> AppResult<bool> {
        let Some(session) = self.get(token)? else {
            return Ok(false);
        };
        session.lock().await.clear();
        Ok(true)
    }

    /// Drop sessions idle longer than the timeout; returns how many.
    pub fn sweep(&self) -> AppResult<usize> {
        let timeout = self.idle_timeout;
        let mut sessions = self.lock()?;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < timeout);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!("Expired {} idle chat sessions", removed);
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
