//! Shared application state.

use crate::session::{SessionStore, TokenSigner};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use teller_agent::AgentFactory;
use teller_core::{AppConfig, AppResult};
use teller_knowledge::KnowledgeBase;

/// Sessions idle this long are dropped.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Which optional features are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Features {
    pub web_search: bool,
    pub ai_chat: bool,
    pub tracing: bool,
}

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub agent_factory: Arc<AgentFactory>,
    pub knowledge: Option<Arc<KnowledgeBase>>,
    pub sessions: Arc<SessionStore>,
    pub features: Features,
}

impl AppState {
    pub fn new(factory: AgentFactory, signer: TokenSigner) -> Self {
        let features = Features {
            web_search: factory.search_available(),
            ai_chat: factory.model_available(),
            tracing: factory.tracing_enabled(),
        };
        let knowledge = factory.knowledge().cloned();
        let agent_factory = Arc::new(factory);
        let sessions = Arc::new(SessionStore::new(
            agent_factory.clone(),
            signer,
            SESSION_IDLE_TIMEOUT,
        ));

        Self {
            agent_factory,
            knowledge,
            sessions,
            features,
        }
    }

    /// State wired from configuration, around an opened knowledge base.
    pub fn from_config(config: &AppConfig, knowledge: Arc<KnowledgeBase>) -> AppResult<Self> {
        let factory = AgentFactory::from_config(config, Some(knowledge))?;
        let signer = TokenSigner::from_secret(config.security.secret_key.as_deref());
        Ok(Self::new(factory, signer))
    }
}
