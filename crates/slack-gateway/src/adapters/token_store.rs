//! In-memory workspace token store.

use crate::ports::outbound::{CredentialResolver, TokenStore};
use dashmap::DashMap;
use tracing::debug;

/// Bot tokens keyed by workspace id.
///
/// Suitable for single-process deployments and tests; tokens are lost on
/// restart.
#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: DashMap<String, String>,
}

// Workspace ids only; tokens stay out of logs.
impl std::fmt::Debug for InMemoryTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.tokens.iter().map(|entry| entry.key().clone()))
            .finish()
    }
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of installed workspaces
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for InMemoryTokenStore
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            tokens: iter
                .into_iter()
                .map(|(team, token)| (team.into(), token.into()))
                .collect(),
        }
    }
}

impl CredentialResolver for InMemoryTokenStore {
    fn resolve(&self, team_id: &str) -> Option<String> {
        self.tokens
            .get(team_id)
            .map(|token| token.value().clone())
            .filter(|token| !token.is_empty())
    }
}

impl TokenStore for InMemoryTokenStore {
    fn store(&self, team_id: &str, token: &str) {
        debug!(team_id, "Storing workspace token");
        self.tokens.insert(team_id.to_string(), token.to_string());
    }

    fn remove(&self, team_id: &str) -> Option<String> {
        debug!(team_id, "Removing workspace token");
        self.tokens.remove(team_id).map(|(_, token)| token)
    }
}
