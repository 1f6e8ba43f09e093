use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::context::{hash_to_field, UserContext};
use crate::error::ConfigError;
use crate::request::VerificationRequest;
use crate::types::{DisclosurePolicy, UserDefinedData};

/// Default number of per-link policies an [`InMemoryConfigStore`] keeps.
pub const DEFAULT_MAX_LINK_POLICIES: usize = 10_000;

/// Identifier of a stored disclosure policy.
///
/// Either the scope-wide id ([`ConfigId::from_scope`]) or the id of one issued link
/// ([`ConfigId::from_user_context`]). Link ids are derived from the user context the
/// proof is bound to, so a proof can only ever select the policy of its own link.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigId(String);

impl ConfigId {
    /// The identifier of the policy that governs `scope`.
    #[must_use]
    pub fn from_scope(scope: &str) -> Self {
        Self(hash_to_field(scope.as_bytes()).to_hex_string())
    }

    /// The identifier of the link issued for `context` within `scope`.
    #[must_use]
    pub fn from_user_context(scope: &str, context: &UserContext) -> Self {
        // Scopes are at most 31 bytes, so the length prefix keeps the encoding unambiguous
        let mut bytes = Vec::with_capacity(1 + scope.len() + crate::constants::USER_CONTEXT_DATA_LEN);
        bytes.push(u8::try_from(scope.len()).unwrap_or(u8::MAX));
        bytes.extend_from_slice(scope.as_bytes());
        bytes.extend_from_slice(&context.to_bytes());
        Self(hash_to_field(&bytes).to_hex_string())
    }

    /// The identifier of the link built from `request`.
    ///
    /// A request without user defined data binds 64 zero bytes, as the companion app does.
    #[must_use]
    pub fn for_request(request: &VerificationRequest) -> Self {
        let user_defined_data = request
            .user_defined_data()
            .cloned()
            .unwrap_or_else(|| UserDefinedData::from_bytes([0; 64]));
        let context = UserContext::new(request.user_id().clone(), user_defined_data);
        Self::from_user_context(request.scope(), &context)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the disclosure policy that applies to a verification.
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    /// Looks up the policy stored under `config_id`.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnknownConfig`] if no policy applies.
    async fn resolve(&self, config_id: &ConfigId) -> Result<Arc<DisclosurePolicy>, ConfigError>;

    /// Inserts or replaces the policy for `config_id`.
    ///
    /// # Errors
    /// Returns an error if the policy can't be stored.
    async fn upsert(&self, config_id: ConfigId, policy: DisclosurePolicy)
        -> Result<(), ConfigError>;
}

#[derive(Debug, Default)]
struct Policies {
    entries: HashMap<ConfigId, Arc<DisclosurePolicy>>,
    /// Upserted ids, oldest first. Pinned ids are never listed here.
    evictable: VecDeque<ConfigId>,
}

/// Process-local policy store.
///
/// Policies are swapped as whole `Arc`s, so a reader always sees either the old or the
/// new policy. Policies given while building the store are pinned; upserted ones are
/// evicted oldest first once more than `max_link_policies` are held. Fails closed unless
/// a fallback policy is configured.
#[derive(Debug)]
pub struct InMemoryConfigStore {
    policies: RwLock<Policies>,
    fallback: Option<Arc<DisclosurePolicy>>,
    max_link_policies: usize,
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self {
            policies: RwLock::default(),
            fallback: None,
            max_link_policies: DEFAULT_MAX_LINK_POLICIES,
        }
    }
}

impl InMemoryConfigStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `policy` for every identifier without a stored policy.
    #[must_use]
    pub fn with_fallback(mut self, policy: DisclosurePolicy) -> Self {
        self.fallback = Some(Arc::new(policy));
        self
    }

    /// Pins `policy` under `config_id`; pinned policies are never evicted.
    #[must_use]
    pub fn with_policy(self, config_id: ConfigId, policy: DisclosurePolicy) -> Self {
        {
            let mut policies = self.policies.write().unwrap_or_else(PoisonError::into_inner);
            policies.evictable.retain(|id| *id != config_id);
            policies.entries.insert(config_id, Arc::new(policy));
        }
        self
    }

    /// Caps the number of upserted policies kept at once.
    #[must_use]
    pub const fn with_max_link_policies(mut self, max: usize) -> Self {
        self.max_link_policies = max;
        self
    }

    fn insert(&self, config_id: ConfigId, policy: DisclosurePolicy) {
        let mut policies = self.policies.write().unwrap_or_else(PoisonError::into_inner);
        let pinned = policies.entries.contains_key(&config_id)
            && !policies.evictable.contains(&config_id);

        if policies
            .entries
            .insert(config_id.clone(), Arc::new(policy))
            .is_none()
        {
            policies.evictable.push_back(config_id);
        } else if !pinned {
            // Refreshed links move to the back of the queue
            policies.evictable.retain(|id| *id != config_id);
            policies.evictable.push_back(config_id);
        }

        while policies.evictable.len() > self.max_link_policies {
            if let Some(oldest) = policies.evictable.pop_front() {
                policies.entries.remove(&oldest);
                tracing::debug!(config_id = %oldest, "Evicted verification policy");
            }
        }
    }

    /// Removes the policy for `config_id`, returning it if present.
    pub fn remove(&self, config_id: &ConfigId) -> Option<Arc<DisclosurePolicy>> {
        let mut policies = self.policies.write().unwrap_or_else(PoisonError::into_inner);
        policies.evictable.retain(|id| id != config_id);
        policies.entries.remove(config_id)
    }

    /// Number of stored policies, pinned ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn resolve(&self, config_id: &ConfigId) -> Result<Arc<DisclosurePolicy>, ConfigError> {
        let stored = self
            .policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(config_id)
            .cloned();

        stored
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| ConfigError::UnknownConfig(config_id.clone()))
    }

    async fn upsert(
        &self,
        config_id: ConfigId,
        policy: DisclosurePolicy,
    ) -> Result<(), ConfigError> {
        tracing::debug!(config_id = %config_id, "Storing verification policy");
        self.insert(config_id, policy);
        Ok(())
    }
}
