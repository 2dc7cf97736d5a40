//! Provider registry
//!
//! Uses DashMap for lock-free concurrent access.

use crate::{ProviderDefinition, Token};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

/// Thread-safe storage for provider definitions
///
/// Uses `DashMap` with `ahash` for maximum concurrent performance.
/// Definitions are shared as `Arc`s so the resolver never holds a shard
/// guard while it builds an instance.
pub(crate) struct ProviderRegistry {
    providers: DashMap<Token, Arc<ProviderDefinition>, RandomState>,
}

impl ProviderRegistry {
    /// Create new empty registry with optimized shard count.
    ///
    /// Default DashMap uses num_cpus * 4 shards which is overkill for
    /// typical containers with <50 providers.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with pre-allocated capacity and shards scaled to it.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        let shard_amount = if capacity <= 16 {
            8
        } else if capacity <= 64 {
            16
        } else {
            32
        };
        Self {
            providers: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
        }
    }

    /// Store a definition under its own token, returning the one it replaced
    #[inline]
    pub fn insert(&self, definition: ProviderDefinition) -> Option<Arc<ProviderDefinition>> {
        self.providers
            .insert(definition.token().clone(), Arc::new(definition))
    }

    /// Look up the definition for a token
    #[inline]
    pub fn lookup(&self, token: &Token) -> Option<Arc<ProviderDefinition>> {
        self.providers.get(token).map(|entry| Arc::clone(entry.value()))
    }

    /// Whether `definition` is still the one registered for `token`.
    ///
    /// `None` stands for an implicit provider, which stays current as long as
    /// nothing has been registered for the token.
    pub fn is_current(&self, token: &Token, definition: Option<&Arc<ProviderDefinition>>) -> bool {
        match (self.providers.get(token), definition) {
            (Some(entry), Some(definition)) => Arc::ptr_eq(entry.value(), definition),
            (None, None) => true,
            _ => false,
        }
    }

    /// Check if a token is registered
    #[inline]
    pub fn contains(&self, token: &Token) -> bool {
        self.providers.contains_key(token)
    }

    /// Get number of registered providers
    #[inline]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Get all registered tokens
    pub fn tokens(&self) -> Vec<Token> {
        self.providers.iter().map(|r| r.key().clone()).collect()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("count", &self.len())
            .finish()
    }
}
