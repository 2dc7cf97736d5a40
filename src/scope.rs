//! Instance caching and request scopes
//!
//! Singleton instances live for the lifetime of the container. Request-scoped
//! instances are grouped per request id so a whole request can be dropped in
//! one step. Transient instances are never stored.

use crate::factory::Instance;
use crate::{Container, Injectable, Result, Token};
use ahash::RandomState;
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::debug;

/// Identifier of one inbound request.
///
/// # Examples
///
/// ```rust
/// use token_injector::RequestId;
///
/// let a = RequestId::new("req-1");
/// assert_eq!(a, RequestId::from("req-1"));
/// assert_ne!(RequestId::generate(), RequestId::generate());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Wrap a caller-supplied id.
    #[inline]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Generate a new process-unique id of the form `req-N`.
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(Arc::from(format!("req-{n}")))
    }

    /// Get the raw id value.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({:?})", &*self.0)
    }
}

type RequestInstances = HashMap<Token, Instance, RandomState>;

/// Singleton and per-request instance caches
pub(crate) struct InstanceCache {
    singletons: DashMap<Token, Instance, RandomState>,
    requests: DashMap<RequestId, RequestInstances, RandomState>,
}

impl InstanceCache {
    #[inline]
    pub fn new() -> Self {
        Self {
            singletons: DashMap::with_hasher(RandomState::new()),
            requests: DashMap::with_hasher(RandomState::new()),
        }
    }

    #[inline]
    pub fn singleton(&self, token: &Token) -> Option<Instance> {
        self.singletons.get(token).map(|entry| Arc::clone(entry.value()))
    }

    #[inline]
    pub fn store_singleton(&self, token: Token, instance: Instance) {
        self.singletons.insert(token, instance);
    }

    /// Drop the cached singleton for a token, returning whether one existed
    #[inline]
    pub fn invalidate_singleton(&self, token: &Token) -> bool {
        self.singletons.remove(token).is_some()
    }

    #[inline]
    pub fn request(&self, token: &Token, request_id: &RequestId) -> Option<Instance> {
        self.requests
            .get(request_id)
            .and_then(|instances| instances.get(token).map(Arc::clone))
    }

    #[inline]
    pub fn store_request(&self, token: Token, request_id: &RequestId, instance: Instance) {
        self.requests
            .entry(request_id.clone())
            .or_default()
            .insert(token, instance);
    }

    /// Remove every instance cached for a request, returning how many there were.
    ///
    /// Only the entries of that request are touched.
    pub fn clear_request(&self, request_id: &RequestId) -> usize {
        self.requests
            .remove(request_id)
            .map(|(_, instances)| instances.len())
            .unwrap_or(0)
    }

    #[inline]
    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    #[inline]
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }
}

impl Default for InstanceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstanceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceCache")
            .field("singletons", &self.singleton_count())
            .field("requests", &self.request_count())
            .finish()
    }
}

/// A request context that clears its cached instances when dropped.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use token_injector::{Container, ProviderDefinition, RequestId, Token};
///
/// let container = Container::new();
/// container.register_provider(
///     ProviderDefinition::factory("ctx", Vec::<Token>::new(), |_| Ok(String::from("ctx")))
///         .request_scoped(),
/// );
///
/// let first = {
///     let request = container.request_scope(RequestId::new("req-1"));
///     let a = request.resolve::<String>(&Token::name("ctx")).unwrap();
///     let b = request.resolve::<String>(&Token::name("ctx")).unwrap();
///     assert!(Arc::ptr_eq(&a, &b));
///     a
/// };
///
/// // The request was cleared on drop, so the same id starts fresh
/// let again = container
///     .resolve_in::<String>(&Token::name("ctx"), &RequestId::new("req-1"))
///     .unwrap();
/// assert!(!Arc::ptr_eq(&first, &again));
/// ```
pub struct RequestScope<'a> {
    container: &'a Container,
    request_id: RequestId,
}

impl<'a> RequestScope<'a> {
    #[inline]
    pub(crate) fn new(container: &'a Container, request_id: RequestId) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            request_id = request_id.as_str(),
            "Entering request scope"
        );

        Self {
            container,
            request_id,
        }
    }

    /// The id of this request
    #[inline]
    pub fn id(&self) -> &RequestId {
        &self.request_id
    }

    /// Resolve a token within this request.
    #[inline]
    pub fn resolve<T: Injectable>(&self, token: &Token) -> Result<Arc<T>> {
        self.container.resolve_in::<T>(token, &self.request_id)
    }

    /// Resolve a token within this request without downcasting.
    #[inline]
    pub fn resolve_any(&self, token: &Token) -> Result<Instance> {
        self.container.resolve_any(token, Some(&self.request_id))
    }

    /// Get the underlying container.
    #[inline]
    pub fn container(&self) -> &Container {
        self.container
    }
}

impl Drop for RequestScope<'_> {
    fn drop(&mut self) {
        self.container.clear_request_scope(&self.request_id);
    }
}

impl fmt::Debug for RequestScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("request_id", &self.request_id)
            .finish()
    }
}
