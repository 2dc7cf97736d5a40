//! Dependency injection container
//!
//! The `Container` is the public entry point. It owns the provider registry,
//! the instance caches and the descriptor table, and hands each resolve call
//! to a fresh resolver.

use crate::descriptor::TypeDescriptorProvider;
use crate::factory::Instance;
use crate::lock::{ConstructionLocks, LockKey};
use crate::resolver::Resolver;
use crate::scope::{InstanceCache, RequestScope};
use crate::storage::ProviderRegistry;
use crate::{
    BoxError, Class, DescriptorTable, DiError, Injectable, ProviderDefinition, RequestId, Result,
    Scope, Token,
};
use once_cell::sync::Lazy;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Process-wide container, created on first access
static GLOBAL: Lazy<Container> = Lazy::new(|| {
    #[cfg(feature = "logging")]
    debug!(target: crate::logging::TARGET, "Initializing process-wide container");

    Container::new()
});

/// Token-keyed dependency injection container.
///
/// Cloning a `Container` yields another handle to the same registry and
/// caches. Use [`Container::create_test_instance`] for an independent one.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use token_injector::{Args, BoxError, Class, Container, Token};
///
/// struct Logger {
///     id: u32,
/// }
///
/// struct UserService {
///     logger: Arc<Logger>,
/// }
///
/// impl Class for UserService {
///     fn construct(mut args: Args) -> Result<Self, BoxError> {
///         Ok(UserService { logger: args.next::<Logger>()? })
///     }
/// }
///
/// let container = Container::new();
/// container.register(Token::of::<Logger>(), Logger { id: 1 });
/// container.describe::<UserService>([Token::of::<Logger>()]);
///
/// // UserService is built on first use without being registered
/// let users = container.get::<UserService>().unwrap();
/// let logger = container.resolve::<Logger>(&Token::of::<Logger>()).unwrap();
/// assert!(Arc::ptr_eq(&users.logger, &logger));
/// assert_eq!(logger.id, 1);
/// ```
#[derive(Clone)]
pub struct Container {
    /// Provider definitions by token
    registry: Arc<ProviderRegistry>,
    /// Singleton and request caches
    cache: Arc<InstanceCache>,
    /// Constructor parameter metadata
    descriptors: Arc<DescriptorTable>,
    /// Per-entry locks serializing cache-miss construction
    locks: Arc<ConstructionLocks>,
}

impl Container {
    /// Create a new, empty container.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use token_injector::Container;
    /// let container = Container::new();
    /// assert!(container.is_empty());
    /// ```
    #[inline]
    pub fn new() -> Self {
        Self::from_parts(ProviderRegistry::new(), DescriptorTable::new())
    }

    /// Create a container with pre-allocated registry capacity.
    ///
    /// Use this when you know approximately how many providers will be registered.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_parts(ProviderRegistry::with_capacity(capacity), DescriptorTable::new())
    }

    /// Create a container whose descriptor table falls back to `provider` for
    /// classes it has no explicit entry for.
    #[inline]
    pub fn with_descriptors(provider: Arc<dyn TypeDescriptorProvider>) -> Self {
        Self::from_parts(ProviderRegistry::new(), DescriptorTable::with_fallback(provider))
    }

    fn from_parts(registry: ProviderRegistry, descriptors: DescriptorTable) -> Self {
        #[cfg(feature = "logging")]
        debug!(target: crate::logging::TARGET, "Creating new DI container");

        Self {
            registry: Arc::new(registry),
            cache: Arc::new(InstanceCache::new()),
            descriptors: Arc::new(descriptors),
            locks: Arc::new(ConstructionLocks::new()),
        }
    }

    /// The shared, process-wide container.
    ///
    /// The first call creates it; every later call returns the same one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use token_injector::Container;
    ///
    /// let a = Container::global();
    /// let b = Container::global();
    /// assert!(a.same_as(b));
    /// ```
    #[inline]
    pub fn global() -> &'static Container {
        &GLOBAL
    }

    /// Alias for [`Container::global`].
    #[inline]
    pub fn get_instance() -> &'static Container {
        Self::global()
    }

    /// Create an isolated container with its own registry and caches.
    ///
    /// Every call returns a new container that shares nothing with
    /// [`Container::global`] or with other test instances.
    #[inline]
    pub fn create_test_instance() -> Self {
        Self::new()
    }

    /// Whether two handles point at the same container state
    #[inline]
    pub fn same_as(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry)
    }

    // =========================================================================
    // Registration Methods
    // =========================================================================

    /// Register a pre-built value as a singleton.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use token_injector::{Container, Token};
    ///
    /// let container = Container::new();
    /// container.register("port", 8080u16);
    ///
    /// let a = container.resolve::<u16>(&Token::name("port")).unwrap();
    /// let b = container.resolve::<u16>(&Token::name("port")).unwrap();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// ```
    #[inline]
    pub fn register<T: Injectable>(&self, token: impl Into<Token>, value: T) {
        self.register_provider(ProviderDefinition::value(token, value));
    }

    /// Register a provider definition.
    ///
    /// Replaces any definition already registered for the same token and drops
    /// the singleton cached for it.
    pub fn register_provider(&self, definition: ProviderDefinition) {
        // Waits out an in-flight build of the old definition's singleton
        let key = LockKey::singleton(definition.token());
        let slot = self.locks.slot(&key);
        let _held = self.locks.acquire(&key, &slot);

        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            token = %definition.token(),
            scope = definition.scope().as_str(),
            strategy = definition.strategy(),
            provider_count = self.registry.len() + 1,
            "Registering provider"
        );

        let token = definition.token().clone();
        let replaced = self.registry.insert(definition);
        let invalidated = self.cache.invalidate_singleton(&token);

        #[cfg(feature = "logging")]
        if replaced.is_some() {
            debug!(
                target: crate::logging::TARGET,
                token = %token,
                invalidated_singleton = invalidated,
                "Replaced existing provider"
            );
        }

        #[cfg(not(feature = "logging"))]
        let _ = (replaced, invalidated);
    }

    /// Register `T` under its own class token.
    #[inline]
    pub fn register_class<T: Class>(&self, scope: Scope) {
        self.register_provider(
            ProviderDefinition::class::<T>(Token::class::<T>()).with_scope(scope),
        );
    }

    /// Register a factory called with the resolved `dependencies`, in order.
    #[inline]
    pub fn register_factory<T, F, I>(
        &self,
        token: impl Into<Token>,
        scope: Scope,
        dependencies: I,
        factory: F,
    ) where
        T: Injectable,
        F: Fn(crate::Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
        I: IntoIterator,
        I::Item: Into<Token>,
    {
        self.register_provider(
            ProviderDefinition::factory(token, dependencies, factory).with_scope(scope),
        );
    }

    /// Declare the constructor parameters of `T`.
    #[inline]
    pub fn describe<T: Injectable>(&self, params: impl IntoIterator<Item = Token>) {
        self.descriptors.describe::<T>(params);
    }

    /// Declare the constructor parameters of `T`, some of which may be unknown.
    #[inline]
    pub fn describe_partial<T: Injectable>(&self, params: impl IntoIterator<Item = Option<Token>>) {
        self.descriptors.describe_partial::<T>(params);
    }

    /// Start a fluent batch registration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use token_injector::{Container, Token};
    ///
    /// let container = Container::new();
    /// container
    ///     .register_batch()
    ///     .value("host", String::from("localhost"))
    ///     .value("port", 5432u16)
    ///     .done();
    ///
    /// assert!(container.contains(&Token::name("host")));
    /// assert!(container.contains(&Token::name("port")));
    /// ```
    #[inline]
    pub fn register_batch(&self) -> BatchBuilder<'_> {
        BatchBuilder {
            container: self,
            count: 0,
        }
    }

    // =========================================================================
    // Resolution Methods
    // =========================================================================

    /// Resolve a token outside of any request.
    #[inline]
    pub fn resolve<T: Injectable>(&self, token: &Token) -> Result<Arc<T>> {
        downcast(token, self.resolve_any(token, None)?)
    }

    /// Resolve a token within a request.
    #[inline]
    pub fn resolve_in<T: Injectable>(
        &self,
        token: &Token,
        request_id: &RequestId,
    ) -> Result<Arc<T>> {
        downcast(token, self.resolve_any(token, Some(request_id))?)
    }

    /// Resolve `T`'s own class token.
    #[inline]
    pub fn get<T: Class>(&self) -> Result<Arc<T>> {
        self.resolve::<T>(&Token::class::<T>())
    }

    /// Resolve a token that may be absent; an absent token resolves to `None`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use token_injector::{Container, Token};
    ///
    /// let container = Container::new();
    /// let optional: Option<&Token> = None;
    /// assert!(container.resolve_optional::<u8>(optional, None).unwrap().is_none());
    /// ```
    pub fn resolve_optional<T: Injectable>(
        &self,
        token: Option<&Token>,
        request_id: Option<&RequestId>,
    ) -> Result<Option<Arc<T>>> {
        match token {
            Some(token) => downcast(token, self.resolve_any(token, request_id)?).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve a token without downcasting the result.
    pub fn resolve_any(&self, token: &Token, request_id: Option<&RequestId>) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: crate::logging::TARGET,
            token = %token,
            request_id = request_id.map(RequestId::as_str),
            "Resolving token"
        );

        Resolver::new(
            &self.registry,
            &self.cache,
            &self.descriptors,
            &self.locks,
            request_id,
        )
        .resolve(token)
    }

    /// Try to resolve, returning None on any error.
    #[inline]
    pub fn try_resolve<T: Injectable>(&self, token: &Token) -> Option<Arc<T>> {
        self.resolve::<T>(token).ok()
    }

    // =========================================================================
    // Request Scope Methods
    // =========================================================================

    /// Drop every instance cached for a request.
    ///
    /// Clearing a request with nothing cached is a no-op. Returns the number
    /// of instances removed.
    pub fn clear_request_scope(&self, request_id: &RequestId) -> usize {
        let removed = self.cache.clear_request(request_id);

        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            request_id = %request_id,
            instances_removed = removed,
            "Request scope cleared"
        );

        removed
    }

    /// Enter a request that is cleared when the returned guard is dropped.
    #[inline]
    pub fn request_scope(&self, request_id: impl Into<RequestId>) -> RequestScope<'_> {
        RequestScope::new(self, request_id.into())
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Check if a token has a registered provider.
    ///
    /// Constructible class tokens resolve without registration but are not
    /// reported here.
    #[inline]
    pub fn contains(&self, token: &Token) -> bool {
        self.registry.contains(token)
    }

    /// Look up the definition registered for a token.
    #[inline]
    pub fn provider(&self, token: &Token) -> Option<Arc<ProviderDefinition>> {
        self.registry.lookup(token)
    }

    /// Get the number of registered providers.
    #[inline]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Check if no provider is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Get all registered tokens.
    pub fn registered_tokens(&self) -> Vec<Token> {
        self.registry.tokens()
    }

    /// Number of singleton instances built so far
    #[inline]
    pub fn cached_singletons(&self) -> usize {
        self.cache.singleton_count()
    }

    /// Number of requests with cached instances
    #[inline]
    pub fn active_requests(&self) -> usize {
        self.cache.request_count()
    }
}

fn downcast<T: Injectable>(token: &Token, instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| DiError::type_mismatch::<T>(token))
}

/// Fluent batch registration builder.
pub struct BatchBuilder<'a> {
    container: &'a Container,
    count: usize,
}

impl BatchBuilder<'_> {
    /// Register a definition and continue the chain
    #[inline]
    pub fn provider(mut self, definition: ProviderDefinition) -> Self {
        self.container.register_provider(definition);
        self.count += 1;
        self
    }

    /// Register a value and continue the chain
    #[inline]
    pub fn value<T: Injectable>(self, token: impl Into<Token>, value: T) -> Self {
        self.provider(ProviderDefinition::value(token, value))
    }

    /// Register a class under its own token and continue the chain
    #[inline]
    pub fn class<T: Class>(self, scope: Scope) -> Self {
        self.provider(ProviderDefinition::class::<T>(Token::class::<T>()).with_scope(scope))
    }

    /// Finish the batch registration, returning how many providers were registered
    #[inline]
    pub fn done(self) -> usize {
        #[cfg(feature = "logging")]
        debug!(
            target: crate::logging::TARGET,
            providers_registered = self.count,
            "Batch registration completed"
        );

        self.count
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("provider_count", &self.len())
            .field("cached_singletons", &self.cached_singletons())
            .field("active_requests", &self.active_requests())
            .finish()
    }
}
