//! Recursive token resolution
//!
//! A [`Resolver`] lives for exactly one top-level resolve call. It owns the
//! resolution path used for cycle detection, so concurrent resolutions never
//! see each other's in-flight tokens.
//!
//! Order of checks for every token:
//!
//! 1. cycle check against the resolution path (before any cache lookup, so a
//!    singleton under construction is still reported as a cycle)
//! 2. provider lookup, or an implicit singleton for constructible classes
//! 3. request-context check for request-scoped providers
//! 4. cache lookup (singleton / request), skipped for transients
//! 5. construction with the token pushed on the path, holding the entry's
//!    construction lock for singleton and request scope

use crate::descriptor::TypeDescriptorProvider;
use crate::factory::{Args, Construction, FactoryFn, Instance};
use crate::lock::{ConstructionLocks, LockKey};
use crate::scope::InstanceCache;
use crate::storage::ProviderRegistry;
use crate::{
    ClassRef, DescriptorTable, DiError, ProviderDefinition, RequestId, Result, Scope, Token,
};
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Tokens currently under construction, outermost first
#[derive(Debug, Default)]
pub(crate) struct ResolutionPath {
    stack: Vec<Token>,
}

impl ResolutionPath {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cycle closed by re-entering `token`, from its first occurrence
    /// back to itself, or `None` if `token` is not in flight.
    pub fn cycle_to(&self, token: &Token) -> Option<Vec<Token>> {
        let start = self.stack.iter().position(|entry| entry == token)?;
        let mut cycle = self.stack[start..].to_vec();
        cycle.push(token.clone());
        Some(cycle)
    }

    #[inline]
    pub fn push(&mut self, token: Token) {
        self.stack.push(token);
    }

    #[inline]
    pub fn pop(&mut self) {
        self.stack.pop();
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

/// Single-use resolver for one top-level resolve call
pub(crate) struct Resolver<'a> {
    registry: &'a ProviderRegistry,
    cache: &'a InstanceCache,
    descriptors: &'a DescriptorTable,
    locks: &'a ConstructionLocks,
    request_id: Option<&'a RequestId>,
    path: ResolutionPath,
}

impl<'a> Resolver<'a> {
    pub fn new(
        registry: &'a ProviderRegistry,
        cache: &'a InstanceCache,
        descriptors: &'a DescriptorTable,
        locks: &'a ConstructionLocks,
        request_id: Option<&'a RequestId>,
    ) -> Self {
        Self {
            registry,
            cache,
            descriptors,
            locks,
            request_id,
            path: ResolutionPath::new(),
        }
    }

    /// Resolve a token and everything it depends on.
    pub fn resolve(&mut self, token: &Token) -> Result<Instance> {
        if let Some(cycle) = self.path.cycle_to(token) {
            #[cfg(feature = "logging")]
            debug!(
                target: crate::logging::TARGET,
                token = %token,
                depth = self.path.depth(),
                "Circular dependency detected"
            );
            return Err(DiError::circular(cycle));
        }

        let registered = self.registry.lookup(token);
        let definition = match &registered {
            Some(definition) => Arc::clone(definition),
            None => match ProviderDefinition::implicit(token) {
                Some(definition) => {
                    #[cfg(feature = "logging")]
                    trace!(
                        target: crate::logging::TARGET,
                        token = %token,
                        "No provider registered, using implicit class provider"
                    );
                    Arc::new(definition)
                }
                None => {
                    #[cfg(feature = "logging")]
                    debug!(
                        target: crate::logging::TARGET,
                        token = %token,
                        kind = token.kind(),
                        "Provider not found"
                    );
                    return Err(DiError::not_found(token));
                }
            },
        };

        match definition.scope() {
            Scope::Transient => self.construct(token, &definition),
            Scope::Singleton => self.resolve_singleton(token, &definition, registered.as_ref()),
            Scope::Request => {
                let request_id = self.request_id.ok_or_else(|| DiError::request_scope(token))?;
                self.resolve_request(token, &definition, request_id)
            }
        }
    }

    fn resolve_singleton(
        &mut self,
        token: &Token,
        definition: &ProviderDefinition,
        registered: Option<&Arc<ProviderDefinition>>,
    ) -> Result<Instance> {
        if let Some(instance) = self.cache.singleton(token) {
            #[cfg(feature = "logging")]
            trace!(
                target: crate::logging::TARGET,
                token = %token,
                location = "singleton_cache",
                "Resolved from cache"
            );
            return Ok(instance);
        }

        // The value is its own cache
        if let Construction::Value(value) = definition.construction() {
            return Ok(Arc::clone(value));
        }

        let locks = self.locks;
        let key = LockKey::singleton(token);
        let slot = locks.slot(&key);
        let _held = locks.acquire(&key, &slot);

        // Another thread may have finished the same singleton while we waited
        if let Some(instance) = self.cache.singleton(token) {
            return Ok(instance);
        }

        let instance = self.construct(token, definition)?;

        // A definition replaced mid-construction must not leave a stale instance behind
        if self.registry.is_current(token, registered) {
            self.cache.store_singleton(token.clone(), Arc::clone(&instance));
        }

        Ok(instance)
    }

    fn resolve_request(
        &mut self,
        token: &Token,
        definition: &ProviderDefinition,
        request_id: &RequestId,
    ) -> Result<Instance> {
        if let Some(instance) = self.cache.request(token, request_id) {
            #[cfg(feature = "logging")]
            trace!(
                target: crate::logging::TARGET,
                token = %token,
                request_id = %request_id,
                location = "request_cache",
                "Resolved from cache"
            );
            return Ok(instance);
        }

        if let Construction::Value(value) = definition.construction() {
            return Ok(Arc::clone(value));
        }

        let locks = self.locks;
        let key = LockKey::request(token, request_id);
        let slot = locks.slot(&key);
        let _held = locks.acquire(&key, &slot);

        if let Some(instance) = self.cache.request(token, request_id) {
            return Ok(instance);
        }

        let instance = self.construct(token, definition)?;
        self.cache
            .store_request(token.clone(), request_id, Arc::clone(&instance));
        Ok(instance)
    }

    /// Build an instance with `token` on the resolution path.
    ///
    /// The path is popped before any error is returned.
    fn construct(&mut self, token: &Token, definition: &ProviderDefinition) -> Result<Instance> {
        #[cfg(feature = "logging")]
        trace!(
            target: crate::logging::TARGET,
            token = %token,
            scope = definition.scope().as_str(),
            strategy = definition.strategy(),
            depth = self.path.depth(),
            "Constructing instance"
        );

        self.path.push(token.clone());
        let result = match definition.construction() {
            Construction::Value(value) => Ok(Arc::clone(value)),
            Construction::Class(class) => self.construct_class(token, class),
            Construction::Factory {
                dependencies,
                factory,
            } => self.construct_factory(token, dependencies, factory),
        };
        self.path.pop();

        result
    }

    fn construct_class(&mut self, token: &Token, class: &ClassRef) -> Result<Instance> {
        let constructor = class.constructor().ok_or_else(|| DiError::not_found(token))?;

        let params = self.descriptors.constructor_parameter_types(class);
        let mut args = Vec::with_capacity(params.len());
        for (position, param) in params.into_iter().enumerate() {
            let param = param.ok_or_else(|| DiError::unknown_parameter(token, position))?;
            args.push(self.resolve(&param)?);
        }

        constructor(Args::new(token.clone(), args))
            .map_err(|error| DiError::from_construction(token, error))
    }

    fn construct_factory(
        &mut self,
        token: &Token,
        dependencies: &[Token],
        factory: &FactoryFn,
    ) -> Result<Instance> {
        let args = dependencies
            .iter()
            .map(|dependency| self.resolve(dependency))
            .collect::<Result<Vec<_>>>()?;

        factory(Args::new(token.clone(), args))
            .map_err(|error| DiError::from_construction(token, error))
    }
}
