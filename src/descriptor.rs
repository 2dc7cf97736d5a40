//! Constructor parameter metadata
//!
//! The container never inspects types itself. For every class it constructs
//! it asks a [`TypeDescriptorProvider`] for the ordered tokens of the class's
//! constructor parameters.

use crate::{ClassRef, Injectable, Token};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::TypeId;
use std::sync::Arc;

/// Source of constructor parameter types.
///
/// A `None` entry marks a parameter whose type is unknown. It is reported as
/// `DiError::ProviderNotFound` only when the class is actually constructed.
pub trait TypeDescriptorProvider: Send + Sync {
    /// Ordered parameter tokens for `class`; empty when it takes none.
    fn constructor_parameter_types(&self, class: &ClassRef) -> Vec<Option<Token>>;
}

impl<F> TypeDescriptorProvider for F
where
    F: Fn(&ClassRef) -> Vec<Option<Token>> + Send + Sync,
{
    fn constructor_parameter_types(&self, class: &ClassRef) -> Vec<Option<Token>> {
        self(class)
    }
}

/// Explicit registration table of constructor parameters.
///
/// Classes without an entry are looked up in the fallback provider, if any,
/// and otherwise have no parameters.
///
/// # Examples
///
/// ```rust
/// use token_injector::{ClassRef, DescriptorTable, Token, TypeDescriptorProvider};
///
/// struct Config;
/// struct Database;
///
/// let table = DescriptorTable::new();
/// table.describe::<Database>([Token::of::<Config>()]);
///
/// let params = table.constructor_parameter_types(&ClassRef::of::<Database>());
/// assert_eq!(params, vec![Some(Token::of::<Config>())]);
/// assert!(table.constructor_parameter_types(&ClassRef::of::<Config>()).is_empty());
/// ```
pub struct DescriptorTable {
    entries: DashMap<TypeId, Arc<[Option<Token>]>, RandomState>,
    fallback: Option<Arc<dyn TypeDescriptorProvider>>,
}

impl DescriptorTable {
    /// Create an empty table.
    #[inline]
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            fallback: None,
        }
    }

    /// Create an empty table that defers unknown classes to `fallback`.
    #[inline]
    pub fn with_fallback(fallback: Arc<dyn TypeDescriptorProvider>) -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            fallback: Some(fallback),
        }
    }

    /// Declare the constructor parameters of `T`.
    pub fn describe<T: Injectable>(&self, params: impl IntoIterator<Item = Token>) {
        self.describe_partial::<T>(params.into_iter().map(Some));
    }

    /// Declare the constructor parameters of `T`, some of which may be unknown.
    pub fn describe_partial<T: Injectable>(&self, params: impl IntoIterator<Item = Option<Token>>) {
        self.describe_id(TypeId::of::<T>(), params.into_iter().collect());
    }

    /// Declare parameters by `TypeId` directly (advanced use).
    pub fn describe_id(&self, type_id: TypeId, params: Vec<Option<Token>>) {
        self.entries.insert(type_id, params.into());
    }

    /// Whether `T` has an explicit entry
    #[inline]
    pub fn is_described<T: Injectable>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Number of explicit entries
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no explicit entries
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TypeDescriptorProvider for DescriptorTable {
    fn constructor_parameter_types(&self, class: &ClassRef) -> Vec<Option<Token>> {
        // Clone the entry out so no shard guard is held while resolving
        let entry = self
            .entries
            .get(&class.type_id())
            .map(|params| Arc::clone(params.value()));

        match (entry, &self.fallback) {
            (Some(params), _) => params.to_vec(),
            (None, Some(fallback)) => fallback.constructor_parameter_types(class),
            (None, None) => Vec::new(),
        }
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DescriptorTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorTable")
            .field("count", &self.len())
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}
