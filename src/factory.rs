//! Construction strategies
//!
//! Strategies are stored type-erased: every instance leaves the container as
//! an `Arc<dyn Any + Send + Sync>` and is downcast at the typed boundary.
//!
//! Using an enum instead of `Box<dyn Trait>` keeps the three strategies
//! visible to the resolver, which treats values differently from the two
//! strategies that take injected arguments.

use crate::{BoxError, Class, ClassRef, DiError, Injectable, Result, Token};
use std::any::Any;
use std::sync::Arc;

/// A type-erased, shared instance produced by the container.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased class constructor
pub(crate) type ConstructFn = fn(Args) -> std::result::Result<Instance, BoxError>;

/// Type-erased factory function
pub(crate) type FactoryFn =
    Arc<dyn Fn(Args) -> std::result::Result<Instance, BoxError> + Send + Sync>;

pub(crate) fn construct_class<T: Class>(args: Args) -> std::result::Result<Instance, BoxError> {
    T::construct(args).map(|value| Arc::new(value) as Instance)
}

/// Resolved constructor arguments, handed out in declaration order.
///
/// # Examples
///
/// ```rust
/// use token_injector::{Container, ProviderDefinition, Token};
///
/// let container = Container::new();
/// container.register("host", String::from("localhost"));
/// container.register("port", 5432u16);
/// container.register_provider(ProviderDefinition::factory(
///     "dsn",
///     ["host", "port"],
///     |mut args| {
///         let host = args.next::<String>()?;
///         let port = args.next::<u16>()?;
///         Ok(format!("{host}:{port}"))
///     },
/// ));
///
/// let dsn = container.resolve::<String>(&Token::name("dsn")).unwrap();
/// assert_eq!(dsn.as_str(), "localhost:5432");
/// ```
pub struct Args {
    owner: Token,
    values: std::vec::IntoIter<Instance>,
    position: usize,
}

impl Args {
    #[inline]
    pub(crate) fn new(owner: Token, values: Vec<Instance>) -> Self {
        Self {
            owner,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Take the next argument as an `Arc<T>`.
    ///
    /// Fails with `DiError::ArgumentMismatch` when no argument is left or the
    /// argument is not a `T`.
    pub fn next<T: Injectable>(&mut self) -> Result<Arc<T>> {
        let position = self.position;
        self.position += 1;

        self.values
            .next()
            .and_then(|value| value.downcast::<T>().ok())
            .ok_or_else(|| DiError::ArgumentMismatch {
                owner: self.owner.to_string(),
                position,
                expected: std::any::type_name::<T>(),
            })
    }

    /// Take the next argument without downcasting it.
    pub fn next_instance(&mut self) -> Option<Instance> {
        self.position += 1;
        self.values.next()
    }

    /// The token being constructed
    #[inline]
    pub fn owner(&self) -> &Token {
        &self.owner
    }

    /// Number of arguments not taken yet
    #[inline]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("owner", &self.owner)
            .field("position", &self.position)
            .field("remaining", &self.remaining())
            .finish()
    }
}

/// How a provider builds its instance
#[derive(Clone)]
pub(crate) enum Construction {
    /// Pre-built instance, returned as-is
    Value(Instance),
    /// Type built from the arguments its descriptor lists
    Class(ClassRef),
    /// Function called with the resolved dependency tokens
    Factory {
        dependencies: Vec<Token>,
        factory: FactoryFn,
    },
}

impl Construction {
    pub(crate) fn factory<T, F>(dependencies: Vec<Token>, factory: F) -> Self
    where
        T: Injectable,
        F: Fn(Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Construction::Factory {
            dependencies,
            factory: Arc::new(move |args| factory(args).map(|value| Arc::new(value) as Instance)),
        }
    }

    #[inline]
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Construction::Value(_) => "value",
            Construction::Class(_) => "class",
            Construction::Factory { .. } => "factory",
        }
    }
}
