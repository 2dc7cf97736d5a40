//! Provider definitions
//!
//! A provider definition is the recipe registered under a token: a scope and
//! exactly one construction strategy (value, class or factory).

use crate::factory::{Args, Construction, Instance};
use crate::{BoxError, ClassRef, Token};
use std::sync::Arc;

/// Marker trait for types that can be stored in the container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

/// A type the container can construct from its injected arguments.
///
/// The order of the arguments is the one reported for the type by the
/// container's [`TypeDescriptorProvider`](crate::TypeDescriptorProvider).
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use token_injector::{Args, BoxError, Class};
///
/// struct Config {
///     url: String,
/// }
///
/// struct Database {
///     config: Arc<Config>,
/// }
///
/// impl Class for Database {
///     fn construct(mut args: Args) -> Result<Self, BoxError> {
///         Ok(Database { config: args.next::<Config>()? })
///     }
/// }
/// ```
pub trait Class: Injectable + Sized {
    /// Build an instance from the resolved constructor arguments.
    fn construct(args: Args) -> Result<Self, BoxError>;
}

/// Lifecycle policy of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance for the lifetime of the container
    #[default]
    Singleton,

    /// New instance created on every resolve
    Transient,

    /// One instance per request id, until the request is cleared
    Request,
}

impl Scope {
    /// Label used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Singleton => "singleton",
            Scope::Transient => "transient",
            Scope::Request => "request",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The recipe registered for a token.
///
/// Definitions are immutable; registering another definition for the same
/// token replaces this one entirely.
///
/// # Examples
///
/// ```rust
/// use token_injector::{Container, ProviderDefinition, Scope, Token};
///
/// let container = Container::new();
/// container.register_provider(ProviderDefinition::value("greeting", String::from("hello")));
/// container.register_provider(
///     ProviderDefinition::factory("shout", [Token::name("greeting")], |mut args| {
///         Ok(args.next::<String>()?.to_uppercase())
///     })
///     .with_scope(Scope::Transient),
/// );
///
/// let shout = container.resolve::<String>(&Token::name("shout")).unwrap();
/// assert_eq!(shout.as_str(), "HELLO");
/// ```
#[derive(Clone)]
pub struct ProviderDefinition {
    token: Token,
    scope: Scope,
    construction: Construction,
}

impl ProviderDefinition {
    /// Provide a pre-built value.
    pub fn value<T: crate::Injectable>(token: impl Into<Token>, value: T) -> Self {
        Self::value_arc(token, Arc::new(value))
    }

    /// Provide an already shared value.
    pub fn value_arc(token: impl Into<Token>, value: Instance) -> Self {
        Self {
            token: token.into(),
            scope: Scope::Singleton,
            construction: Construction::Value(value),
        }
    }

    /// Provide `T`, built through its [`Class`] implementation.
    ///
    /// The token does not have to be `T`'s own class token, which is how an
    /// implementation is bound to a name or symbol.
    pub fn class<T: Class>(token: impl Into<Token>) -> Self {
        Self::class_ref(token, ClassRef::constructible::<T>())
    }

    /// Provide the class behind a class reference.
    pub fn class_ref(token: impl Into<Token>, class: ClassRef) -> Self {
        Self {
            token: token.into(),
            scope: Scope::Singleton,
            construction: Construction::Class(class),
        }
    }

    /// Provide the result of a factory function called with the resolved
    /// `dependencies`, in order.
    pub fn factory<T, F, I>(token: impl Into<Token>, dependencies: I, factory: F) -> Self
    where
        T: crate::Injectable,
        F: Fn(Args) -> Result<T, BoxError> + Send + Sync + 'static,
        I: IntoIterator,
        I::Item: Into<Token>,
    {
        Self {
            token: token.into(),
            scope: Scope::Singleton,
            construction: Construction::factory(
                dependencies.into_iter().map(Into::into).collect(),
                factory,
            ),
        }
    }

    /// Set the scope of this provider.
    #[inline]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Shorthand for `with_scope(Scope::Transient)`.
    #[inline]
    pub fn transient(self) -> Self {
        self.with_scope(Scope::Transient)
    }

    /// Shorthand for `with_scope(Scope::Request)`.
    #[inline]
    pub fn request_scoped(self) -> Self {
        self.with_scope(Scope::Request)
    }

    /// The token this definition is registered under
    #[inline]
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// The scope of this definition
    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Name of the construction strategy
    #[inline]
    pub fn strategy(&self) -> &'static str {
        self.construction.kind()
    }

    #[inline]
    pub(crate) fn construction(&self) -> &Construction {
        &self.construction
    }

    /// Implicit provider for a constructible class token that has no registration.
    pub(crate) fn implicit(token: &Token) -> Option<Self> {
        let class = token.as_class().filter(|class| class.is_constructible())?;
        Some(Self::class_ref(token.clone(), *class))
    }
}

impl std::fmt::Debug for ProviderDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDefinition")
            .field("token", &self.token)
            .field("scope", &self.scope)
            .field("strategy", &self.strategy())
            .finish()
    }
}
