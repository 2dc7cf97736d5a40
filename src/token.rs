//! Tokens identifying dependencies
//!
//! A token is the key under which a provider is registered and resolved.
//! Three kinds exist:
//!
//! - **Class** - a Rust type, identified by its `TypeId`. Class tokens created
//!   with [`Token::class`] carry a constructor and can be resolved without any
//!   registration.
//! - **Name** - a string key.
//! - **Symbol** - a unique key minted by [`Symbol::new`]; two symbols never
//!   collide, even with the same description.

use crate::factory::ConstructFn;
use crate::{Class, Injectable};
use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A reference to a Rust type used as a class token.
///
/// Equality and hashing only consider the `TypeId`, so a constructible and a
/// non-constructible reference to the same type are the same token.
#[derive(Clone, Copy)]
pub struct ClassRef {
    type_id: TypeId,
    type_name: &'static str,
    constructor: Option<ConstructFn>,
}

impl ClassRef {
    /// Reference a type without a constructor.
    ///
    /// Such a token must be registered explicitly before it can be resolved.
    #[inline]
    pub fn of<T: Injectable>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            constructor: None,
        }
    }

    /// Reference a constructible type.
    #[inline]
    pub fn constructible<T: Class>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            constructor: Some(crate::factory::construct_class::<T>),
        }
    }

    /// The `TypeId` of the referenced type
    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The full type name, for diagnostics
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The type name without its module path
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }

    /// Whether the container can build this type on its own
    #[inline]
    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }

    #[inline]
    pub(crate) fn constructor(&self) -> Option<ConstructFn> {
        self.constructor
    }
}

impl PartialEq for ClassRef {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRef")
            .field("type_name", &self.type_name)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    // Generic names keep their path; trimming inside `<...>` is not worth it
    if full.contains('<') {
        return full;
    }
    full.rsplit("::").next().unwrap_or(full)
}

/// A unique token minted at runtime.
///
/// # Examples
///
/// ```rust
/// use token_injector::Symbol;
///
/// let a = Symbol::new("cache");
/// let b = Symbol::new("cache");
/// assert_ne!(a, b);
/// assert_eq!(a.description(), "cache");
/// ```
#[derive(Clone)]
pub struct Symbol {
    id: u64,
    description: Arc<str>,
}

impl Symbol {
    /// Mint a new symbol with a description used in diagnostics.
    pub fn new(description: impl Into<Arc<str>>) -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self {
            id: COUNTER.fetch_add(1, Ordering::Relaxed),
            description: description.into(),
        }
    }

    /// The raw id value.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The description given at creation.
    #[inline]
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl PartialEq for Symbol {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol#{}({})", self.id, self.description)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.description)
    }
}

/// Key identifying a dependency in the container.
///
/// # Examples
///
/// ```rust
/// use token_injector::{Symbol, Token};
///
/// #[derive(Clone)]
/// struct Config;
///
/// let by_type = Token::of::<Config>();
/// let by_name = Token::name("config");
/// let by_symbol = Token::from(Symbol::new("config"));
///
/// assert_eq!(by_type, Token::of::<Config>());
/// assert_eq!(by_name, Token::from("config"));
/// assert_ne!(by_symbol, Token::from(Symbol::new("config")));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A Rust type
    Class(ClassRef),
    /// A string key
    Name(Arc<str>),
    /// A unique runtime key
    Symbol(Symbol),
}

impl Token {
    /// Token for a type that must be registered explicitly.
    #[inline]
    pub fn of<T: Injectable>() -> Self {
        Token::Class(ClassRef::of::<T>())
    }

    /// Token for a constructible type.
    ///
    /// Resolving it without a registration builds the type as an implicit
    /// singleton.
    #[inline]
    pub fn class<T: Class>() -> Self {
        Token::Class(ClassRef::constructible::<T>())
    }

    /// Token for a string key.
    #[inline]
    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Token::Name(name.into())
    }

    /// The class reference, if this is a class token
    #[inline]
    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Token::Class(class) => Some(class),
            _ => None,
        }
    }

    /// Whether the container can build this token without a registration
    #[inline]
    pub fn is_constructible(&self) -> bool {
        self.as_class().is_some_and(ClassRef::is_constructible)
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Token::Class(_) => "class",
            Token::Name(_) => "name",
            Token::Symbol(_) => "symbol",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Class(class) => f.write_str(class.short_name()),
            Token::Name(name) => f.write_str(name),
            Token::Symbol(symbol) => fmt::Display::fmt(symbol, f),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Class(class) => write!(f, "Class({})", class.type_name()),
            Token::Name(name) => write!(f, "Name({name:?})"),
            Token::Symbol(symbol) => fmt::Debug::fmt(symbol, f),
        }
    }
}

impl From<&str> for Token {
    fn from(name: &str) -> Self {
        Token::Name(Arc::from(name))
    }
}

impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::Name(Arc::from(name))
    }
}

impl From<Symbol> for Token {
    fn from(symbol: Symbol) -> Self {
        Token::Symbol(symbol)
    }
}

impl From<&Symbol> for Token {
    fn from(symbol: &Symbol) -> Self {
        Token::Symbol(symbol.clone())
    }
}

impl From<ClassRef> for Token {
    fn from(class: ClassRef) -> Self {
        Token::Class(class)
    }
}

impl From<&Token> for Token {
    fn from(token: &Token) -> Self {
        token.clone()
    }
}
