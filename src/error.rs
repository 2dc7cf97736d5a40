//! Error types for dependency resolution

use crate::Token;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by class constructors and factory functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while resolving a token
#[derive(Error, Debug, Clone)]
pub enum DiError {
    /// A token was re-entered while it was still under construction
    #[error("Circular dependency detected: {}", render_cycle(.cycle))]
    CircularDependency { cycle: Vec<Token> },

    /// No provider is registered for a non-constructible token.
    ///
    /// With `parameter` set, `token` is the class whose constructor parameter
    /// at that position has no known type.
    #[error("{}", render_not_found(.token, .parameter))]
    ProviderNotFound {
        token: Token,
        parameter: Option<usize>,
    },

    /// A request-scoped provider was resolved without a request id
    #[error("Request-scoped provider {token} resolved outside of a request context")]
    RequestScope { token: Token },

    /// The resolved instance is not of the requested type
    #[error("Provider for {token} does not produce {expected}")]
    TypeMismatch {
        token: Token,
        expected: &'static str,
    },

    /// A constructor asked for an argument that was not injected as declared
    #[error("Argument {position} of {owner} is not a {expected}")]
    ArgumentMismatch {
        owner: String,
        position: usize,
        expected: &'static str,
    },

    /// A constructor or factory failed; the original error is kept as `source`
    #[error("Failed to construct {token}: {source}")]
    Construction {
        token: Token,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },
}

fn render_not_found(token: &Token, parameter: &Option<usize>) -> String {
    match parameter {
        Some(position) => {
            format!("No provider registered for unknown parameter {position} of {token}")
        }
        None => format!("No provider registered for {token}"),
    }
}

fn render_cycle(cycle: &[Token]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl DiError {
    /// Create a ProviderNotFound error for a token
    #[inline]
    pub fn not_found(token: &Token) -> Self {
        Self::ProviderNotFound {
            token: token.clone(),
            parameter: None,
        }
    }

    /// Create a ProviderNotFound error for a parameter the descriptor could not type
    #[inline]
    pub fn unknown_parameter(owner: &Token, position: usize) -> Self {
        Self::ProviderNotFound {
            token: owner.clone(),
            parameter: Some(position),
        }
    }

    /// Create a CircularDependency error from the re-entered part of the path
    #[inline]
    pub fn circular(cycle: Vec<Token>) -> Self {
        Self::CircularDependency { cycle }
    }

    /// Create a RequestScope error
    #[inline]
    pub fn request_scope(token: &Token) -> Self {
        Self::RequestScope {
            token: token.clone(),
        }
    }

    /// Create a TypeMismatch error
    #[inline]
    pub fn type_mismatch<T: 'static>(token: &Token) -> Self {
        Self::TypeMismatch {
            token: token.clone(),
            expected: std::any::type_name::<T>(),
        }
    }

    /// Turn a constructor failure into a resolution error.
    ///
    /// A `DiError` raised inside a constructor (for example by `Args::next`)
    /// passes through untouched.
    pub fn from_construction(token: &Token, error: BoxError) -> Self {
        match error.downcast::<DiError>() {
            Ok(inner) => *inner,
            Err(source) => Self::Construction {
                token: token.clone(),
                source: Arc::from(source),
            },
        }
    }

    /// The cycle carried by a `CircularDependency` error
    pub fn cycle(&self) -> Option<&[Token]> {
        match self {
            Self::CircularDependency { cycle } => Some(cycle),
            _ => None,
        }
    }

    /// The token a `ProviderNotFound`, `RequestScope`, `TypeMismatch` or
    /// `Construction` error is about
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::ProviderNotFound { token, .. }
            | Self::RequestScope { token }
            | Self::TypeMismatch { token, .. }
            | Self::Construction { token, .. } => Some(token),
            Self::CircularDependency { .. } | Self::ArgumentMismatch { .. } => None,
        }
    }

    /// The error a constructor or factory failed with, as it was returned
    pub fn construction_source(
        &self,
    ) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Construction { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }

    /// Whether this is a `CircularDependency` error
    #[inline]
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    /// Whether this is a `ProviderNotFound` error
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ProviderNotFound { .. })
    }

    /// Whether this is a `RequestScope` error
    #[inline]
    pub fn is_request_scope(&self) -> bool {
        matches!(self, Self::RequestScope { .. })
    }
}

/// Result type alias for DI operations
pub type Result<T> = std::result::Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn test_cycle_message() {
        let err = DiError::circular(vec![
            Token::name("A"),
            Token::name("B"),
            Token::name("A"),
        ]);
        assert_eq!(err.to_string(), "Circular dependency detected: A -> B -> A");
        assert_eq!(err.cycle().map(<[Token]>::len), Some(3));
    }

    #[test]
    fn test_not_found_names_token() {
        let symbol = Symbol::new("cache");
        let err = DiError::not_found(&Token::from(&symbol));
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "No provider registered for Symbol(cache)");
        assert!(matches!(
            &err,
            DiError::ProviderNotFound { token, parameter: None } if *token == Token::from(&symbol)
        ));
    }

    #[test]
    fn test_unknown_parameter_names_owner() {
        let owner = Token::name("Service");
        let err = DiError::unknown_parameter(&owner, 1);

        assert!(err.is_not_found());
        assert_eq!(err.token(), Some(&owner));
        assert!(matches!(err, DiError::ProviderNotFound { parameter: Some(1), .. }));
        assert_eq!(
            err.to_string(),
            "No provider registered for unknown parameter 1 of Service"
        );
    }

    #[test]
    fn test_construction_keeps_foreign_source() {
        let token = Token::name("db");
        let err = DiError::from_construction(&token, Box::new(Boom));

        assert!(std::error::Error::source(&err).is_some());
        let source = err.construction_source().unwrap();
        assert!(source.downcast_ref::<Boom>().is_some());
    }

    #[test]
    fn test_construction_passes_di_errors_through() {
        let token = Token::name("db");
        let inner = DiError::not_found(&Token::name("config"));
        let err = DiError::from_construction(&token, Box::new(inner));

        assert!(err.is_not_found());
        assert!(err.to_string().contains("config"));
    }
}
