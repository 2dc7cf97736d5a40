//! # Token Injector - Token-keyed Dependency Injection for Rust
//!
//! A dependency injection container that wires object graphs from providers
//! registered under tokens, with singleton, transient and per-request scopes
//! and cycle detection.
//!
//! ## Features
//!
//! - 🔑 **Tokens** - Register by type, by string name or by unique `Symbol`
//! - 🏗️ **Value, class and factory providers** - Pick how each token is built
//! - 🚀 **Zero-config classes** - Constructible types resolve without registration
//! - ♻️ **Scopes** - Singleton, transient and per-request lifetimes
//! - 🔁 **Cycle detection** - `A -> B -> A` fails fast with the full cycle
//! - 🧵 **Thread-safe** - Singletons are built at most once, even under races
//! - 📊 **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use token_injector::{Args, BoxError, Class, Container, Token};
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Database {
//!     config: Arc<Config>,
//! }
//!
//! impl Class for Database {
//!     fn construct(mut args: Args) -> Result<Self, BoxError> {
//!         Ok(Database { config: args.next::<Config>()? })
//!     }
//! }
//!
//! let container = Container::new();
//! container.register(Token::of::<Config>(), Config { url: "postgres://localhost".into() });
//! container.describe::<Database>([Token::of::<Config>()]);
//!
//! let db = container.get::<Database>().unwrap();
//! assert_eq!(db.config.url, "postgres://localhost");
//! ```
//!
//! ## Scopes
//!
//! ```rust
//! use std::sync::Arc;
//! use token_injector::{Container, ProviderDefinition, RequestId, Token};
//!
//! #[derive(Debug)]
//! struct RequestContext;
//!
//! let container = Container::new();
//! container.register_provider(
//!     ProviderDefinition::factory("ctx", Vec::<Token>::new(), |_| Ok(RequestContext))
//!         .request_scoped(),
//! );
//!
//! let token = Token::name("ctx");
//! let r1 = RequestId::new("r1");
//! let r2 = RequestId::new("r2");
//!
//! let a = container.resolve_in::<RequestContext>(&token, &r1).unwrap();
//! let b = container.resolve_in::<RequestContext>(&token, &r1).unwrap();
//! let c = container.resolve_in::<RequestContext>(&token, &r2).unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert!(!Arc::ptr_eq(&a, &c));
//!
//! // Request-scoped tokens need a request
//! assert!(container.resolve::<RequestContext>(&token).unwrap_err().is_request_scope());
//!
//! container.clear_request_scope(&r1);
//! ```

mod container;
mod descriptor;
mod error;
mod factory;
mod lock;
#[cfg(feature = "logging")]
pub mod logging;
mod provider;
mod resolver;
mod scope;
mod storage;
mod token;

pub use container::*;
pub use descriptor::*;
pub use error::*;
pub use factory::{Args, Instance};
pub use provider::*;
pub use scope::{RequestId, RequestScope};
pub use token::*;

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Args, BoxError, Class, Container, DiError, Injectable, ProviderDefinition, RequestId,
        Result, Scope, Symbol, Token,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::sync::{Barrier, mpsc};
    use std::time::Duration;

    #[derive(Debug)]
    struct Logger {
        id: u32,
    }

    #[derive(Debug)]
    struct Request {
        serial: u32,
    }

    impl Class for Request {
        fn construct(_args: Args) -> std::result::Result<Self, BoxError> {
            static SERIAL: AtomicU32 = AtomicU32::new(0);
            Ok(Request {
                serial: SERIAL.fetch_add(1, Ordering::SeqCst),
            })
        }
    }

    #[derive(Debug)]
    struct A;
    #[derive(Debug)]
    struct B;
    #[derive(Debug)]
    struct C;

    impl Class for A {
        fn construct(mut args: Args) -> std::result::Result<Self, BoxError> {
            args.next::<B>()?;
            Ok(A)
        }
    }

    impl Class for B {
        fn construct(mut args: Args) -> std::result::Result<Self, BoxError> {
            args.next::<A>()?;
            Ok(B)
        }
    }

    impl Class for C {
        fn construct(mut args: Args) -> std::result::Result<Self, BoxError> {
            args.next::<C>()?;
            Ok(C)
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl std::fmt::Display for Failing {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl std::error::Error for Failing {}

    #[test]
    fn test_singleton_value_identity() {
        let container = Container::create_test_instance();
        container.register(Token::of::<Logger>(), Logger { id: 1 });

        let a = container.resolve::<Logger>(&Token::of::<Logger>()).unwrap();
        let b = container.resolve::<Logger>(&Token::of::<Logger>()).unwrap();

        assert_eq!(a.id, 1);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_singleton_class_identity() {
        let container = Container::create_test_instance();
        container.register_class::<Request>(Scope::Singleton);

        let a = container.get::<Request>().unwrap();
        let b = container.get::<Request>().unwrap();
        let c = container
            .resolve_in::<Request>(&Token::class::<Request>(), &RequestId::new("r1"))
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_transient_freshness() {
        let container = Container::create_test_instance();
        container.register_class::<Request>(Scope::Transient);

        let a = container.get::<Request>().unwrap();
        let b = container.get::<Request>().unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.serial, b.serial);
    }

    #[test]
    fn test_request_isolation() {
        let container = Container::create_test_instance();
        container.register_class::<Request>(Scope::Request);
        let token = Token::class::<Request>();
        let r1 = RequestId::new("r1");
        let r2 = RequestId::new("r2");

        let first = container.resolve_in::<Request>(&token, &r1).unwrap();
        let again = container.resolve_in::<Request>(&token, &r1).unwrap();
        let other = container.resolve_in::<Request>(&token, &r2).unwrap();

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));

        let err = container.resolve::<Request>(&token).unwrap_err();
        assert!(err.is_request_scope());
    }

    #[test]
    fn test_clear_request_scope() {
        let container = Container::create_test_instance();
        container.register_class::<Request>(Scope::Request);
        let token = Token::class::<Request>();
        let r1 = RequestId::new("req-1");
        let r2 = RequestId::new("req-2");

        let before = container.resolve_in::<Request>(&token, &r1).unwrap();
        let untouched = container.resolve_in::<Request>(&token, &r2).unwrap();
        assert_eq!(container.active_requests(), 2);

        assert_eq!(container.clear_request_scope(&r1), 1);
        assert_eq!(container.clear_request_scope(&r1), 0);

        let after = container.resolve_in::<Request>(&token, &r1).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));

        let still = container.resolve_in::<Request>(&token, &r2).unwrap();
        assert!(Arc::ptr_eq(&untouched, &still));
    }

    #[test]
    fn test_cycle_detection() {
        let container = Container::create_test_instance();
        container.describe::<A>([Token::class::<B>()]);
        container.describe::<B>([Token::class::<A>()]);

        let err = container.get::<A>().unwrap_err();
        assert!(err.is_circular());
        assert_eq!(err.to_string(), "Circular dependency detected: A -> B -> A");
        assert_eq!(container.cached_singletons(), 0);

        // Resolving from the other end reports the cycle from there
        let err = container.get::<B>().unwrap_err();
        assert_eq!(err.to_string(), "Circular dependency detected: B -> A -> B");
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let container = Container::create_test_instance();
        container.describe::<C>([Token::class::<C>()]);

        let err = container.get::<C>().unwrap_err();
        assert_eq!(err.cycle().map(<[Token]>::len), Some(2));
    }

    #[test]
    fn test_cycle_through_named_factories() {
        let container = Container::create_test_instance();
        container.register_factory("a", Scope::Transient, ["b"], |_| Ok(1u8));
        container.register_factory("b", Scope::Singleton, ["c"], |_| Ok(2u8));
        container.register_factory("c", Scope::Request, ["a"], |_| Ok(3u8));

        let err = container
            .resolve_in::<u8>(&Token::name("a"), &RequestId::new("r"))
            .unwrap_err();
        assert_eq!(
            err.cycle().unwrap(),
            &[Token::name("a"), Token::name("b"), Token::name("c"), Token::name("a")]
        );
    }

    #[test]
    fn test_re_registration_invalidates_singleton() {
        let container = Container::create_test_instance();
        container.register(Token::of::<Logger>(), Logger { id: 1 });
        let old = container.resolve::<Logger>(&Token::of::<Logger>()).unwrap();

        container.register(Token::of::<Logger>(), Logger { id: 2 });
        let new = container.resolve::<Logger>(&Token::of::<Logger>()).unwrap();

        assert_eq!(old.id, 1);
        assert_eq!(new.id, 2);
        assert!(!Arc::ptr_eq(&old, &new));
    }

    #[test]
    fn test_re_registration_drops_built_singleton() {
        let container = Container::create_test_instance();
        container.register_factory("n", Scope::Singleton, Vec::<Token>::new(), |_| Ok(1u32));
        assert_eq!(*container.resolve::<u32>(&Token::name("n")).unwrap(), 1);
        assert_eq!(container.cached_singletons(), 1);

        container.register_factory("n", Scope::Singleton, Vec::<Token>::new(), |_| Ok(2u32));
        assert_eq!(container.cached_singletons(), 0);
        assert_eq!(*container.resolve::<u32>(&Token::name("n")).unwrap(), 2);
    }

    #[test]
    fn test_definition_replaced_during_construction_is_not_cached() {
        let container = Container::create_test_instance();
        let handle = container.clone();
        container.register_factory("n", Scope::Singleton, Vec::<Token>::new(), move |_| {
            handle.register("n", 99u32);
            Ok(1u32)
        });

        // The caller that started the build still gets what it built
        let first = container.resolve::<u32>(&Token::name("n")).unwrap();
        assert_eq!(*first, 1);
        assert_eq!(container.cached_singletons(), 0);

        let second = container.resolve::<u32>(&Token::name("n")).unwrap();
        assert_eq!(*second, 99);
    }

    #[test]
    fn test_implicit_class_dependency() {
        struct Service {
            request: Arc<Request>,
        }

        impl Class for Service {
            fn construct(mut args: Args) -> std::result::Result<Self, BoxError> {
                Ok(Service {
                    request: args.next::<Request>()?,
                })
            }
        }

        let container = Container::create_test_instance();
        container.describe::<Service>([Token::class::<Request>()]);

        let service = container.get::<Service>().unwrap();
        let request = container.get::<Request>().unwrap();

        // Both were built as implicit singletons
        assert!(Arc::ptr_eq(&service.request, &request));
        assert!(container.is_empty());
        assert_eq!(container.cached_singletons(), 2);
    }

    #[test]
    fn test_unregistered_name_and_symbol_fail() {
        let container = Container::create_test_instance();
        let symbol = Symbol::new("cache");

        let err = container.resolve::<u8>(&Token::name("missing")).unwrap_err();
        assert!(err.is_not_found());

        let err = container.resolve::<u8>(&Token::from(&symbol)).unwrap_err();
        assert!(err.is_not_found());

        // A plain type token has no constructor either
        let err = container.resolve::<Logger>(&Token::of::<Logger>()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unknown_parameter_only_fails_when_built() {
        let container = Container::create_test_instance();
        container.describe_partial::<A>([None]);

        // Registering a value for the class avoids the descriptor entirely
        container.register(Token::class::<A>(), A);
        assert!(container.get::<A>().is_ok());

        container.register_class::<A>(Scope::Singleton);
        let err = container.get::<A>().unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("unknown parameter 0"));
    }

    #[test]
    fn test_symbol_binds_class() {
        let container = Container::create_test_instance();
        let symbol = Symbol::new("current-request");
        container.register_provider(ProviderDefinition::class::<Request>(&symbol).transient());

        let a = container.resolve::<Request>(&Token::from(&symbol)).unwrap();
        let b = container.resolve::<Request>(&Token::from(&symbol)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_construction_error_propagates() {
        let container = Container::create_test_instance();
        container.register_factory("db", Scope::Singleton, Vec::<Token>::new(), |_| {
            Err::<u8, BoxError>(Box::new(Failing))
        });
        container.register_factory("repo", Scope::Singleton, ["db"], |_| Ok(0u8));

        let err = container.resolve::<u8>(&Token::name("repo")).unwrap_err();
        let source = err.construction_source().unwrap();
        assert!(source.downcast_ref::<Failing>().is_some());
        assert_eq!(err.to_string(), "Failed to construct db: connection refused");

        // Nothing half-built was cached, and a later resolve is not a false cycle
        assert_eq!(container.cached_singletons(), 0);
        let err = container.resolve::<u8>(&Token::name("repo")).unwrap_err();
        assert!(!err.is_circular());
    }

    #[test]
    fn test_factory_dependencies_in_order() {
        let container = Container::create_test_instance();
        container.register("first", String::from("a"));
        container.register("second", String::from("b"));
        container.register_factory(
            "joined",
            Scope::Transient,
            ["second", "first"],
            |mut args: Args| {
                let x = args.next::<String>()?;
                let y = args.next::<String>()?;
                Ok(format!("{x}{y}"))
            },
        );

        let joined = container.resolve::<String>(&Token::name("joined")).unwrap();
        assert_eq!(joined.as_str(), "ba");
    }

    #[test]
    fn test_request_scope_guard() {
        let container = Container::create_test_instance();
        container.register_class::<Request>(Scope::Request);

        {
            let request = container.request_scope("guarded");
            assert_eq!(request.id().as_str(), "guarded");
            request.resolve::<Request>(&Token::class::<Request>()).unwrap();
            assert_eq!(container.active_requests(), 1);
        }

        assert_eq!(container.active_requests(), 0);
    }

    #[test]
    fn test_request_scoped_depends_on_singleton() {
        struct Handler {
            logger: Arc<Logger>,
        }

        let container = Container::create_test_instance();
        container.register(Token::of::<Logger>(), Logger { id: 7 });
        container.register_factory(
            Token::of::<Handler>(),
            Scope::Request,
            [Token::of::<Logger>()],
            |mut args: Args| {
                Ok(Handler {
                    logger: args.next::<Logger>()?,
                })
            },
        );

        let token = Token::of::<Handler>();
        let h1 = container.resolve_in::<Handler>(&token, &RequestId::new("1")).unwrap();
        let h2 = container.resolve_in::<Handler>(&token, &RequestId::new("2")).unwrap();

        assert!(!Arc::ptr_eq(&h1, &h2));
        assert!(Arc::ptr_eq(&h1.logger, &h2.logger));
        assert_eq!(h1.logger.id, 7);
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        struct Slow;

        impl Class for Slow {
            fn construct(_args: Args) -> std::result::Result<Self, BoxError> {
                BUILT.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                Ok(Slow)
            }
        }

        let container = Container::create_test_instance();
        let resolved: Vec<Arc<Slow>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| container.get::<Slow>().unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert!(resolved.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_concurrent_requests_do_not_share_cycle_state() {
        let container = Container::create_test_instance();
        container.register_class::<Request>(Scope::Request);
        let token = Token::class::<Request>();

        std::thread::scope(|s| {
            for i in 0..4 {
                let container = &container;
                let token = &token;
                s.spawn(move || {
                    let id = RequestId::new(format!("req-{i}"));
                    for _ in 0..50 {
                        container.resolve_in::<Request>(token, &id).unwrap();
                    }
                    container.clear_request_scope(&id);
                });
            }
        });

        assert_eq!(container.active_requests(), 0);
    }

    /// Resolve `name` on its own thread so a hang fails the test instead
    fn spawn_resolve(container: &Container, name: &'static str) -> mpsc::Receiver<Result<u8>> {
        let (tx, rx) = mpsc::channel();
        let container = container.clone();
        std::thread::spawn(move || {
            let _ = tx.send(container.resolve::<u8>(&Token::name(name)).map(|value| *value));
        });
        rx
    }

    #[test]
    fn test_factory_may_resolve_on_another_thread() {
        let container = Container::create_test_instance();
        container.register_factory("b", Scope::Singleton, Vec::<Token>::new(), |_| Ok(2u8));

        let handle = container.clone();
        container.register_factory("a", Scope::Singleton, Vec::<Token>::new(), move |_| {
            let worker = handle.clone();
            let b = std::thread::spawn(move || worker.resolve::<u8>(&Token::name("b")))
                .join()
                .map_err(|_| "worker thread panicked")??;
            Ok(*b + 1)
        });

        let a = spawn_resolve(&container, "a").recv_timeout(Duration::from_secs(5));
        assert_eq!(a.expect("resolving a blocked on b").unwrap(), 3);
        assert_eq!(container.cached_singletons(), 2);
    }

    #[test]
    fn test_cycle_split_across_threads_is_reported() {
        let container = Container::create_test_instance();
        let barrier = Arc::new(Barrier::new(2));

        // Each gate holds its thread until both threads are inside their own singleton
        for (name, gate, dependency) in [("a", "a-gate", "b"), ("b", "b-gate", "a")] {
            let barrier = Arc::clone(&barrier);
            let first = AtomicBool::new(true);
            container.register_factory(gate, Scope::Transient, Vec::<Token>::new(), move |_| {
                if first.swap(false, Ordering::SeqCst) {
                    barrier.wait();
                }
                Ok(())
            });
            container.register_factory(name, Scope::Singleton, [gate, dependency], |_| Ok(0u8));
        }

        let a = spawn_resolve(&container, "a");
        let b = spawn_resolve(&container, "b");

        for rx in [a, b] {
            let err = rx
                .recv_timeout(Duration::from_secs(5))
                .expect("cross-thread cycle blocked")
                .unwrap_err();
            assert!(err.is_circular());
        }
        assert_eq!(container.cached_singletons(), 0);
    }

    #[test]
    fn test_global_instance_is_shared() {
        let symbol = Symbol::new("global-only");
        Container::global().register(&symbol, 5u8);

        assert!(Container::get_instance().contains(&Token::from(&symbol)));
        assert!(!Container::create_test_instance().contains(&Token::from(&symbol)));
    }

    #[test]
    fn test_custom_descriptor_provider() {
        struct Service {
            logger: Arc<Logger>,
        }

        impl Class for Service {
            fn construct(mut args: Args) -> std::result::Result<Self, BoxError> {
                Ok(Service {
                    logger: args.next::<Logger>()?,
                })
            }
        }

        let container = Container::with_descriptors(Arc::new(|class: &ClassRef| {
            if class.short_name() == "Service" {
                vec![Some(Token::name("logger"))]
            } else {
                Vec::new()
            }
        }));
        container.register("logger", Logger { id: 3 });

        assert_eq!(container.get::<Service>().unwrap().logger.id, 3);
    }
}
