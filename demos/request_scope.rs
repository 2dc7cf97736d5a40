//! Example wiring a small service graph with request-scoped state
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example request_scope --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example request_scope --features logging-pretty
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use token_injector::{
    Args, BoxError, Class, Container, ProviderDefinition, RequestId, Scope, Symbol, Token,
};

struct Database {
    url: String,
}

struct RequestContext {
    serial: u64,
}

struct UserService {
    db: Arc<Database>,
    ctx: Arc<RequestContext>,
}

impl Class for UserService {
    fn construct(mut args: Args) -> Result<Self, BoxError> {
        Ok(UserService {
            db: args.next::<Database>()?,
            ctx: args.next::<RequestContext>()?,
        })
    }
}

fn main() {
    #[cfg(feature = "logging")]
    token_injector::logging::init();

    println!("=== Token Injector Request Scope Demo ===\n");

    let container = Container::global();
    let current_request = Symbol::new("current-request");

    // Logs: "Registering provider"
    container.register(
        Token::of::<Database>(),
        Database {
            url: "postgres://localhost/app".into(),
        },
    );

    // A fresh context per request, keyed by a symbol
    static SERIAL: AtomicU64 = AtomicU64::new(1);
    container.register_factory(&current_request, Scope::Request, Vec::<Token>::new(), |_| {
        Ok(RequestContext {
            serial: SERIAL.fetch_add(1, Ordering::Relaxed),
        })
    });

    container.describe::<UserService>([Token::of::<Database>(), Token::from(&current_request)]);
    container.register_provider(
        ProviderDefinition::class::<UserService>(Token::class::<UserService>()).request_scoped(),
    );

    for _ in 0..2 {
        // Logs: "Entering request scope", then "Request scope cleared" on drop
        let request = container.request_scope(RequestId::generate());
        let users = request
            .resolve::<UserService>(&Token::class::<UserService>())
            .expect("user service should resolve");

        println!(
            "  [{}] db={} ctx={}",
            request.id(),
            users.db.url,
            users.ctx.serial
        );
    }

    // Logs: "Circular dependency detected" at debug
    container.register_factory("ping", Scope::Transient, ["pong"], |_| Ok(()));
    container.register_factory("pong", Scope::Transient, ["ping"], |_| Ok(()));
    match container.resolve::<()>(&Token::name("ping")) {
        Ok(_) => println!("  unexpected success"),
        Err(err) => println!("  {err}"),
    }

    println!("\n=== Demo Complete ===");
}
