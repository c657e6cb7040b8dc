// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod ingest;
pub mod keywords;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod sentiment;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::CrawlConfig;
pub use crate::error::{IngestError, Result};
pub use crate::orchestrator::{Orchestrator, RunReport};
pub use crate::registry::SourceRegistry;
pub use crate::store::{InMemoryStore, Store};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Our events use short targets (`ingest`, `orchestrator`, ...), not module paths.
pub const DEFAULT_LOG_FILTER: &str =
    "ingest=info,orchestrator=info,registry=info,keywords=info,sentiment=info,api=info,warn";

/// Install a tracing subscriber: `RUST_LOG` or `DEFAULT_LOG_FILTER`, compact
/// output by default, JSON lines with `LOG_FORMAT=json`. A no-op when a
/// subscriber is already installed (tests, hosted runtimes).
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
