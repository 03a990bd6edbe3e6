#[macro_use]
mod macros;

pub mod config;
pub(crate) mod dispatcher;
pub mod error;
pub mod format;
pub mod level;
pub mod logger;
pub mod logging;
pub mod record;
pub mod registry;
pub mod rotation;
pub mod sink;

pub use config::Config;
pub use error::{LoggerError, Result};
pub use format::Format;
pub use level::Level;
pub use logger::{AsyncConfig, Logger, LoggerConfig, LoggerOptions};
pub use record::{FieldValue, Fields, LogRecord};
pub use registry::{
    configure, current, flush, global, initialize, set_level, set_target, shutdown, InitOptions,
    Registry,
};
pub use rotation::{Clock, ManualClock, SystemClock};
pub use sink::{Console, MemorySink, Target};

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// HTTP surface of the host process. Requests are traced through
/// `tower-http`, which lands in the log stream once [`logging::init`] ran.
pub fn create_router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn root() -> &'static str {
    concat!("chatlog host - v", env!("CARGO_PKG_VERSION"))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
