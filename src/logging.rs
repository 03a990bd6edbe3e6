// Tracing integration.
//
// The rest of the service (axum, tower-http, our own handlers) logs through
// `tracing` macros. `init` installs a global subscriber whose only output
// layer is `LogBridge`, which forwards every event into a `Registry`, so all
// of it ends up in the same console/file stream with the same threshold,
// format and rotation.
//
// The filter comes from `RUST_LOG` (defaults to `info`, quieting noisy
// dependencies). It runs before the registry's own threshold.

use std::fmt::Write as _;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

use crate::level::Level;
use crate::record::{Fields, FieldValue};
use crate::registry::Registry;

pub const DEFAULT_FILTER: &str = "info,hyper=warn,tower=warn,h2=warn";

/// Forwards `tracing` events into a [`Registry`].
pub struct LogBridge {
    registry: &'static Registry,
}

impl LogBridge {
    pub fn new(registry: &'static Registry) -> Self {
        Self { registry }
    }
}

pub fn level_of(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Info,
        tracing::Level::DEBUG | tracing::Level::TRACE => Level::Debug,
    }
}

impl<S: Subscriber> Layer<S> for LogBridge {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = level_of(metadata.level());
        if !self.registry.enabled(level) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let caller = match (metadata.file(), metadata.line()) {
            (Some(file), Some(line)) => {
                let file = file.rsplit(['/', '\\']).next().unwrap_or(file);
                Some(format!("{file}:{line}"))
            }
            _ => None,
        };
        let fields = (!visitor.fields.is_empty()).then_some(visitor.fields);
        self.registry
            .log_message(level, visitor.message, caller, fields);
    }
}

#[derive(Default)]
struct EventVisitor {
    message: String,
    fields: Fields,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.fields.insert(field.name(), value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name(), value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name(), value);
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name(), value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name(), value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            self.fields
                .insert(field.name(), FieldValue::Str(format!("{value:?}")));
        }
    }
}

/// Install the global tracing subscriber, routing every event into `registry`.
///
/// Fails if a global subscriber has already been set.
pub fn init(registry: &'static Registry) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(LogBridge::new(registry))
        .try_init()
}
