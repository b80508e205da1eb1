//! Structured logging for sq-core.
//!
//! Everything goes to stderr through `tracing`; stdout carries only the JSON
//! payload of the command. Human output is for terminals, JSON lines for
//! scripted runs that collect stderr.

pub mod config;
pub mod events;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, LogContext, Stage};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn output_layer(config: &LogConfig) -> BoxedLayer {
    match config.format {
        LogFormat::Jsonl => fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .with_span_list(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Human => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            }
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, replaces the level from `config`. Later calls are
/// ignored once a subscriber is installed.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sq_core={}", config.level)));

    let _ = tracing_subscriber::registry()
        .with(output_layer(config))
        .with(filter)
        .try_init();
}

/// Fresh identifier for one invocation, e.g. `run-3f9c0a1b2d4e`.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &uuid[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_short_and_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert!(a.starts_with("run-"));
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn context_carries_session() {
        let ctx = LogContext::new("run-123").with_session_id("sq-20260115-143022-abcd");
        assert_eq!(ctx.run_id, "run-123");
        assert_eq!(ctx.session_id.as_deref(), Some("sq-20260115-143022-abcd"));
    }

    #[test]
    fn stages_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Stage::Search).unwrap(), "\"search\"");
        assert_eq!(Stage::Session.to_string(), "session");
    }

    #[test]
    fn second_init_is_ignored() {
        let quiet = LogConfig {
            level: LogLevel::Off,
            ..LogConfig::default()
        };
        init_logging(&quiet);
        init_logging(&LogConfig {
            format: LogFormat::Jsonl,
            timestamps: false,
            ..LogConfig::default()
        });
    }
}
