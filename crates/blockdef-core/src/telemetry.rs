//! Log output for blockdef binaries.
//!
//! The filter comes from `BLOCKDEF_LOG`, then `RUST_LOG`. Without either,
//! only the blockdef crates log at the requested level and everything else
//! stays at `warn`. Lines go to stderr; stdout is reserved for command output.

use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable checked before `RUST_LOG`.
pub const LOG_ENV: &str = "BLOCKDEF_LOG";

const BLOCKDEF_TARGETS: [&str; 3] = ["blockdef", "blockdef_core", "blockdef_client"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    /// Newline-delimited JSON, one object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Filter directives used when no environment filter is set.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(BLOCKDEF_TARGETS.iter().map(|target| format!("{target}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install the global subscriber. Only the first call in a process wins.
pub fn init_tracing(format: LogFormat, level: Level) {
    let json = format == LogFormat::Json;
    let text_layer = (!json).then(|| fmt::layer().with_writer(std::io::stderr));
    let json_layer = json.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
    });

    let installed = tracing_subscriber::registry()
        .with(env_filter(level))
        .with(text_layer)
        .with(json_layer)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(?format, "tracing initialised");
    }
}
