//! Tracing subscriber setup.
//!
//! Environment variables:
//!   LOG_FORMAT  - "json" or "text" (default: "text")
//!   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
//!   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
//!   RUST_LOG    - standard env filter (default: [`DEFAULT_FILTER`])

use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str =
    "etl_engine=info,etl_pipeline=info,etl_extract=info,etl_storage=info,etl_db=info";

/// Where and how to write logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub json: bool,
    pub file: Option<String>,
    pub ansi: Option<bool>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            json: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            file: lookup("LOG_FILE").filter(|p| !p.trim().is_empty()),
            ansi: lookup("LOG_ANSI").map(|v| v == "true" || v == "1"),
        }
    }
}

/// Directory and file-name prefix for the rolling appender.
fn split_log_path(path: &str) -> (PathBuf, String) {
    let path = Path::new(path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("etl-engine.log")
        .to_string();
    (dir, file_name)
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer.
pub fn init(settings: &LogSettings) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(path) = &settings.file {
        let (dir, file_name) = split_log_path(path);
        let file_appender = tracing_appender::rolling::daily(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if settings.json {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // No ANSI in files unless asked for
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(settings.ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if settings.json {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = settings.ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_settings() {
        let settings = LogSettings::from_lookup(lookup(&[]));
        assert_eq!(
            settings,
            LogSettings {
                json: false,
                file: None,
                ansi: None
            }
        );
    }

    #[test]
    fn test_json_file_settings() {
        let settings = LogSettings::from_lookup(lookup(&[
            ("LOG_FORMAT", "JSON"),
            ("LOG_FILE", "/var/log/etl/engine.log"),
            ("LOG_ANSI", "false"),
        ]));
        assert!(settings.json);
        assert_eq!(settings.file.as_deref(), Some("/var/log/etl/engine.log"));
        assert_eq!(settings.ansi, Some(false));
    }

    #[test]
    fn test_split_log_path() {
        assert_eq!(
            split_log_path("/var/log/etl/engine.log"),
            (PathBuf::from("/var/log/etl"), "engine.log".to_string())
        );
        assert_eq!(
            split_log_path("engine.log"),
            (PathBuf::from("."), "engine.log".to_string())
        );
    }
}
