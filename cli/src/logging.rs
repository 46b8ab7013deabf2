//! Tracing initialisation for the `ethwatch` binary.

use std::collections::HashMap;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Built from `--log-level`, `--log CRATE=LEVEL` and `--json-logs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    pub level: String,
    /// Per-crate overrides: crate name → level
    pub components: HashMap<String, String>,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// Filter directives, e.g. `"info,ethwatch_http=debug"`.
    ///
    /// `RUST_LOG` wins over the configured level when set.
    pub fn directives(&self) -> String {
        let mut directives = std::env::var("RUST_LOG").unwrap_or_else(|_| self.level.clone());
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_new(config.directives()).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_overrides_use_crate_names() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = LogConfig {
            level: "warn".into(),
            components: HashMap::from([
                ("ethwatch-http".to_string(), "debug".to_string()),
                ("ethwatch".to_string(), "info".to_string()),
            ]),
            json: false,
        };
        assert_eq!(config.directives(), "warn,ethwatch=info,ethwatch_http=debug");
    }
}
