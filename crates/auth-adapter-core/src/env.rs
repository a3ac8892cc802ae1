// Run-mode detection and tracing bootstrap.

use std::sync::OnceLock;

/// Cached run mode.
static ENV_MODE: OnceLock<EnvMode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Production,
    Development,
    Test,
}

impl EnvMode {
    /// Parse a run-mode string; anything unrecognised means development.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" | "testing" => Self::Test,
            _ => Self::Development,
        }
    }

    /// Filter directive used when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> &'static str {
        match self {
            Self::Production => "auth_adapter=info",
            Self::Development | Self::Test => "auth_adapter=debug",
        }
    }
}

/// Detect the run mode from `AUTH_ADAPTER_ENV`, falling back to `RUST_ENV`.
pub fn detect_env_mode() -> EnvMode {
    *ENV_MODE.get_or_init(|| {
        let value = std::env::var("AUTH_ADAPTER_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        EnvMode::parse(&value)
    })
}

/// Install a `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the filter depends on the run mode.
/// Calling this twice is harmless: the second install is ignored.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(detect_env_mode().default_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_mode() {
        assert_eq!(EnvMode::parse("production"), EnvMode::Production);
        assert_eq!(EnvMode::parse(" PROD "), EnvMode::Production);
        assert_eq!(EnvMode::parse("testing"), EnvMode::Test);
        assert_eq!(EnvMode::parse(""), EnvMode::Development);
        assert_eq!(EnvMode::parse("staging"), EnvMode::Development);
    }

    #[test]
    fn test_default_filters() {
        assert_eq!(EnvMode::Production.default_filter(), "auth_adapter=info");
        assert_eq!(EnvMode::Test.default_filter(), "auth_adapter=debug");
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
