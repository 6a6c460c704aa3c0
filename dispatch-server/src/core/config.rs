/// Server configuration
///
/// All settings can be overridden through environment variables:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | WORK_DIR | /var/lib/dispatch | Working directory (database, logs) |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | development / staging / production |
/// | AUDIT_RETRY_BUFFER | 1024 | Audit retry channel capacity |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | Graceful shutdown timeout (ms) |
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory; the lifecycle database lives here
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,
    /// Capacity of the audit retry channel
    pub audit_retry_buffer: usize,
    /// Graceful shutdown timeout (milliseconds)
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/dispatch".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            audit_retry_buffer: std::env::var("AUDIT_RETRY_BUFFER")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1024),
            shutdown_timeout_ms: std::env::var("SHUTDOWN_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
        }
    }

    /// Override the work directory and port, keeping everything else
    /// from the environment. Used in tests.
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_overrides() {
        let config = Config::with_overrides("/tmp/dispatch-test", 0);
        assert_eq!(config.work_dir, "/tmp/dispatch-test");
        assert_eq!(config.http_port, 0);
        assert!(!config.is_production());
    }
}
