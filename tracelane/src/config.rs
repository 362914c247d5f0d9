//! Executor configuration.

/// Environment variable overriding the lane count.
pub const MAX_CONCURRENT_ENV: &str = "TRACELANE_MAX_CONCURRENT";

/// Lane count used when nothing else is configured.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Number of lanes. 0 is accepted but nothing will ever run.
    pub max_concurrent: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl ExecutorConfig {
    pub fn new(max_concurrent: usize) -> Self {
        Self { max_concurrent }
    }

    /// Read `TRACELANE_MAX_CONCURRENT`, falling back to the default.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(MAX_CONCURRENT_ENV).ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Self {
        let Some(raw) = value else {
            return Self::default();
        };

        match raw.trim().parse::<usize>() {
            Ok(max_concurrent) => Self { max_concurrent },
            Err(e) => {
                tracing::warn!(
                    value = %raw,
                    error = %e,
                    default = DEFAULT_MAX_CONCURRENT,
                    "Invalid {MAX_CONCURRENT_ENV}, using default"
                );
                Self::default()
            }
        }
    }
}
