use time::Duration;

/// Tunables for the session core. `Default` matches the production backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: String,
    /// How long a successful read is served from cache.
    pub cache_ttl: Duration,
    /// Refresh proactively once the access token has less than this left.
    pub refresh_threshold: Duration,
    /// Length of the voter-visible countdown.
    pub session_window: Duration,
    pub tick: Duration,
    pub health_check_interval: Duration,
    /// Total attempts for an idempotent read, including the first.
    pub max_read_attempts: u32,
    pub retry_base_delay: Duration,
    /// Below this the countdown is shown as a warning.
    pub expiring_threshold: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "/api".into(),
            cache_ttl: Duration::seconds(5),
            refresh_threshold: Duration::minutes(2),
            session_window: Duration::minutes(30),
            tick: Duration::seconds(1),
            health_check_interval: Duration::seconds(30),
            max_read_attempts: 3,
            retry_base_delay: Duration::seconds(1),
            expiring_threshold: Duration::minutes(5),
        }
    }
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self { api_base_url: api_base_url.into(), ..Self::default() }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    pub fn with_session_window(mut self, window: Duration) -> Self {
        self.session_window = window;
        self
    }

    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn with_read_retries(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_read_attempts = max_attempts.max(1);
        self.retry_base_delay = base_delay;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }

    /// Delay before retry number `attempt` (zero-based): base, 2x base, 4x base...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_base_delay * 2i32.saturating_pow(attempt)
    }
}
