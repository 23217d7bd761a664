use hypergate_core::ConfigError;
use std::fmt;
use std::time::Duration;

pub const DEFAULT_RATE_LIMIT: u32 = 60;
pub const DEFAULT_WINDOW_SECS: u64 = 60;

/// Admission settings, fixed at startup.
#[derive(Clone)]
pub struct AdmissionPolicy {
    /// Whether API-key authentication and rate limiting are enforced.
    pub require_auth: bool,
    /// Shared secret callers must present.
    pub api_key: String,
    /// Maximum admitted requests per window.
    pub rate_limit: u32,
    /// Length of the trailing window.
    pub window: Duration,
}

impl fmt::Debug for AdmissionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionPolicy")
            .field("require_auth", &self.require_auth)
            .field("api_key", &"<redacted>")
            .field("rate_limit", &self.rate_limit)
            .field("window", &self.window)
            .finish()
    }
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            require_auth: false,
            api_key: String::new(),
            rate_limit: DEFAULT_RATE_LIMIT,
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
        }
    }
}

impl AdmissionPolicy {
    pub fn new(require_auth: bool, api_key: impl Into<String>, rate_limit: u32) -> Self {
        Self {
            require_auth,
            api_key: api_key.into(),
            rate_limit,
            ..Default::default()
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Reject policies that would silently run without enforcement.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.require_auth && self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.window.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "RATE_LIMIT_WINDOW_SECS".to_string(),
                message: "window must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// Human-readable limit, as reported by the health endpoint.
    pub fn rate_limit_description(&self) -> String {
        if !self.require_auth {
            return "unlimited".to_string();
        }
        if self.window == Duration::from_secs(60) {
            format!("{} requests per minute", self.rate_limit)
        } else {
            format!(
                "{} requests per {} seconds",
                self.rate_limit,
                self.window.as_secs()
            )
        }
    }

    /// How callers should authenticate, as reported by the root endpoint.
    pub fn auth_description(&self) -> &'static str {
        if self.require_auth {
            "Use X-API-Key header or api_key query parameter"
        } else {
            "No authentication required"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_environment_defaults() {
        let policy = AdmissionPolicy::default();
        assert!(!policy.require_auth);
        assert!(policy.api_key.is_empty());
        assert_eq!(policy.rate_limit, 60);
        assert_eq!(policy.window, Duration::from_secs(60));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_enforcement_without_key_is_rejected() {
        let policy = AdmissionPolicy::new(true, "", 60);
        assert!(matches!(policy.validate(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let policy = AdmissionPolicy::new(true, "k", 60).with_window(Duration::ZERO);
        assert!(matches!(
            policy.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_rate_limit_description() {
        assert_eq!(AdmissionPolicy::default().rate_limit_description(), "unlimited");
        assert_eq!(
            AdmissionPolicy::new(true, "k", 60).rate_limit_description(),
            "60 requests per minute"
        );
        assert_eq!(
            AdmissionPolicy::new(true, "k", 5)
                .with_window(Duration::from_secs(10))
                .rate_limit_description(),
            "5 requests per 10 seconds"
        );
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let policy = AdmissionPolicy::new(true, "secret1", 60);
        let debug = format!("{:?}", policy);
        assert!(!debug.contains("secret1"));
        assert!(policy.auth_description().contains("X-API-Key"));
    }
}
