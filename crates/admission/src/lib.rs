//! Request admission: API-key authentication followed by a sliding-window
//! rate limit, checked before anything reaches the trading service.

pub mod auth;
pub mod policy;
pub mod rate_limit;

pub use auth::{select_credential, Authenticator, API_KEY_HEADER, API_KEY_QUERY_PARAM, HEALTH_PATH};
pub use policy::AdmissionPolicy;
pub use rate_limit::{RateLimiter, GLOBAL_CLIENT_ID};

use hypergate_core::ConfigError;

/// Per-request admission failures. Terminal for the request, never fatal for
/// the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("Unauthorized - Invalid API Key")]
    Unauthorized,
    #[error("Rate limit exceeded")]
    RateLimited { identity: String },
}

/// The authenticator and rate limiter built from one validated policy.
#[derive(Clone)]
pub struct AdmissionControl {
    policy: AdmissionPolicy,
    authenticator: Authenticator,
    limiter: RateLimiter,
}

impl AdmissionControl {
    pub fn new(policy: AdmissionPolicy) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            authenticator: Authenticator::new(&policy),
            limiter: RateLimiter::new(&policy),
            policy,
        })
    }

    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_rejects_invalid_policy() {
        let result = AdmissionControl::new(AdmissionPolicy::new(true, "", 10));
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_control_shares_one_policy() {
        let control = AdmissionControl::new(AdmissionPolicy::new(true, "secret1", 2)).unwrap();
        assert!(control.authenticator().is_enforced());
        assert!(control.limiter().is_enabled());
        assert_eq!(control.limiter().quota(), 2);
        assert!(control.authenticator().admit("/mcp", Some("secret1")).is_ok());
    }

    #[test]
    fn test_error_messages_match_wire_payloads() {
        assert_eq!(
            AdmissionError::Unauthorized.to_string(),
            "Unauthorized - Invalid API Key"
        );
        assert_eq!(
            AdmissionError::RateLimited {
                identity: GLOBAL_CLIENT_ID.to_string()
            }
            .to_string(),
            "Rate limit exceeded"
        );
    }
}
