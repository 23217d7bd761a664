use crate::policy::AdmissionPolicy;
use crate::AdmissionError;
use tracing::warn;

/// Path that is always reachable, regardless of credentials.
pub const HEALTH_PATH: &str = "/health";
/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Query parameter carrying the API key.
pub const API_KEY_QUERY_PARAM: &str = "api_key";

/// Decides whether an inbound request may proceed.
///
/// Stateless: every decision depends only on the request path, the supplied
/// credential, and the startup policy.
#[derive(Debug, Clone)]
pub struct Authenticator {
    enforce: bool,
    api_key: String,
}

impl Authenticator {
    pub fn new(policy: &AdmissionPolicy) -> Self {
        Self {
            enforce: policy.require_auth,
            api_key: policy.api_key.clone(),
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.enforce
    }

    /// Admit or reject a request for `path` carrying `credential`.
    pub fn admit(&self, path: &str, credential: Option<&str>) -> Result<(), AdmissionError> {
        if path == HEALTH_PATH || !self.enforce {
            return Ok(());
        }

        match credential {
            Some(supplied) if supplied == self.api_key => Ok(()),
            Some(_) => {
                warn!(path = %path, "Rejected request with invalid API key");
                Err(AdmissionError::Unauthorized)
            }
            None => {
                warn!(path = %path, "Rejected request without API key");
                Err(AdmissionError::Unauthorized)
            }
        }
    }
}

/// Pick the credential from the header, falling back to the query parameter.
pub fn select_credential<'a>(header: Option<&'a str>, query: Option<&'a str>) -> Option<&'a str> {
    header.or(query)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enforcing(key: &str) -> Authenticator {
        Authenticator::new(&AdmissionPolicy::new(true, key, 60))
    }

    #[test]
    fn test_health_path_always_admitted() {
        let auth = enforcing("secret1");
        assert!(auth.admit(HEALTH_PATH, None).is_ok());
        assert!(auth.admit(HEALTH_PATH, Some("wrong")).is_ok());
    }

    #[test]
    fn test_disabled_admits_everything() {
        let auth = Authenticator::new(&AdmissionPolicy::default());
        assert!(!auth.is_enforced());
        assert!(auth.admit("/mcp", None).is_ok());
        assert!(auth.admit("/mcp", Some("anything")).is_ok());
        assert!(auth.admit("/", Some("")).is_ok());
    }

    #[test]
    fn test_exact_match_required() {
        let auth = enforcing("secret1");
        assert!(auth.admit("/mcp", Some("secret1")).is_ok());
        assert!(matches!(
            auth.admit("/mcp", Some("wrong")),
            Err(AdmissionError::Unauthorized)
        ));
        assert!(auth.admit("/mcp", Some("secret1 ")).is_err());
        assert!(auth.admit("/mcp", Some("SECRET1")).is_err());
        assert!(auth.admit("/mcp", None).is_err());
    }

    #[test]
    fn test_health_prefix_is_not_bypassed() {
        let auth = enforcing("secret1");
        assert!(auth.admit("/health/details", None).is_err());
        assert!(auth.admit("/healthz", None).is_err());
    }

    #[test]
    fn test_header_preferred_over_query() {
        assert_eq!(select_credential(Some("h"), Some("q")), Some("h"));
        assert_eq!(select_credential(None, Some("q")), Some("q"));
        assert_eq!(select_credential(None, None), None);
    }
}
