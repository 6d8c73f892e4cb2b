use thiserror::Error;

pub const RATE_LIMIT_STATUS: u16 = 429;

#[derive(Debug, Error)]
pub enum FacetLensError {
    #[error("configuration invalid: {0}")]
    InvalidConfig(String),
    #[error("{}", provider_message(.status, .message))]
    Provider {
        status: Option<u16>,
        message: String,
    },
    #[error("facet cache unavailable: {0}")]
    CacheIo(String),
}

fn provider_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("provider call failed with status {code}: {message}"),
        None => format!("provider call failed: {message}"),
    }
}

impl FacetLensError {
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Status code reported by the provider, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        self.status() == Some(RATE_LIMIT_STATUS)
    }
}

impl From<reqwest::Error> for FacetLensError {
    fn from(err: reqwest::Error) -> Self {
        Self::Provider {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FacetLensError;

    #[test]
    fn rate_limit_is_detected_from_status() {
        assert!(FacetLensError::provider(Some(429), "slow down").is_rate_limit());
        assert!(!FacetLensError::provider(Some(503), "unavailable").is_rate_limit());
        assert!(!FacetLensError::provider(None, "connection reset").is_rate_limit());
    }

    #[test]
    fn provider_display_includes_status_when_present() {
        let err = FacetLensError::provider(Some(500), "boom");
        assert_eq!(err.to_string(), "provider call failed with status 500: boom");
        let err = FacetLensError::provider(None, "boom");
        assert_eq!(err.to_string(), "provider call failed: boom");
    }
}
