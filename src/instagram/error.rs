use thiserror::Error;

/// Errors returned by [`PlatformApi`](super::PlatformApi) calls.
///
/// Variants carry rendered messages so results can be cloned and scripted in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("verification required: {0}")]
    VerificationRequired(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Refused by the client's own request budget; nothing was sent
    #[error("request budget exhausted: {0}")]
    Throttled(String),

    /// Session expired or was revoked server side
    #[error("login required: {0}")]
    SessionInvalid(String),

    /// Response did not match the expected schema
    #[error("validation error: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

/// How the poll loop reacts to a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Schema trouble on the platform side; skip and retry after a short pause.
    TransientSkip,
    /// Anything else; the session is rebuilt before continuing.
    Relogin,
}

impl ApiError {
    pub fn classify(&self) -> FailureClass {
        if matches!(self, ApiError::Validation(_) | ApiError::Throttled(_)) {
            return FailureClass::TransientSkip;
        }
        let message = self.to_string().to_lowercase();
        if message.contains("validation error") || message.contains("clips_metadata") {
            FailureClass::TransientSkip
        } else {
            FailureClass::Relogin
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ApiError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ApiError::Validation(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Terminal outcomes of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("credentials rejected: {0}")]
    InvalidCredentials(String),

    #[error("verification required: {0}")]
    VerificationRequired(String),

    #[error("rate limited, try again later: {0}")]
    RateLimited(String),

    #[error("login failed: {0}")]
    Other(String),
}

impl From<ApiError> for LoginError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidCredentials(m) => LoginError::InvalidCredentials(m),
            ApiError::VerificationRequired(m) => LoginError::VerificationRequired(m),
            ApiError::RateLimited(m) | ApiError::Throttled(m) => LoginError::RateLimited(m),
            other => LoginError::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_variant_is_transient() {
        assert_eq!(
            ApiError::Validation("bad field".into()).classify(),
            FailureClass::TransientSkip
        );
    }

    #[test]
    fn test_message_markers_are_transient() {
        let err = ApiError::Other("1 Validation Error for Media".into());
        assert_eq!(err.classify(), FailureClass::TransientSkip);
        let err = ApiError::Other("clips_metadata.original_sound_info: field required".into());
        assert_eq!(err.classify(), FailureClass::TransientSkip);
    }

    #[test]
    fn test_local_throttle_never_triggers_relogin() {
        let err = ApiError::Throttled("budget".into());
        assert_eq!(err.classify(), FailureClass::TransientSkip);
        assert_eq!(LoginError::from(err), LoginError::RateLimited("budget".into()));
    }

    #[test]
    fn test_other_failures_need_relogin() {
        assert_eq!(ApiError::SessionInvalid("expired".into()).classify(), FailureClass::Relogin);
        assert_eq!(ApiError::Network("reset".into()).classify(), FailureClass::Relogin);
        let http = ApiError::Http {
            status: 500,
            message: "oops".into(),
        };
        assert_eq!(http.classify(), FailureClass::Relogin);
    }

    #[test]
    fn test_login_error_from_api_error() {
        assert_eq!(
            LoginError::from(ApiError::RateLimited("wait".into())),
            LoginError::RateLimited("wait".into())
        );
        assert!(matches!(
            LoginError::from(ApiError::Network("down".into())),
            LoginError::Other(_)
        ));
    }
}
