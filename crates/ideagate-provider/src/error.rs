use reqwest::StatusCode;

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderErrorKind {
    RateLimit,
    ServerError,
    Timeout,
    AuthError,
    InvalidRequest,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::RateLimit,
            401 | 403 => Self::AuthError,
            400 | 422 => Self::InvalidRequest,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ServerError | Self::Timeout)
    }
}

/// Render a non-200 provider reply as an error string tagged with `[retryable]`
/// when a caller with its own backoff could reasonably try again.
pub(crate) fn format_api_error(
    vendor: &str,
    status: StatusCode,
    detail: Option<(String, String)>,
) -> anyhow::Error {
    let kind = ProviderErrorKind::from_status(status);
    let retryable = if kind.is_retryable() {
        " [retryable]"
    } else {
        ""
    };
    match detail {
        Some((message, kind)) => {
            anyhow::anyhow!("{vendor} api error ({status}){retryable}: {message} ({kind})")
        }
        None => anyhow::anyhow!("{vendor} api error ({status}){retryable}"),
    }
}

pub(crate) fn transport_error(vendor: &str, err: reqwest::Error, timeout_secs: u64) -> anyhow::Error {
    if err.is_timeout() {
        anyhow::anyhow!(
            "{vendor} api error (timeout) [retryable]: request timed out after {timeout_secs}s"
        )
    } else if err.is_connect() {
        anyhow::anyhow!("{vendor} api error (connect) [retryable]: {err}")
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_kind_classification() {
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS),
            ProviderErrorKind::RateLimit
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::INTERNAL_SERVER_ERROR),
            ProviderErrorKind::ServerError
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::FORBIDDEN),
            ProviderErrorKind::AuthError
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::UNPROCESSABLE_ENTITY),
            ProviderErrorKind::InvalidRequest
        );
        assert_eq!(
            ProviderErrorKind::from_status(StatusCode::NOT_FOUND),
            ProviderErrorKind::Unknown
        );
        assert!(ProviderErrorKind::Timeout.is_retryable());
        assert!(!ProviderErrorKind::AuthError.is_retryable());
    }

    #[test]
    fn format_api_error_with_detail() {
        let err = format_api_error(
            "anthropic",
            StatusCode::BAD_REQUEST,
            Some(("messages: required".into(), "invalid_request_error".into())),
        );
        let text = err.to_string();
        assert!(text.starts_with("anthropic api error (400"));
        assert!(text.contains("messages: required"));
        assert!(!text.contains("[retryable]"));
    }

    #[test]
    fn format_api_error_without_detail_is_retryable_for_5xx() {
        let err = format_api_error("openai", StatusCode::BAD_GATEWAY, None);
        let text = err.to_string();
        assert!(text.contains("502"));
        assert!(text.contains("[retryable]"));
    }
}
