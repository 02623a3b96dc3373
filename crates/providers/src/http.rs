use relay_core::llm::BackendError;
use reqwest::StatusCode;
use std::time::Duration;

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn map_reqwest_err(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(e.to_string())
    } else if e.is_request() || e.is_connect() {
        BackendError::Network(e.to_string())
    } else {
        BackendError::Other(e.to_string())
    }
}

pub(crate) fn map_status_err(status: StatusCode, body: Option<String>) -> BackendError {
    let s = format!("{} {}", status.as_u16(), body.unwrap_or_default());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::Auth(s),
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimit(s),
        StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => BackendError::Network(s),
        StatusCode::NOT_FOUND => BackendError::Protocol(s),
        _ => BackendError::Other(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_auth() {
        assert!(matches!(
            map_status_err(StatusCode::UNAUTHORIZED, Some("no key".into())),
            BackendError::Auth(_)
        ));
        assert!(matches!(
            map_status_err(StatusCode::FORBIDDEN, None),
            BackendError::Auth(_)
        ));
    }

    #[test]
    fn server_side_statuses_map_to_network() {
        assert!(matches!(
            map_status_err(StatusCode::BAD_GATEWAY, None),
            BackendError::Network(_)
        ));
    }

    #[test]
    fn status_text_carries_code_and_body() {
        match map_status_err(StatusCode::TOO_MANY_REQUESTS, Some("slow down".into())) {
            BackendError::RateLimit(s) => assert_eq!(s, "429 slow down"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
