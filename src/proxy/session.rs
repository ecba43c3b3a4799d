//! Session resolution: the `x-moltguard-session` header, validated as a
//! UUID-v4, or a fallback to the gateway's shared session created once at
//! startup. Invalid or missing headers silently fall back — the header is
//! a convenience, not an auth boundary: an invalid header silently falls
//! back to the shared session rather than erroring.

use axum::http::HeaderMap;
use uuid::Uuid;

pub const SESSION_HEADER: &str = "x-moltguard-session";

/// Resolve the session a request belongs to: the header value if and only
/// if it parses as a UUID and carries the v4 (random) variant bit pattern,
/// otherwise `shared_session_id`.
pub fn resolve_session_id(headers: &HeaderMap, shared_session_id: Uuid) -> Uuid {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .filter(|id| id.get_version_num() == 4)
        .unwrap_or(shared_session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn valid_v4_header_is_used() {
        let shared = Uuid::new_v4();
        let requested = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_str(&requested.to_string()).unwrap());
        assert_eq!(resolve_session_id(&headers, shared), requested);
    }

    #[test]
    fn missing_header_falls_back_to_shared() {
        let shared = Uuid::new_v4();
        let headers = HeaderMap::new();
        assert_eq!(resolve_session_id(&headers, shared), shared);
    }

    #[test]
    fn non_uuid_header_falls_back_to_shared() {
        let shared = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_str("not-a-uuid").unwrap());
        assert_eq!(resolve_session_id(&headers, shared), shared);
    }

    #[test]
    fn non_v4_uuid_falls_back_to_shared() {
        let shared = Uuid::new_v4();
        // A nil UUID is version 0, not 4.
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_str(&Uuid::nil().to_string()).unwrap());
        assert_eq!(resolve_session_id(&headers, shared), shared);
    }
}
