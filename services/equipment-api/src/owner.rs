use axum::http::HeaderMap;
use equipment_core::Owner;

/// Set by the authenticating reverse proxy in front of the service.
pub const HEADER_REMOTE_USER: &str = "x-remote-user";
pub const HEADER_REMOTE_NAME: &str = "x-remote-name";

/// Caller identity, or the configured demo owner when the request carries none.
pub fn resolve_owner(headers: &HeaderMap, demo_owner: &str) -> Owner {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    match header(HEADER_REMOTE_USER) {
        Some(id) => {
            let display_name = header(HEADER_REMOTE_NAME).unwrap_or_else(|| id.clone());
            Owner::new(id, display_name)
        }
        None => Owner::named(demo_owner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn falls_back_to_demo() {
        let owner = resolve_owner(&HeaderMap::new(), "demo");
        assert_eq!(owner, Owner::named("demo"));
    }

    #[test]
    fn blank_header_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_REMOTE_USER, HeaderValue::from_static("  "));
        assert_eq!(resolve_owner(&headers, "demo").id, "demo");
    }

    #[test]
    fn uses_forwarded_identity_and_name() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_REMOTE_USER, HeaderValue::from_static("u-42"));
        headers.insert(HEADER_REMOTE_NAME, HeaderValue::from_static("Grace"));
        assert_eq!(resolve_owner(&headers, "demo"), Owner::new("u-42", "Grace"));

        headers.remove(HEADER_REMOTE_NAME);
        assert_eq!(resolve_owner(&headers, "demo"), Owner::named("u-42"));
    }
}
