use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::SecurityConfig;

pub const CSRF_HEADER: &str = "x-csrf-token";

const HSTS: &str = "max-age=31536000; includeSubDomains";
const PREFLIGHT_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const PREFLIGHT_HEADERS: &str = "authorization, content-type, x-csrf-token";

/// Baseline protective headers, applied to every response including errors
pub fn apply_security_headers(headers: &mut HeaderMap, security: &SecurityConfig) {
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("strict-origin-when-cross-origin"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

    match HeaderValue::from_str(&security.content_security_policy) {
        Ok(csp) => {
            headers.insert(header::CONTENT_SECURITY_POLICY, csp);
        }
        Err(e) => tracing::warn!("Configured Content-Security-Policy is not a valid header value: {}", e),
    }

    if security.require_https {
        headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    }
}

/// Same-origin requests always pass; cross-origin ones must be listed exactly.
pub fn origin_allowed(origin: &str, host: Option<&str>, allowed: &[String]) -> bool {
    if allowed.iter().any(|candidate| candidate == origin) {
        return true;
    }

    let Some(host) = host else {
        return false;
    };
    match url::Url::parse(origin) {
        Ok(url) => {
            let authority = match (url.host_str(), url.port()) {
                (Some(h), Some(port)) => format!("{}:{}", h, port),
                (Some(h), None) => h.to_string(),
                (None, _) => return false,
            };
            authority.eq_ignore_ascii_case(host)
        }
        Err(_) => false,
    }
}

/// Echo an accepted origin. Preflight responses also advertise methods and headers.
pub fn apply_cors_headers(headers: &mut HeaderMap, origin: &str, preflight: bool) {
    let Ok(value) = HeaderValue::from_str(origin) else {
        return;
    };
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    headers.append(header::VARY, HeaderValue::from_static("Origin"));

    if preflight {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(PREFLIGHT_METHODS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(PREFLIGHT_HEADERS));
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
    }
}

pub fn header_str<'a>(headers: &'a HeaderMap, name: impl AsRef<str>) -> Option<&'a str> {
    headers
        .get(HeaderName::from_bytes(name.as_ref().as_bytes()).ok()?)
        .and_then(|v| v.to_str().ok())
}
