use std::collections::HashMap;
use std::sync::OnceLock;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use regex::Regex;

use lifelog_core::auth::ApiKey;

/// Synthetic header the router injects so the session actor never has to
/// re-parse the original URL.
pub const API_KEY_HEADER: &str = "x-lifelog-api-key";

/// Query parameter accepted on the legacy connect form.
pub const API_KEY_QUERY: &str = "api_key";

/// Where a resolved key came from. Only path keys are shape-validated;
/// the rest are opaque strings the upstream rejects on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource {
    Path,
    Query,
    Header,
    Bearer,
}

fn uuid_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("uuid pattern is valid")
    })
}

/// Whether a candidate path key has the canonical UUID shape.
pub fn is_uuid_key(candidate: &str) -> bool {
    uuid_pattern().is_match(candidate)
}

/// Extract a UUID-shaped key from a `/{key}/sse` or `/{key}/mcp` path.
/// Non-UUID first segments are not keys (they are just unmatched paths).
pub fn path_key(path: &str) -> Option<&str> {
    let mut segments = path.trim_matches('/').split('/');
    let key = segments.next()?;
    let suffix = segments.next()?;
    if segments.next().is_some() {
        return None;
    }
    if !matches!(suffix, "sse" | "mcp") {
        return None;
    }
    is_uuid_key(key).then_some(key)
}

/// Resolve the caller's credential from a request. Precedence, first match
/// wins: path segment, `api_key` query parameter, the custom key header,
/// then a Bearer Authorization header.
pub fn resolve_api_key(
    path: &str,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Option<(ApiKey, KeySource)> {
    if let Some(key) = path_key(path) {
        return Some((ApiKey::new(key), KeySource::Path));
    }
    if let Some(key) = query.get(API_KEY_QUERY).filter(|k| !k.is_empty()) {
        return Some((ApiKey::new(key.clone()), KeySource::Query));
    }
    if let Some(key) = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|k| !k.is_empty())
    {
        return Some((ApiKey::new(key), KeySource::Header));
    }
    if let Some(key) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|k| !k.is_empty())
    {
        return Some((ApiKey::new(key), KeySource::Bearer));
    }
    None
}
