use secrecy::SecretString;

/// Wraps the caller's upstream API key (zeroized on drop, redacted in Debug).
///
/// Carried by a request, held by at most one session; never persisted.
#[derive(Clone)]
pub struct ApiKey(pub SecretString);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn debug_redacts_key() {
        let key = ApiKey::new("53d7793f-2e9f-4db2-883c-1cd490eeba5b");
        let debug = format!("{key:?}");
        assert!(!debug.contains("53d7793f"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn expose_returns_original() {
        let key = ApiKey::new("secret-value");
        assert_eq!(key.0.expose_secret(), "secret-value");
    }
}
