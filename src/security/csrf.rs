//! Double-submit CSRF protection bound to the server-side session.
//!
//! Each session owns a random secret. Tokens handed to the client are
//! `<salt>.<hmac(server_key, secret ":" salt)>`, so many valid tokens exist
//! per session and none of them reveal the secret. A state-changing request
//! must echo one of them in a header.

use axum::http::{HeaderMap, Method};

use crate::config::CsrfConfig;
use crate::error::ApiError;
use crate::observability::metrics;
use crate::security::session::Session;
use crate::security::{random_token, KeyError, Signer};

const SECRET_BYTES: usize = 18;
const SALT_BYTES: usize = 9;

/// Headers a token is accepted from, after the configured one.
pub const TOKEN_HEADERS: [&str; 4] = ["x-csrf-token", "csrf-token", "xsrf-token", "x-xsrf-token"];

/// Issues and verifies anti-forgery tokens.
pub struct CsrfGuard {
    signer: Signer,
    header_name: String,
    exempt_paths: Vec<String>,
}

impl CsrfGuard {
    pub fn new(config: &CsrfConfig) -> Result<Self, KeyError> {
        Ok(Self {
            signer: Signer::new(config.secret.as_bytes())?,
            header_name: config.header_name.to_ascii_lowercase(),
            exempt_paths: config.exempt_paths.clone(),
        })
    }

    /// Derive a fresh token, creating the session secret on first use.
    pub fn issue_token(&self, session: &mut Session) -> String {
        let secret = match session.csrf_secret() {
            Some(secret) => secret.to_string(),
            None => {
                let secret = random_token(SECRET_BYTES);
                session.set_csrf_secret(secret.clone());
                secret
            }
        };

        let salt = random_token(SALT_BYTES);
        let signature = self.signer.sign(&[secret.as_bytes(), b":", salt.as_bytes()]);
        format!("{}.{}", salt, signature)
    }

    /// Check a presented token against the session secret.
    pub fn verify(&self, session: &Session, presented: Option<&str>) -> Result<(), ApiError> {
        let valid = match (session.csrf_secret(), presented) {
            (Some(secret), Some(token)) => match token.split_once('.') {
                Some((salt, signature)) => self.signer.verify(
                    &[secret.as_bytes(), b":", salt.as_bytes()],
                    signature,
                ),
                None => false,
            },
            _ => false,
        };

        if valid {
            Ok(())
        } else {
            metrics::record_csrf_rejection();
            Err(ApiError::csrf())
        }
    }

    /// Safe methods and configured path prefixes skip verification.
    pub fn is_exempt(&self, method: &Method, path: &str) -> bool {
        if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
            return true;
        }
        self.exempt_paths
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// The token echoed by the client, if any.
    pub fn token_from_headers<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        std::iter::once(self.header_name.as_str())
            .chain(TOKEN_HEADERS)
            .find_map(|name| headers.get(name))
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, SessionConfig};
    use crate::security::session::SessionStore;
    use axum::http::HeaderValue;

    fn fixture() -> (CsrfGuard, Session) {
        let store = SessionStore::new(&SessionConfig::default(), Environment::Test).unwrap();
        (CsrfGuard::new(&CsrfConfig::default()).unwrap(), store.load(&HeaderMap::new()))
    }

    #[test]
    fn test_issued_token_verifies() {
        let (guard, mut session) = fixture();
        let token = guard.issue_token(&mut session);

        assert!(session.is_modified());
        assert!(guard.verify(&session, Some(&token)).is_ok());
    }

    #[test]
    fn test_tokens_vary_but_share_secret() {
        let (guard, mut session) = fixture();
        let first = guard.issue_token(&mut session);
        let secret = session.csrf_secret().map(String::from);
        let second = guard.issue_token(&mut session);

        assert_ne!(first, second);
        assert_eq!(session.csrf_secret().map(String::from), secret);
        assert!(guard.verify(&session, Some(&first)).is_ok());
    }

    #[test]
    fn test_rejects_missing_or_foreign_tokens() {
        let (guard, mut session) = fixture();
        let (_, mut other) = fixture();
        let foreign = guard.issue_token(&mut other);

        let err = guard.verify(&session, None).unwrap_err();
        assert_eq!(err.code(), "ERR_CSRF");
        assert_eq!(err.status().as_u16(), 403);

        guard.issue_token(&mut session);
        assert!(guard.verify(&session, Some(&foreign)).is_err());
        assert!(guard.verify(&session, Some("garbage")).is_err());
    }

    #[test]
    fn test_session_without_secret_rejects() {
        let (guard, session) = fixture();
        assert!(guard.verify(&session, Some("abc.def")).is_err());
    }

    #[test]
    fn test_exemptions() {
        let guard = CsrfGuard::new(&CsrfConfig {
            exempt_paths: vec!["/api/public".into()],
            ..CsrfConfig::default()
        })
        .unwrap();

        assert!(guard.is_exempt(&Method::GET, "/api/questions"));
        assert!(guard.is_exempt(&Method::OPTIONS, "/api/questions"));
        assert!(guard.is_exempt(&Method::POST, "/api/public/feedback"));
        assert!(!guard.is_exempt(&Method::POST, "/api/questions"));
        assert!(!guard.is_exempt(&Method::DELETE, "/api/questions/1"));
    }

    #[test]
    fn test_token_header_aliases() {
        let (guard, _) = fixture();
        let mut headers = HeaderMap::new();
        assert!(guard.token_from_headers(&headers).is_none());

        headers.insert("xsrf-token", HeaderValue::from_static("a.b"));
        assert_eq!(guard.token_from_headers(&headers), Some("a.b"));

        headers.insert("x-csrf-token", HeaderValue::from_static("c.d"));
        assert_eq!(guard.token_from_headers(&headers), Some("c.d"));
    }
}
