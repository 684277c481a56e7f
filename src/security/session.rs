//! Server-side sessions keyed by a signed cookie.
//!
//! The cookie carries only `<id>.<hmac(id)>`; the state lives here. A
//! session is created lazily for any request without a valid cookie but is
//! stored (and the cookie emitted) only once something is written to it.
//!
//! Expiry is fixed at issuance. Activity never extends a session.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};
use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::config::{Environment, SessionConfig};
use crate::observability::metrics;
use crate::security::clock::{Clock, SystemClock};
use crate::security::{random_token, KeyError, Signer};

const SESSION_ID_BYTES: usize = 24;

/// Per-client session state as seen by one request.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    csrf_secret: Option<String>,
    data: Map<String, Value>,
    expires_at: Instant,
    is_new: bool,
    modified: bool,
}

impl Session {
    fn fresh(expires_at: Instant) -> Self {
        Self {
            id: random_token(SESSION_ID_BYTES),
            csrf_secret: None,
            data: Map::new(),
            expires_at,
            is_new: true,
            modified: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn csrf_secret(&self) -> Option<&str> {
        self.csrf_secret.as_deref()
    }

    pub fn set_csrf_secret(&mut self, secret: String) {
        self.csrf_secret = Some(secret);
        self.modified = true;
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
        self.modified = true;
    }

    /// True until the session has been stored for the first time.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }
}

#[derive(Debug, Clone)]
struct SessionRecord {
    csrf_secret: Option<String>,
    data: Map<String, Value>,
    expires_at: Instant,
}

/// Concurrent session store.
pub struct SessionStore {
    records: DashMap<String, SessionRecord>,
    signer: Signer,
    cookie_name: String,
    ttl: Duration,
    secure: bool,
    same_site: &'static str,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig, environment: Environment) -> Result<Self, KeyError> {
        Self::with_clock(config, environment, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: &SessionConfig,
        environment: Environment,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, KeyError> {
        let production = environment.is_production();
        Ok(Self {
            records: DashMap::new(),
            signer: Signer::new(config.secret.as_bytes())?,
            cookie_name: config.cookie_name.clone(),
            ttl: Duration::from_secs(config.ttl_secs),
            secure: production,
            same_site: if production { "Strict" } else { "Lax" },
            clock,
        })
    }

    /// Resolve the request's session, or start a fresh unsaved one.
    pub fn load(&self, headers: &HeaderMap) -> Session {
        let now = self.clock.now();

        if let Some(id) = self.session_id(headers) {
            let expired = match self.records.get(id) {
                Some(record) if record.expires_at > now => {
                    return Session {
                        id: id.to_string(),
                        csrf_secret: record.csrf_secret.clone(),
                        data: record.data.clone(),
                        expires_at: record.expires_at,
                        is_new: false,
                        modified: false,
                    };
                }
                Some(_) => true,
                None => false,
            };
            if expired {
                tracing::debug!("Session expired");
                self.records.remove(id);
            }
        }

        Session::fresh(now + self.ttl)
    }

    /// Store a modified session.
    ///
    /// Returns the `Set-Cookie` value the first time a session is stored;
    /// later writes keep the original cookie and expiry.
    pub fn persist(&self, session: &Session) -> Option<String> {
        if !session.modified {
            return None;
        }

        self.records.insert(
            session.id.clone(),
            SessionRecord {
                csrf_secret: session.csrf_secret.clone(),
                data: session.data.clone(),
                expires_at: session.expires_at,
            },
        );
        metrics::record_active_sessions(self.records.len());

        session.is_new.then(|| self.set_cookie(&session.id))
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.records.len();
        self.records.retain(|_, record| record.expires_at > now);
        let removed = before.saturating_sub(self.records.len());
        metrics::record_active_sessions(self.records.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    fn set_cookie(&self, id: &str) -> String {
        let signature = self.signer.sign(&[id.as_bytes()]);
        let mut cookie = format!(
            "{}={}.{}; Path=/; Max-Age={}; HttpOnly; SameSite={}",
            self.cookie_name,
            id,
            signature,
            self.ttl.as_secs(),
            self.same_site,
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// Extract and verify the session id from the `Cookie` headers.
    fn session_id<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.cookie_name)
            .and_then(|(_, value)| {
                let (id, signature) = value.rsplit_once('.')?;
                if self.signer.verify(&[id.as_bytes()], signature) {
                    Some(id)
                } else {
                    tracing::debug!("Rejected session cookie with bad signature");
                    None
                }
            })
    }
}
