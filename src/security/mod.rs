//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming API request:
//!     → rate_limit.rs (fixed window per client IP)
//!     → session.rs (signed cookie → server-side session)
//!     → csrf.rs (double-submit token check on state-changing methods)
//!     → Pass to body parsing and routing
//!
//! Around every response:
//!     → headers.rs (CORS, hardening headers, client IP resolution)
//! ```
//!
//! # Design Decisions
//! - Cheap rejection first: rate limiting runs before any session lookup
//! - Fail closed: a missing or unverifiable token is a rejection
//! - Shared state lives in sharded maps, never behind one global lock

pub mod clock;
pub mod csrf;
pub mod headers;
pub mod rate_limit;
pub mod session;

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::config::GatewayConfig;
use self::clock::{Clock, SystemClock};
use self::csrf::CsrfGuard;
use self::rate_limit::RateLimiter;
use self::session::SessionStore;

type HmacSha256 = Hmac<Sha256>;

/// The signing secret was rejected by the MAC.
#[derive(Debug, thiserror::Error)]
#[error("Invalid signing key")]
pub struct KeyError;

/// HMAC-SHA256 keyed once, cloned per signature.
#[derive(Clone)]
pub(crate) struct Signer {
    mac: HmacSha256,
}

impl Signer {
    pub(crate) fn new(key: &[u8]) -> Result<Self, KeyError> {
        let mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| KeyError)?;
        Ok(Self { mac })
    }

    /// Base64url signature over the concatenated parts.
    pub(crate) fn sign(&self, parts: &[&[u8]]) -> String {
        let mut mac = self.mac.clone();
        for part in parts {
            mac.update(part);
        }
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of a base64url signature.
    pub(crate) fn verify(&self, parts: &[&[u8]], signature: &str) -> bool {
        let Ok(tag) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        for part in parts {
            mac.update(part);
        }
        mac.verify_slice(&tag).is_ok()
    }
}

/// Random base64url token built from `len` bytes of entropy.
pub(crate) fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The stateful security components, built once at startup and injected
/// into the pipeline.
#[derive(Clone)]
pub struct SecurityComponents {
    pub limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionStore>,
    pub csrf: Arc<CsrfGuard>,
}

impl SecurityComponents {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, KeyError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &GatewayConfig, clock: Arc<dyn Clock>) -> Result<Self, KeyError> {
        Ok(Self {
            limiter: Arc::new(RateLimiter::with_clock(&config.rate_limit, clock.clone())),
            sessions: Arc::new(SessionStore::with_clock(
                &config.session,
                config.environment,
                clock,
            )?),
            csrf: Arc::new(CsrfGuard::new(&config.csrf)?),
        })
    }
}
