// src/resolver/mod.rs

//! Background resolvers for provider key material.
//!
//! Both resolvers follow the same shape: a single long-lived task owns
//! the mutable state and publishes immutable snapshots through an
//! atomic swap. Accessors never block on network I/O; when nothing has
//! been loaded yet they queue a refresh and fail fast with
//! [`AttestOidcError::ConfigurationMissing`].

use crate::error::AttestOidcError;
use jsonwebtoken::DecodingKey;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

pub mod configuration;
pub mod did;

pub use configuration::ConfigurationResolver;
pub use did::DidResolver;

/// A depth-1, non-blocking refresh signal.
///
/// Requests made while one is already pending are silently dropped, so
/// the consuming loop sees at most one queued refresh and concurrent
/// callers never pile up waiting.
pub(crate) struct RefreshSignal {
    tx: mpsc::Sender<()>,
}

impl RefreshSignal {
    pub(crate) fn new() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Enqueues a refresh request without waiting.
    pub(crate) fn request(&self) {
        match self.tx.try_send(()) {
            Ok(()) => debug!("refresh requested"),
            // Full: a request is already pending. Closed: the loop has
            // shut down. Neither is the caller's problem.
            Err(mpsc::error::TrySendError::Full(())) => {}
            Err(mpsc::error::TrySendError::Closed(())) => {}
        }
    }
}

/// Parses a `Cache-Control: max-age=N` directive into a TTL.
pub(crate) fn parse_cache_control(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::CACHE_CONTROL)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|part| {
            part.trim()
                .strip_prefix("max-age=")?
                .parse::<u64>()
                .ok()
                .map(Duration::from_secs)
        })
}

/// Builds a verification key from JWK public components. RSA and EC
/// key types are supported; anything else is rejected.
pub(crate) fn decoding_key(
    kty: &str,
    n: Option<&str>,
    e: Option<&str>,
    x: Option<&str>,
    y: Option<&str>,
) -> Result<DecodingKey, AttestOidcError> {
    match kty {
        "RSA" => {
            let n = n.ok_or_else(|| {
                AttestOidcError::InvalidKeyFormat("RSA key missing 'n' component".to_string())
            })?;
            let e = e.ok_or_else(|| {
                AttestOidcError::InvalidKeyFormat("RSA key missing 'e' component".to_string())
            })?;
            Ok(DecodingKey::from_rsa_components(n, e)?)
        }
        "EC" => {
            let x = x.ok_or_else(|| {
                AttestOidcError::InvalidKeyFormat("EC key missing 'x' component".to_string())
            })?;
            let y = y.ok_or_else(|| {
                AttestOidcError::InvalidKeyFormat("EC key missing 'y' component".to_string())
            })?;
            Ok(DecodingKey::from_ec_components(x, y)?)
        }
        other => Err(AttestOidcError::InvalidKeyFormat(format!(
            "unsupported key type '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refresh_signal_queues_at_most_one_request() {
        let (signal, mut rx) = RefreshSignal::new();

        signal.request();
        signal.request();
        signal.request();

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn refresh_signal_ignores_a_stopped_consumer() {
        let (signal, rx) = RefreshSignal::new();
        drop(rx);
        signal.request();
    }

    #[test]
    fn unsupported_key_types_are_rejected() {
        assert!(matches!(
            decoding_key("oct", None, None, None, None),
            Err(AttestOidcError::InvalidKeyFormat(_))
        ));
    }

    #[test]
    fn rsa_keys_require_both_components() {
        assert!(matches!(
            decoding_key("RSA", Some("AQAB"), None, None, None),
            Err(AttestOidcError::InvalidKeyFormat(_))
        ));
    }
}
