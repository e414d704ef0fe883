// src/resolver/did.rs

use crate::config::RefreshDetails;
use crate::error::AttestOidcError;
use crate::model::DidDocument;
use crate::resolver::{decoding_key, parse_cache_control, RefreshSignal};
use arc_swap::ArcSwapOption;
use jsonwebtoken::DecodingKey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// One published view of the provider's DID document: the controller id
/// plus the decoded assertion keys, indexed by full method id.
pub struct DidSnapshot {
    pub controller: String,
    keys: HashMap<String, Arc<DecodingKey>>,
}

/// Resolves credential assertion keys through the provider's
/// `.well-known/did.json` document, independently of the rotating
/// key set.
///
/// Refresh timing follows the provider's `Cache-Control: max-age`
/// directive (with a configured fallback); a failed fetch is retried on
/// a short fixed delay instead of the normal interval.
#[derive(Clone)]
pub struct DidResolver {
    inner: Arc<Inner>,
}

struct Inner {
    http_client: reqwest::Client,
    identity_url: Url,
    snapshot: ArcSwapOption<DidSnapshot>,
    refresh: RefreshSignal,
    default_ttl: Duration,
    error_retry: Duration,
}

impl DidResolver {
    pub fn new(
        http_client: reqwest::Client,
        identity_url: Url,
        refresh_details: &RefreshDetails,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (refresh, refresh_rx) = RefreshSignal::new();
        let inner = Arc::new(Inner {
            http_client,
            identity_url,
            snapshot: ArcSwapOption::empty(),
            refresh,
            default_ttl: refresh_details.did_default_ttl,
            error_retry: refresh_details.did_error_retry,
        });

        let resolver = Self { inner };
        let task = resolver.clone();
        let min_gap = refresh_details.min_refresh_gap;
        tokio::spawn(async move {
            task.run(refresh_rx, shutdown, min_gap).await;
        });

        resolver
    }

    fn snapshot(&self) -> Result<Arc<DidSnapshot>, AttestOidcError> {
        match self.inner.snapshot.load_full() {
            Some(snapshot) => Ok(snapshot),
            None => {
                self.inner.refresh.request();
                Err(AttestOidcError::ConfigurationMissing)
            }
        }
    }

    /// Looks up the assertion key for a `<controller>#<fragment>` key
    /// id.
    ///
    /// The controller segment must match the loaded document's
    /// controller; a kid naming an unrelated document is rejected
    /// rather than searched for.
    pub fn for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AttestOidcError> {
        let snapshot = self.snapshot()?;

        let (controller, _fragment) = kid
            .split_once('#')
            .ok_or_else(|| AttestOidcError::MalformedKeyId(kid.to_string()))?;
        if controller != snapshot.controller {
            return Err(AttestOidcError::KeyControllerMismatch {
                kid: kid.to_string(),
                controller: snapshot.controller.clone(),
            });
        }

        snapshot
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AttestOidcError::KeyNotFound(kid.to_string()))
    }

    /// The single-consumer event loop. The next wake-up is whatever the
    /// last fetch dictated: the document's cache TTL, or the short
    /// error retry.
    async fn run(
        self,
        mut refresh_rx: mpsc::Receiver<()>,
        mut shutdown: watch::Receiver<bool>,
        min_gap: Duration,
    ) {
        let mut next_delay = self.attempt().await;
        let mut last_attempt = Instant::now();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(next_delay) => {
                    next_delay = self.attempt().await;
                    last_attempt = Instant::now();
                }
                request = refresh_rx.recv() => {
                    match request {
                        Some(()) => {
                            if last_attempt.elapsed() < min_gap {
                                debug!("On-demand DID refresh skipped (rate limited)");
                                continue;
                            }
                            next_delay = self.attempt().await;
                            last_attempt = Instant::now();
                        }
                        None => break,
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("DID resolver stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One fetch attempt; returns the delay until the next one.
    async fn attempt(&self) -> Duration {
        match self.fetch_and_publish().await {
            Ok(ttl) => ttl,
            Err(e) => {
                error!(
                    "Failed to refresh DID document: {e}. Retrying in {:?}.",
                    self.inner.error_retry
                );
                self.inner.error_retry
            }
        }
    }

    /// Fetches the DID document and atomically publishes a fresh
    /// snapshot. Returns the TTL from the response's cache directive.
    #[instrument(skip(self), err)]
    async fn fetch_and_publish(&self) -> Result<Duration, AttestOidcError> {
        let document_url = self
            .inner
            .identity_url
            .join(".well-known/did.json")
            .map_err(|e| AttestOidcError::InvalidUrl(e.to_string()))?;

        debug!("Fetching DID document from: {}", document_url);
        let response = self
            .inner
            .http_client
            .get(document_url)
            .send()
            .await?
            .error_for_status()?;
        let ttl = parse_cache_control(&response).unwrap_or(self.inner.default_ttl);
        let document: DidDocument = response.json().await?;

        let mut keys = HashMap::with_capacity(document.assertion_method.len());
        for method in document.assertion_method {
            if method.controller != document.id {
                warn!(
                    id = %method.id,
                    controller = %method.controller,
                    "Skipping assertion method with foreign controller"
                );
                continue;
            }
            match decoding_key(
                &method.public_key_jwk.kty,
                method.public_key_jwk.n.as_deref(),
                method.public_key_jwk.e.as_deref(),
                method.public_key_jwk.x.as_deref(),
                method.public_key_jwk.y.as_deref(),
            ) {
                Ok(key) => {
                    keys.insert(method.id, Arc::new(key));
                }
                Err(e) => warn!(id = %method.id, "Skipping undecodable assertion key: {e}"),
            }
        }

        let snapshot = DidSnapshot {
            controller: document.id,
            keys,
        };
        info!(
            key_count = snapshot.keys.len(),
            controller = %snapshot.controller,
            ttl = ?ttl,
            "DID document refreshed"
        );
        self.inner.snapshot.store(Some(Arc::new(snapshot)));
        Ok(ttl)
    }
}
