// src/resolver/configuration.rs

use crate::config::RefreshDetails;
use crate::error::AttestOidcError;
use crate::model::{JsonWebKeySet, OidcDiscoveryDocument};
use crate::resolver::{decoding_key, RefreshSignal};
use arc_swap::ArcSwapOption;
use jsonwebtoken::DecodingKey;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// One published view of the provider: discovered endpoints plus the
/// decoded key set. Immutable once published; refreshes swap in a whole
/// new snapshot.
pub struct ConfigurationSnapshot {
    pub issuer: String,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Url,
    pub end_session_endpoint: Option<Url>,
    pub jwks_uri: Url,
    keys: HashMap<String, Arc<DecodingKey>>,
}

/// Keeps the freshest available provider endpoints and signing keys
/// without ever blocking a caller on network I/O.
///
/// Construction spawns exactly one background task which performs a
/// best-effort initial fetch and then refreshes on a fixed interval,
/// on demand (coalesced, rate-limited), until the shutdown channel is
/// raised or dropped.
#[derive(Clone)]
pub struct ConfigurationResolver {
    inner: Arc<Inner>,
}

struct Inner {
    http_client: reqwest::Client,
    issuer_url: Url,
    snapshot: ArcSwapOption<ConfigurationSnapshot>,
    refresh: RefreshSignal,
}

impl ConfigurationResolver {
    pub fn new(
        http_client: reqwest::Client,
        issuer_url: Url,
        refresh_details: &RefreshDetails,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (refresh, refresh_rx) = RefreshSignal::new();
        let inner = Arc::new(Inner {
            http_client,
            issuer_url,
            snapshot: ArcSwapOption::empty(),
            refresh,
        });

        let resolver = Self { inner };
        let task = resolver.clone();
        let interval = refresh_details.configuration_interval;
        let min_gap = refresh_details.min_refresh_gap;
        tokio::spawn(async move {
            task.run(refresh_rx, shutdown, interval, min_gap).await;
        });

        resolver
    }

    /// The currently published snapshot. When nothing has been loaded
    /// yet, queues a refresh and fails fast.
    pub fn snapshot(&self) -> Result<Arc<ConfigurationSnapshot>, AttestOidcError> {
        match self.inner.snapshot.load_full() {
            Some(snapshot) => Ok(snapshot),
            None => {
                self.inner.refresh.request();
                Err(AttestOidcError::ConfigurationMissing)
            }
        }
    }

    pub fn issuer(&self) -> Result<String, AttestOidcError> {
        Ok(self.snapshot()?.issuer.clone())
    }

    pub fn authorization_endpoint(&self) -> Result<Url, AttestOidcError> {
        Ok(self.snapshot()?.authorization_endpoint.clone())
    }

    pub fn token_endpoint(&self) -> Result<Url, AttestOidcError> {
        Ok(self.snapshot()?.token_endpoint.clone())
    }

    pub fn userinfo_endpoint(&self) -> Result<Url, AttestOidcError> {
        Ok(self.snapshot()?.userinfo_endpoint.clone())
    }

    pub fn end_session_endpoint(&self) -> Result<Option<Url>, AttestOidcError> {
        Ok(self.snapshot()?.end_session_endpoint.clone())
    }

    /// The verification key for the given `kid` from the current key
    /// set.
    pub fn key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AttestOidcError> {
        let snapshot = self.snapshot()?;
        snapshot
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AttestOidcError::KeyNotFound(kid.to_string()))
    }

    /// The single-consumer event loop. Fetch failures are logged and
    /// rescheduled; nothing terminates the loop except shutdown.
    async fn run(
        self,
        mut refresh_rx: mpsc::Receiver<()>,
        mut shutdown: watch::Receiver<bool>,
        interval: Duration,
        min_gap: Duration,
    ) {
        // Best-effort initial fetch; a cold start is not fatal.
        if let Err(e) = self.fetch_and_publish().await {
            warn!("Initial provider configuration fetch failed: {e}");
        }
        let mut last_attempt = Instant::now();

        // A pinned-deadline ticker: refresh signals and shutdown polls
        // must not reset the fixed-interval clock.
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.fetch_and_publish().await {
                        error!("Failed to refresh provider configuration: {e}");
                    }
                    last_attempt = Instant::now();
                }
                request = refresh_rx.recv() => {
                    match request {
                        Some(()) => {
                            if last_attempt.elapsed() < min_gap {
                                debug!("On-demand configuration refresh skipped (rate limited)");
                                continue;
                            }
                            if let Err(e) = self.fetch_and_publish().await {
                                error!("On-demand configuration refresh failed: {e}");
                            }
                            last_attempt = Instant::now();
                        }
                        None => break,
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Configuration resolver stopping");
                        break;
                    }
                }
            }
        }
    }

    /// Runs discovery, fetches the key set, and atomically publishes a
    /// fresh snapshot.
    #[instrument(skip(self), err)]
    async fn fetch_and_publish(&self) -> Result<(), AttestOidcError> {
        let discovery_url = self
            .inner
            .issuer_url
            .join(".well-known/openid-configuration")
            .map_err(|e| AttestOidcError::InvalidUrl(e.to_string()))?;

        debug!("Performing OIDC discovery at: {}", discovery_url);
        let document: OidcDiscoveryDocument = self
            .inner
            .http_client
            .get(discovery_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let jwks_uri = parse_endpoint(&document.jwks_uri)?;
        let jwks: JsonWebKeySet = self
            .inner
            .http_client
            .get(jwks_uri.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut keys = HashMap::with_capacity(jwks.keys.len());
        for jwk in jwks.keys {
            match decoding_key(
                &jwk.kty,
                jwk.n.as_deref(),
                jwk.e.as_deref(),
                jwk.x.as_deref(),
                jwk.y.as_deref(),
            ) {
                Ok(key) => {
                    keys.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => warn!(kid = %jwk.kid, "Skipping undecodable JWK: {e}"),
            }
        }

        let snapshot = ConfigurationSnapshot {
            issuer: document.issuer,
            authorization_endpoint: parse_endpoint(&document.authorization_endpoint)?,
            token_endpoint: parse_endpoint(&document.token_endpoint)?,
            userinfo_endpoint: parse_endpoint(&document.userinfo_endpoint)?,
            end_session_endpoint: document
                .end_session_endpoint
                .as_deref()
                .map(parse_endpoint)
                .transpose()?,
            jwks_uri,
            keys,
        };

        info!(
            key_count = snapshot.keys.len(),
            issuer = %snapshot.issuer,
            "Provider configuration refreshed"
        );
        self.inner.snapshot.store(Some(Arc::new(snapshot)));
        Ok(())
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, AttestOidcError> {
    Url::parse(raw).map_err(|e| AttestOidcError::InvalidUrl(e.to_string()))
}
