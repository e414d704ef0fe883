// src/client.rs

use crate::config::Config;
use crate::error::AttestOidcError;
use crate::identity::IdentityUserData;
use crate::model::{TokenPair, TokenResponse, UserInfo};
use crate::resolver::{ConfigurationResolver, DidResolver};
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, encode, Algorithm, EncodingKey, Header, Validation};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

pub const CLIENT_ASSERTION_TYPE: &str =
    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// The identity vector-of-trust requested when identity proofing is
/// wanted alongside authentication.
const IDENTITY_VTR: &str = r#"["Cl.Cm.P2"]"#;

/// The userinfo claims requested when identity proofing is wanted.
const IDENTITY_CLAIMS_REQUEST: &str =
    r#"{"userinfo":{"coreIdentityJWT":null,"returnCode":null,"address":null}}"#;

/// Retrieves the client's own private signing key, used for client
/// assertions. Typically backed by a secret-management service.
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// The PKCS#8 PEM-encoded RSA private key.
    async fn private_signing_key(&self) -> Result<Vec<u8>, AttestOidcError>;
}

/// Generates random strings for `jti`, `state` and `nonce` values.
pub trait RandomSource: Send + Sync {
    fn random_string(&self, length: usize) -> String;
}

/// The default [`RandomSource`], drawing from v4 UUIDs.
pub struct UuidRandomSource;

impl RandomSource for UuidRandomSource {
    fn random_string(&self, length: usize) -> String {
        let mut out = String::with_capacity(length);
        while out.len() < length {
            out.push_str(&Uuid::new_v4().simple().to_string());
        }
        out.truncate(length);
        out
    }
}

/// Claims of the self-signed client assertion presented at the token
/// endpoint in place of a shared secret.
#[derive(Debug, Serialize)]
struct ClientAssertionClaims<'a> {
    aud: &'a str,
    iss: &'a str,
    sub: &'a str,
    exp: i64,
    iat: i64,
    jti: String,
}

/// The claims decoded from a validated ID token.
#[derive(Debug, Deserialize)]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: u64,
    pub iat: u64,
    pub nonce: Option<String>,
}

/// The identity-assurance client.
///
/// Owns the shared HTTP client and both background resolvers. Cloning
/// is cheap; the resolver tasks stop when the last clone is dropped.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    http_client: reqwest::Client,
    secrets: Arc<dyn SecretSource>,
    random: Arc<dyn RandomSource>,
    configuration: ConfigurationResolver,
    did: DidResolver,
    shutdown: watch::Sender<bool>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Cancels both resolver loops. Cooperative: each loop selects
        // on this channel alongside its timer and refresh signal.
        let _ = self.shutdown.send(true);
    }
}

impl Client {
    /// Creates a new client and starts both background resolvers.
    pub fn new(config: Config, secrets: Arc<dyn SecretSource>) -> Result<Self, AttestOidcError> {
        Self::with_random_source(config, secrets, Arc::new(UuidRandomSource))
    }

    pub fn with_random_source(
        config: Config,
        secrets: Arc<dyn SecretSource>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, AttestOidcError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.refresh.request_timeout)
            .build()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let configuration = ConfigurationResolver::new(
            http_client.clone(),
            config.issuer_url.clone(),
            &config.refresh,
            shutdown_rx.clone(),
        );
        let did = DidResolver::new(
            http_client.clone(),
            config.identity_url.clone(),
            &config.refresh,
            shutdown_rx,
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                http_client,
                secrets,
                random,
                configuration,
                did,
                shutdown,
            }),
        })
    }

    /// A fresh random string suitable for `state` and `nonce` values.
    pub fn random_string(&self, length: usize) -> String {
        self.inner.random.random_string(length)
    }

    /// Builds the authorize redirect for a new login.
    ///
    /// When `identity_requested` is set, the URL additionally asks the
    /// provider for identity proofing and the identity-evidence
    /// userinfo claims.
    pub fn authorization_url(
        &self,
        state: &str,
        nonce: &str,
        locale: &str,
        identity_requested: bool,
    ) -> Result<Url, AttestOidcError> {
        let mut url = self.inner.configuration.authorization_endpoint()?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("scope", "openid email phone")
                .append_pair("client_id", &self.inner.config.client_id)
                .append_pair("redirect_uri", self.inner.config.redirect_url.as_str())
                .append_pair("state", state)
                .append_pair("nonce", nonce)
                .append_pair("ui_locales", locale);
            if identity_requested {
                query
                    .append_pair("vtr", IDENTITY_VTR)
                    .append_pair("claims", IDENTITY_CLAIMS_REQUEST);
            }
        }
        Ok(url)
    }

    /// Exchanges an authorization code for tokens, presenting a
    /// self-signed client assertion, and validates the returned ID
    /// token against the session nonce.
    ///
    /// Any validation failure aborts the exchange; a partially-trusted
    /// token pair is never returned.
    #[instrument(skip_all, err)]
    pub async fn exchange(&self, code: &str, nonce: &str) -> Result<TokenPair, AttestOidcError> {
        let token_endpoint = self.inner.configuration.token_endpoint()?;
        let assertion = self.client_assertion().await?;

        let form = [
            ("client_id", self.inner.config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.inner.config.redirect_url.as_str()),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion.as_str()),
            ("code", code),
        ];

        debug!("Exchanging authorization code at: {}", token_endpoint);
        let response = self
            .inner
            .http_client
            .post(token_endpoint)
            .form(&form)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AttestOidcError::TokenEndpoint { status, body });
        }

        let tokens: TokenResponse = response.json().await?;
        self.validate_id_token(&tokens.id_token, nonce)?;

        Ok(TokenPair {
            id_token: tokens.id_token,
            access_token: tokens.access_token,
        })
    }

    /// Retrieves the authenticated user-info payload.
    #[instrument(skip_all, err)]
    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo, AttestOidcError> {
        let endpoint = self.inner.configuration.userinfo_endpoint()?;
        let response = self
            .inner
            .http_client
            .get(endpoint)
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AttestOidcError::UserInfoEndpoint(response.status()));
        }
        Ok(response.json().await?)
    }

    /// Validates the embedded verifiable-credential JWT and extracts
    /// identity attributes or a failure status. See
    /// [`crate::identity`].
    pub fn parse_identity_claim(
        &self,
        user_info: &UserInfo,
    ) -> Result<IdentityUserData, AttestOidcError> {
        crate::identity::parse_identity_claim(
            &self.inner.did,
            &self.inner.config.validation,
            user_info,
        )
    }

    /// Builds the provider's end-session redirect.
    pub fn end_session_url(
        &self,
        id_token_hint: &str,
        post_logout_redirect: &str,
    ) -> Result<Url, AttestOidcError> {
        let mut url = self
            .inner
            .configuration
            .end_session_endpoint()?
            .ok_or_else(|| {
                AttestOidcError::MissingConfiguration("end_session_endpoint".to_string())
            })?;
        url.query_pairs_mut()
            .append_pair("id_token_hint", id_token_hint)
            .append_pair("post_logout_redirect_uri", post_logout_redirect);
        Ok(url)
    }

    /// Signs a short-lived client assertion with the key from the
    /// secret source: audience pinned to the token-endpoint identifier,
    /// issuer and subject both the client id, five-minute expiry.
    async fn client_assertion(&self) -> Result<String, AttestOidcError> {
        let pem_bytes = self.inner.secrets.private_signing_key().await?;
        let pem = std::str::from_utf8(&pem_bytes).map_err(|e| {
            AttestOidcError::InvalidKeyFormat(format!("signing key is not valid UTF-8: {e}"))
        })?;

        // Parse the PKCS#8 PEM ourselves and hand jsonwebtoken PKCS#1
        // DER; its own PEM path has awkward trait bounds.
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| {
            AttestOidcError::InvalidKeyFormat(format!(
                "Failed to parse RSA private key from PKCS#8 PEM: {e}"
            ))
        })?;
        let pkcs1_der = private_key.to_pkcs1_der().map_err(|e| {
            AttestOidcError::InvalidKeyFormat(format!(
                "Failed to convert RSA key to PKCS#1 DER: {e}"
            ))
        })?;
        let encoding_key = EncodingKey::from_rsa_der(pkcs1_der.as_bytes());

        let now = Utc::now().timestamp();
        let claims = ClientAssertionClaims {
            aud: &self.inner.config.client_assertion_audience,
            iss: &self.inner.config.client_id,
            sub: &self.inner.config.client_id,
            exp: now + 5 * 60,
            iat: now,
            jti: self.inner.random.random_string(18),
        };

        Ok(encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?)
    }

    /// Full ID-token validation: allowed algorithm, signature against
    /// the resolved key set, issuer, audience, `iat` presence, and the
    /// session nonce.
    fn validate_id_token(&self, token: &str, nonce: &str) -> Result<(), AttestOidcError> {
        let header = decode_header(token)?;
        if !self
            .inner
            .config
            .validation
            .id_token_algorithms
            .contains(&header.alg)
        {
            return Err(AttestOidcError::UnsupportedAlgorithm(header.alg));
        }
        let kid = header.kid.ok_or(AttestOidcError::MissingKeyId)?;
        let key = self.inner.configuration.key_for_kid(&kid)?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.inner.config.validation.leeway.as_secs();
        validation.set_issuer(&[self.inner.configuration.issuer()?]);
        validation.set_audience(&[&self.inner.config.client_id]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud"]);

        let token_data = decode::<IdTokenClaims>(token, &key, &validation)?;

        let token_nonce = token_data
            .claims
            .nonce
            .as_deref()
            .ok_or(AttestOidcError::MissingNonceInToken)?;
        if token_nonce != nonce {
            return Err(AttestOidcError::NonceMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_random_source_yields_requested_length() {
        let source = UuidRandomSource;
        for length in [1, 12, 32, 64, 100] {
            assert_eq!(source.random_string(length).len(), length);
        }
    }

    #[test]
    fn uuid_random_source_does_not_repeat() {
        let source = UuidRandomSource;
        assert_ne!(source.random_string(32), source.random_string(32));
    }
}
