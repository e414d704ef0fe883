// src/config.rs

use crate::error::AttestOidcError;
use jsonwebtoken::Algorithm;
use std::time::Duration;
use url::Url;

/// Contains the validation settings applied to tokens issued by the
/// provider.
#[derive(Clone)]
pub struct ValidationDetails {
    /// Algorithms permitted for the provider's ID token.
    pub id_token_algorithms: Vec<Algorithm>,
    /// Algorithms permitted for the embedded credential JWT. Symmetric
    /// algorithms are never accepted here.
    pub credential_algorithms: Vec<Algorithm>,
    /// Tolerance for clock skew when validating `exp` and `iat`.
    pub leeway: Duration,
}

impl Default for ValidationDetails {
    fn default() -> Self {
        Self {
            id_token_algorithms: vec![Algorithm::ES256, Algorithm::RS256],
            credential_algorithms: vec![Algorithm::ES256, Algorithm::ES384, Algorithm::RS256],
            leeway: Duration::from_secs(60),
        }
    }
}

/// Timing policy for the two background resolvers.
#[derive(Clone)]
pub struct RefreshDetails {
    /// Fixed interval between configuration/key-set refreshes.
    pub configuration_interval: Duration,
    /// Fallback DID refresh interval when the provider sends no
    /// `Cache-Control: max-age` directive.
    pub did_default_ttl: Duration,
    /// Delay before retrying a failed DID fetch.
    pub did_error_retry: Duration,
    /// Minimum gap between refreshes triggered on demand. Bounds request
    /// storms from many simultaneous "configuration missing" callers.
    pub min_refresh_gap: Duration,
    /// Per-call timeout applied to every outbound request.
    pub request_timeout: Duration,
}

impl Default for RefreshDetails {
    fn default() -> Self {
        Self {
            configuration_interval: Duration::from_secs(24 * 60 * 60),
            did_default_ttl: Duration::from_secs(24 * 60 * 60),
            did_error_retry: Duration::from_secs(60),
            min_refresh_gap: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// The main configuration for the `attest-oidc` client.
///
/// Construct this with the [`ConfigBuilder`].
#[derive(Clone)]
pub struct Config {
    /// The issuer URL of the OIDC provider; used for discovery and for
    /// validating the ID token's `iss` claim.
    pub issuer_url: Url,
    /// Base URL from which `.well-known/did.json` is resolved.
    pub identity_url: Url,
    /// The client ID registered with the provider; validated against the
    /// ID token's `aud` claim.
    pub client_id: String,
    /// The redirect URI registered with the provider.
    pub redirect_url: Url,
    /// The fixed audience placed in the client assertion. Providers
    /// typically pin this to their token endpoint identifier.
    pub client_assertion_audience: String,
    pub validation: ValidationDetails,
    pub refresh: RefreshDetails,
}

/// A builder for creating a [`Config`] instance.
#[derive(Default)]
pub struct ConfigBuilder {
    issuer_url: Option<Url>,
    identity_url: Option<Url>,
    client_id: Option<String>,
    redirect_url: Option<Url>,
    client_assertion_audience: Option<String>,
    validation: ValidationDetails,
    refresh: RefreshDetails,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the issuer URL of the OIDC provider. Required.
    pub fn issuer_url(mut self, url: &str) -> Result<Self, AttestOidcError> {
        self.issuer_url = Some(parse_url(url)?);
        Ok(self)
    }

    /// Sets the base URL of the provider's DID document host. Required.
    pub fn identity_url(mut self, url: &str) -> Result<Self, AttestOidcError> {
        self.identity_url = Some(parse_url(url)?);
        Ok(self)
    }

    /// Sets the client ID of the application. Required.
    pub fn client_id(mut self, client_id: String) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Sets the redirect URI used at login and exchange. Required.
    pub fn redirect_url(mut self, url: &str) -> Result<Self, AttestOidcError> {
        self.redirect_url = Some(parse_url(url)?);
        Ok(self)
    }

    /// Overrides the audience claimed in the client assertion. Defaults
    /// to `{issuer}/token`.
    pub fn client_assertion_audience(mut self, audience: String) -> Self {
        self.client_assertion_audience = Some(audience);
        self
    }

    /// Sets the clock skew tolerance. Defaults to 60 seconds.
    pub fn leeway(mut self, leeway: Duration) -> Self {
        self.validation.leeway = leeway;
        self
    }

    /// Sets the allowed signing algorithms for the provider's ID token.
    pub fn id_token_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.validation.id_token_algorithms = algorithms;
        self
    }

    /// Sets the allowed signing algorithms for the embedded credential.
    pub fn credential_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.validation.credential_algorithms = algorithms;
        self
    }

    /// Overrides the resolver timing policy.
    pub fn refresh_details(mut self, refresh: RefreshDetails) -> Self {
        self.refresh = refresh;
        self
    }

    /// Consumes the builder and returns a `Config`.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing.
    pub fn build(self) -> Result<Config, AttestOidcError> {
        let issuer_url = self
            .issuer_url
            .ok_or(AttestOidcError::MissingConfiguration("issuer_url".to_string()))?;
        let identity_url = self
            .identity_url
            .ok_or(AttestOidcError::MissingConfiguration("identity_url".to_string()))?;
        let client_id = self
            .client_id
            .ok_or(AttestOidcError::MissingConfiguration("client_id".to_string()))?;
        let redirect_url = self
            .redirect_url
            .ok_or(AttestOidcError::MissingConfiguration("redirect_url".to_string()))?;

        let client_assertion_audience = match self.client_assertion_audience {
            Some(audience) => audience,
            None => issuer_url
                .join("token")
                .map_err(|e| AttestOidcError::InvalidUrl(e.to_string()))?
                .to_string(),
        };

        Ok(Config {
            issuer_url,
            identity_url,
            client_id,
            redirect_url,
            client_assertion_audience,
            validation: self.validation,
            refresh: self.refresh,
        })
    }
}

fn parse_url(url: &str) -> Result<Url, AttestOidcError> {
    Url::parse(url).map_err(|e| AttestOidcError::InvalidUrl(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
            .issuer_url("https://oidc.example.com/")
            .unwrap()
            .identity_url("https://identity.example.com/")
            .unwrap()
            .client_id("client-1".to_string())
            .redirect_url("https://service.example.com/callback")
            .unwrap()
    }

    #[test]
    fn build_defaults_assertion_audience_to_token_endpoint() {
        let config = builder().build().unwrap();
        assert_eq!(config.client_assertion_audience, "https://oidc.example.com/token");
    }

    #[test]
    fn build_requires_client_id() {
        let result = ConfigBuilder::new()
            .issuer_url("https://oidc.example.com/")
            .unwrap()
            .identity_url("https://identity.example.com/")
            .unwrap()
            .redirect_url("https://service.example.com/callback")
            .unwrap()
            .build();
        assert!(matches!(
            result,
            Err(AttestOidcError::MissingConfiguration(field)) if field == "client_id"
        ));
    }
}
