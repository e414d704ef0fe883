// src/error.rs

use thiserror::Error;

/// The primary error type for the `attest-oidc` library.
#[derive(Error, Debug)]
pub enum AttestOidcError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("A required configuration field is missing: {0}")]
    MissingConfiguration(String),

    /// No provider configuration snapshot has been loaded yet. A refresh
    /// has been queued; the caller should retry shortly.
    #[error("Provider configuration is not yet available")]
    ConfigurationMissing,

    #[error("No correlation session was found for this callback")]
    MissingSession,

    #[error("Invalid correlation session: {0}")]
    InvalidSession(String),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Token endpoint returned {status}: {body}")]
    TokenEndpoint {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("UserInfo endpoint returned {0}")]
    UserInfoEndpoint(reqwest::StatusCode),

    #[error("JWT validation error: {0}")]
    JwtValidation(#[from] jsonwebtoken::errors::Error),

    #[error("Unsupported JWT algorithm: {0:?}")]
    UnsupportedAlgorithm(jsonwebtoken::Algorithm),

    #[error("The JWT header is missing the 'kid' (Key ID) field")]
    MissingKeyId,

    #[error("Malformed key ID (expected '<controller>#<fragment>'): {0}")]
    MalformedKeyId(String),

    #[error("Key ID '{kid}' does not belong to controller '{controller}'")]
    KeyControllerMismatch { kid: String, controller: String },

    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("The token is missing a nonce claim")]
    MissingNonceInToken,

    #[error("Nonce mismatch: the nonce in the token does not match the session nonce")]
    NonceMismatch,

    /// The user-info payload carried no return codes and no embedded
    /// credential. The provider contract requires one or the other.
    #[error("UserInfo is missing the embedded core identity JWT")]
    MissingCoreIdentity,

    #[error("Failed to retrieve the client signing key: {0}")]
    SecretRetrieval(String),
}
