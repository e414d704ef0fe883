// src/lib.rs

//! An identity-assurance OpenID Connect client.
//!
//! Performs the login/identity handshake with an external identity
//! provider: builds the authorize redirect, exchanges the authorization
//! code using a self-signed client assertion, resolves signing keys
//! through a rotating remote key set and an independently-refreshed DID
//! document, verifies the embedded verifiable-credential JWT into
//! confirmed identity attributes, and fuzzy-matches the verified name
//! against a self-declared one.

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod model;
pub mod name;
pub mod resolver;
pub mod session;

/// The public prelude for the `attest-oidc` crate.
///
/// This module re-exports the most commonly used types for convenience.
pub mod prelude {
    pub use crate::client::{Client, RandomSource, SecretSource, UuidRandomSource};
    pub use crate::config::{Config, ConfigBuilder, RefreshDetails, ValidationDetails};
    pub use crate::error::AttestOidcError;
    pub use crate::identity::{Address, IdentityStatus, IdentityUserData};
    pub use crate::model::{TokenPair, UserInfo};
    pub use crate::name::match_name;
    pub use crate::session::CorrelationSession;
    pub use jsonwebtoken::Algorithm;
}
