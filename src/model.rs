// src/model.rs

use serde::Deserialize;

/// The OIDC provider's discovery document, found at the
/// `.well-known/openid-configuration` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcDiscoveryDocument {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub jwks_uri: String,
    pub end_session_endpoint: Option<String>,
}

/// A single JSON Web Key (JWK) as defined in RFC 7517.
///
/// Carries the union of the RSA (`n`/`e`) and EC (`crv`/`x`/`y`) public
/// components; which set is present depends on `kty`.
#[derive(Debug, Deserialize)]
pub struct JsonWebKey {
    pub kid: String,
    pub kty: String,
    #[serde(rename = "use")]
    pub use_purpose: Option<String>,
    pub alg: Option<String>,
    pub n: Option<String>,
    pub e: Option<String>,
    pub crv: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

/// A JSON Web Key Set (JWKS), a collection of JWKs.
#[derive(Debug, Deserialize)]
pub struct JsonWebKeySet {
    pub keys: Vec<JsonWebKey>,
}

/// A decentralized-identifier document as served at
/// `.well-known/did.json`. Only the assertion methods are consumed.
#[derive(Debug, Deserialize)]
pub struct DidDocument {
    pub id: String,
    #[serde(rename = "assertionMethod", default)]
    pub assertion_method: Vec<AssertionMethod>,
}

/// One assertion key from a DID document.
#[derive(Debug, Deserialize)]
pub struct AssertionMethod {
    pub id: String,
    pub controller: String,
    #[serde(rename = "publicKeyJwk")]
    pub public_key_jwk: JsonWebKeyMaterial,
}

/// The bare key material inside a DID assertion method. Unlike a JWKS
/// entry there is no `kid`; the method `id` identifies the key.
#[derive(Debug, Deserialize)]
pub struct JsonWebKeyMaterial {
    pub kty: String,
    pub n: Option<String>,
    pub e: Option<String>,
    pub crv: Option<String>,
    pub x: Option<String>,
    pub y: Option<String>,
}

/// The token endpoint's successful response body.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    pub id_token: String,
}

/// The validated outcome of an authorization-code exchange.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub id_token: String,
    pub access_token: String,
}

/// The authenticated user-info payload.
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub phone_verified: bool,
    /// The embedded verifiable-credential JWT, present when identity
    /// proofing succeeded.
    #[serde(rename = "coreIdentityJWT", default)]
    pub core_identity_jwt: Option<String>,
    /// Non-standard identity-evidence outcomes. Non-empty means no
    /// parsable credential was issued.
    #[serde(rename = "returnCode", default)]
    pub return_codes: Vec<ReturnCode>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<AddressEvidence>,
}

/// A provider-issued return code.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReturnCode {
    pub code: String,
}

impl ReturnCode {
    /// The provider's code for "identity could not be proven with
    /// sufficient evidence".
    pub const INSUFFICIENT_EVIDENCE: &'static str = "X";
}

/// A structured address evidence entry from user-info. An empty
/// `valid_until` marks the current address.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddressEvidence {
    pub uprn: Option<serde_json::Value>,
    pub sub_building_name: String,
    pub building_name: String,
    pub building_number: String,
    pub street_name: String,
    pub dependent_address_locality: String,
    pub address_locality: String,
    pub postal_code: String,
    pub valid_from: String,
    pub valid_until: String,
}

/// Claims of the embedded verifiable-credential JWT.
///
/// `iat` is optional at decode time: its absence is a soft identity
/// failure, not a malformed token.
#[derive(Debug, Deserialize)]
pub struct CoreIdentityClaims {
    pub iat: Option<i64>,
    pub vc: VerifiableCredential,
}

#[derive(Debug, Deserialize)]
pub struct VerifiableCredential {
    #[serde(rename = "credentialSubject")]
    pub credential_subject: CredentialSubject,
}

#[derive(Debug, Deserialize)]
pub struct CredentialSubject {
    #[serde(default)]
    pub name: Vec<CredentialName>,
    /// Ordered by the provider's confidence; the first entry wins.
    #[serde(rename = "birthDate", default)]
    pub birth_date: Vec<CredentialBirthDate>,
}

/// A name assertion with a validity window. An empty `valid_until`
/// means the name has not been superseded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialName {
    #[serde(default)]
    pub valid_from: String,
    #[serde(default)]
    pub valid_until: String,
    #[serde(default)]
    pub name_parts: Vec<NamePart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamePart {
    pub value: String,
    #[serde(rename = "type")]
    pub part_type: NamePartType,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum NamePartType {
    GivenName,
    FamilyName,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CredentialBirthDate {
    pub value: String,
}
