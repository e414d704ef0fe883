// src/identity.rs

//! Verification of the embedded verifiable-credential JWT and
//! extraction of confirmed identity attributes.

use crate::config::ValidationDetails;
use crate::error::AttestOidcError;
use crate::model::{AddressEvidence, CoreIdentityClaims, NamePartType, ReturnCode, UserInfo};
use crate::resolver::DidResolver;
use chrono::{DateTime, NaiveDate, Utc};
use jsonwebtoken::{decode, decode_header, Validation};
use tracing::{debug, warn};

/// Where an identity check stands.
///
/// `Failed` and `InsufficientEvidence` are normal outcomes that route
/// the user to an alternate identity path, not errors. `Expired` is
/// assigned by callers applying their own staleness policy to
/// `retrieved_at`; this crate never produces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentityStatus {
    #[default]
    Unknown,
    Confirmed,
    Failed,
    InsufficientEvidence,
    Expired,
}

/// The confirmed identity attributes extracted from a verified
/// credential, or the status explaining their absence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUserData {
    pub status: IdentityStatus,
    /// Given names in credential order, space-joined.
    pub first_names: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    /// When the provider issued the credential.
    pub retrieved_at: Option<DateTime<Utc>>,
    pub current_address: Option<Address>,
}

impl IdentityUserData {
    fn with_status(status: IdentityStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    /// Compares the verified name against a self-declared one. See
    /// [`crate::name::match_name`].
    pub fn matches_declared_name(&self, first_names: &str, last_name: &str) -> bool {
        crate::name::match_name(&self.first_names, &self.last_name, first_names, last_name)
    }
}

/// A canonical postal address assembled from structured evidence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Address {
    pub line1: String,
    pub line2: String,
    pub line3: String,
    pub town: String,
    pub postcode: String,
}

impl AddressEvidence {
    /// Transforms structured address fields into canonical lines.
    ///
    /// With a building name, the sub-building and building name share
    /// line 1 and the number/street pair moves to line 2; otherwise the
    /// number/street pair is line 1. A dependent locality always takes
    /// the next free line.
    pub fn to_address(&self) -> Address {
        let number_and_street = join_parts(&self.building_number, &self.street_name);

        let (line1, line2, line3) = if self.building_name.is_empty() {
            (
                number_and_street,
                self.dependent_address_locality.clone(),
                String::new(),
            )
        } else {
            (
                join_parts(&self.sub_building_name, &self.building_name),
                number_and_street,
                self.dependent_address_locality.clone(),
            )
        };

        Address {
            line1,
            line2,
            line3,
            town: self.address_locality.clone(),
            postcode: self.postal_code.clone(),
        }
    }
}

fn join_parts(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{a} {b}"),
    }
}

/// Validates the embedded credential JWT against a DID-resolved key and
/// extracts identity attributes or a failure status.
///
/// Key-resolution and transport failures surface as errors; a
/// credential that verifies but lacks usable claims, or one that fails
/// signature/claims validation, is a soft `Failed` result. A credential
/// that is not structurally a JWT at all is a hard error, like a
/// missing one: both break the provider contract rather than report an
/// identity-proofing outcome.
pub(crate) fn parse_identity_claim(
    did: &DidResolver,
    validation: &ValidationDetails,
    user_info: &UserInfo,
) -> Result<IdentityUserData, AttestOidcError> {
    if user_info
        .return_codes
        .iter()
        .any(|rc| rc.code == ReturnCode::INSUFFICIENT_EVIDENCE)
    {
        debug!("UserInfo carries an insufficient-evidence return code");
        return Ok(IdentityUserData::with_status(
            IdentityStatus::InsufficientEvidence,
        ));
    }
    if !user_info.return_codes.is_empty() {
        debug!(codes = ?user_info.return_codes, "UserInfo carries failure return codes");
        return Ok(IdentityUserData::with_status(IdentityStatus::Failed));
    }

    let token = user_info
        .core_identity_jwt
        .as_deref()
        .filter(|jwt| !jwt.is_empty())
        .ok_or(AttestOidcError::MissingCoreIdentity)?;

    let header = decode_header(token)?;
    // Algorithm-confusion defense: only the expected asymmetric family
    // may reach signature verification.
    if !validation.credential_algorithms.contains(&header.alg) {
        return Err(AttestOidcError::UnsupportedAlgorithm(header.alg));
    }
    let kid = header.kid.ok_or(AttestOidcError::MissingKeyId)?;
    let key = did.for_kid(&kid)?;

    let mut options = Validation::new(header.alg);
    options.leeway = validation.leeway.as_secs();
    options.validate_exp = false;
    options.validate_aud = false;
    options.set_required_spec_claims::<&str>(&[]);

    let claims = match decode::<CoreIdentityClaims>(token, &key, &options) {
        Ok(data) => data.claims,
        Err(e) => {
            warn!("Core identity JWT failed validation: {e}");
            return Ok(IdentityUserData::with_status(IdentityStatus::Failed));
        }
    };

    Ok(identity_from_claims(&claims, user_info))
}

/// Turns validated credential claims into identity attributes. Missing
/// issued-at, an empty current name, or an unusable birth date all
/// yield a `Failed` status rather than an error.
fn identity_from_claims(claims: &CoreIdentityClaims, user_info: &UserInfo) -> IdentityUserData {
    let Some(retrieved_at) = claims.iat.and_then(|iat| DateTime::from_timestamp(iat, 0)) else {
        warn!("Core identity JWT has no usable issued-at claim");
        return IdentityUserData::with_status(IdentityStatus::Failed);
    };

    // The current name is the entry not yet superseded.
    let current_name = claims
        .vc
        .credential_subject
        .name
        .iter()
        .find(|name| name.valid_until.is_empty());
    let Some(current_name) = current_name.filter(|name| !name.name_parts.is_empty()) else {
        warn!("Core identity JWT has no current name");
        return IdentityUserData::with_status(IdentityStatus::Failed);
    };

    // Birth dates are ordered by confidence; only the first is used.
    let date_of_birth = claims
        .vc
        .credential_subject
        .birth_date
        .first()
        .and_then(|bd| NaiveDate::parse_from_str(&bd.value, "%Y-%m-%d").ok());
    let Some(date_of_birth) = date_of_birth else {
        warn!("Core identity JWT has no usable birth date");
        return IdentityUserData::with_status(IdentityStatus::Failed);
    };

    let mut given_names = Vec::new();
    let mut family_names = Vec::new();
    for part in &current_name.name_parts {
        match part.part_type {
            NamePartType::GivenName => given_names.push(part.value.as_str()),
            NamePartType::FamilyName => family_names.push(part.value.as_str()),
        }
    }

    let current_address = user_info
        .addresses
        .iter()
        .find(|address| address.valid_until.is_empty())
        .map(AddressEvidence::to_address);

    IdentityUserData {
        status: IdentityStatus::Confirmed,
        first_names: given_names.join(" "),
        last_name: family_names.join(" "),
        date_of_birth: Some(date_of_birth),
        retrieved_at: Some(retrieved_at),
        current_address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CredentialBirthDate, CredentialName, CredentialSubject, NamePart, VerifiableCredential};

    fn name_part(value: &str, part_type: NamePartType) -> NamePart {
        NamePart {
            value: value.to_string(),
            part_type,
        }
    }

    fn claims(names: Vec<CredentialName>, birth_dates: Vec<&str>) -> CoreIdentityClaims {
        CoreIdentityClaims {
            iat: Some(1_700_000_000),
            vc: VerifiableCredential {
                credential_subject: CredentialSubject {
                    name: names,
                    birth_date: birth_dates
                        .into_iter()
                        .map(|value| CredentialBirthDate {
                            value: value.to_string(),
                        })
                        .collect(),
                },
            },
        }
    }

    fn user_info() -> UserInfo {
        UserInfo {
            sub: "sub-1".to_string(),
            email: "a@example.com".to_string(),
            email_verified: true,
            phone: String::new(),
            phone_verified: false,
            core_identity_jwt: None,
            return_codes: vec![],
            addresses: vec![],
        }
    }

    #[test]
    fn current_name_is_the_unsuperseded_entry() {
        let superseded = CredentialName {
            valid_from: "2000-01-01".to_string(),
            valid_until: "2020-05-01".to_string(),
            name_parts: vec![
                name_part("Old", NamePartType::GivenName),
                name_part("Name", NamePartType::FamilyName),
            ],
        };
        let current = CredentialName {
            valid_from: "2020-05-01".to_string(),
            valid_until: String::new(),
            name_parts: vec![
                name_part("Sam", NamePartType::GivenName),
                name_part("Row", NamePartType::GivenName),
                name_part("Smith", NamePartType::FamilyName),
            ],
        };

        let data = identity_from_claims(&claims(vec![superseded, current], vec!["2000-01-02"]), &user_info());

        assert_eq!(data.status, IdentityStatus::Confirmed);
        assert_eq!(data.first_names, "Sam Row");
        assert_eq!(data.last_name, "Smith");
        assert_eq!(data.date_of_birth, NaiveDate::from_ymd_opt(2000, 1, 2));
        assert_eq!(
            data.retrieved_at,
            DateTime::from_timestamp(1_700_000_000, 0)
        );
    }

    #[test]
    fn missing_issued_at_fails_softly() {
        let mut c = claims(vec![], vec!["2000-01-02"]);
        c.iat = None;
        let data = identity_from_claims(&c, &user_info());
        assert_eq!(data.status, IdentityStatus::Failed);
    }

    #[test]
    fn empty_name_parts_fail_softly() {
        let nameless = CredentialName {
            valid_from: String::new(),
            valid_until: String::new(),
            name_parts: vec![],
        };
        let data = identity_from_claims(&claims(vec![nameless], vec!["2000-01-02"]), &user_info());
        assert_eq!(data.status, IdentityStatus::Failed);
    }

    #[test]
    fn unparsable_birth_date_fails_softly() {
        let current = CredentialName {
            valid_from: String::new(),
            valid_until: String::new(),
            name_parts: vec![
                name_part("Sam", NamePartType::GivenName),
                name_part("Smith", NamePartType::FamilyName),
            ],
        };
        let data = identity_from_claims(&claims(vec![current], vec!["02/01/2000"]), &user_info());
        assert_eq!(data.status, IdentityStatus::Failed);
    }

    #[test]
    fn current_address_is_selected_and_transformed() {
        let current = CredentialName {
            valid_from: String::new(),
            valid_until: String::new(),
            name_parts: vec![
                name_part("Sam", NamePartType::GivenName),
                name_part("Smith", NamePartType::FamilyName),
            ],
        };
        let mut info = user_info();
        info.addresses = vec![
            AddressEvidence {
                building_number: "1".to_string(),
                street_name: "Old Road".to_string(),
                address_locality: "Oldtown".to_string(),
                postal_code: "OL1 1AA".to_string(),
                valid_until: "2019-01-01".to_string(),
                ..Default::default()
            },
            AddressEvidence {
                sub_building_name: "Flat 2".to_string(),
                building_name: "Rose Court".to_string(),
                building_number: "3".to_string(),
                street_name: "New Street".to_string(),
                dependent_address_locality: "Hamlet".to_string(),
                address_locality: "Newtown".to_string(),
                postal_code: "NE1 1AA".to_string(),
                ..Default::default()
            },
        ];

        let data = identity_from_claims(&claims(vec![current], vec!["2000-01-02"]), &info);
        let address = data.current_address.unwrap();
        assert_eq!(address.line1, "Flat 2 Rose Court");
        assert_eq!(address.line2, "3 New Street");
        assert_eq!(address.line3, "Hamlet");
        assert_eq!(address.town, "Newtown");
        assert_eq!(address.postcode, "NE1 1AA");
    }

    #[test]
    fn address_without_building_name_puts_street_on_line_one() {
        let evidence = AddressEvidence {
            building_number: "12".to_string(),
            street_name: "High Street".to_string(),
            dependent_address_locality: "Hamlet".to_string(),
            address_locality: "Town".to_string(),
            postal_code: "T1 1AA".to_string(),
            ..Default::default()
        };
        let address = evidence.to_address();
        assert_eq!(address.line1, "12 High Street");
        assert_eq!(address.line2, "Hamlet");
        assert_eq!(address.line3, "");
    }
}
