// src/session.rs

use crate::error::AttestOidcError;

/// The correlation record stored at login start and consumed exactly
/// once when the provider redirects back.
///
/// The session store itself lives outside this crate; callers load the
/// record by cookie key and must call [`CorrelationSession::validate`]
/// before trusting any token from the callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationSession {
    /// The opaque `state` value echoed by the provider.
    pub state: String,
    /// The nonce bound into the ID token at exchange.
    pub nonce: String,
    /// The UI locale requested at login.
    pub locale: String,
    /// Where the surrounding flow resumes after the callback.
    pub redirect: String,
    /// Correlation ID threaded through logs for this login attempt.
    pub correlation_id: String,
}

impl CorrelationSession {
    /// Checks the session is usable: state, nonce and redirect target
    /// must all be present.
    pub fn validate(&self) -> Result<(), AttestOidcError> {
        if self.state.is_empty() {
            return Err(AttestOidcError::InvalidSession("empty state".to_string()));
        }
        if self.nonce.is_empty() {
            return Err(AttestOidcError::InvalidSession("empty nonce".to_string()));
        }
        if self.redirect.is_empty() {
            return Err(AttestOidcError::InvalidSession(
                "empty redirect target".to_string(),
            ));
        }
        Ok(())
    }

    /// Compares the provider-echoed `state` against the stored one.
    pub fn matches_state(&self, state: &str) -> bool {
        !self.state.is_empty() && self.state == state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> CorrelationSession {
        CorrelationSession {
            state: "state-123".to_string(),
            nonce: "nonce-456".to_string(),
            locale: "en".to_string(),
            redirect: "/task-list".to_string(),
            correlation_id: "corr-1".to_string(),
        }
    }

    #[test]
    fn validate_accepts_complete_session() {
        assert!(session().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_fields() {
        let strips: [fn(&mut CorrelationSession); 3] = [
            |s| s.state.clear(),
            |s| s.nonce.clear(),
            |s| s.redirect.clear(),
        ];
        for strip in strips {
            let mut s = session();
            strip(&mut s);
            assert!(matches!(s.validate(), Err(AttestOidcError::InvalidSession(_))));
        }
    }

    #[test]
    fn state_comparison_rejects_empty_and_mismatched() {
        assert!(session().matches_state("state-123"));
        assert!(!session().matches_state("state-999"));
        assert!(!CorrelationSession::default().matches_state(""));
    }
}
