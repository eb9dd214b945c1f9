//! JWT session token creation and verification.
//!
//! Tokens are HS256 JWTs. Besides the identity claims, each token carries a revocation marker in
//! the `jti` claim of the form `"{user_id}:{token_version}"`, captured at issuance. A token whose
//! embedded version is behind the user's stored `token_version` is treated as superseded.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::{
    config::Config,
    errors::Error,
    types::{RoleId, UserId},
};

/// Failures of the token codec itself. The access decision maps both to `Unauthenticated`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token signature invalid, token malformed or expired")]
    InvalidSignatureOrExpired,

    #[error("revocation marker is malformed")]
    MalformedRevocationMarker,
}

/// JWT session claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: UserId,             // Subject (user ID)
    pub username: String,        // Login name
    pub nickname: String,        // Display nickname
    pub kind: i16,               // Account kind tag
    pub is_super_admin: bool,    // Bypasses permission checks
    pub role_ids: Vec<RoleId>,   // Roles at issuance
    pub iss: String,             // Issuer
    pub jti: String,             // Revocation marker "{sub}:{token_version}"
    pub exp: i64,                // Expiration time
    pub iat: i64,                // Issued at
}

/// The user data a session is issued for.
#[derive(Debug, Clone)]
pub struct SessionSubject {
    pub user_id: UserId,
    pub username: String,
    pub nickname: String,
    pub kind: i16,
    pub is_super_admin: bool,
    pub role_ids: Vec<RoleId>,
    pub token_version: i64,
}

/// `(subject_id, token_version)` decoded from a revocation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevocationInfo {
    pub user_id: UserId,
    pub token_version: i64,
}

/// Issues and verifies session tokens under a single process-wide secret.
#[derive(Clone)]
pub struct SessionCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiry: Duration,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("issuer", &self.issuer)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(secret: &str, issuer: impl Into<String>, expiry: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            expiry,
        }
    }

    /// Build the codec from configuration. Fails when no secret key is configured.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let secret_key = config.secret_key.as_ref().ok_or_else(|| Error::Internal {
            operation: "JWT sessions: secret_key is required".to_string(),
        })?;

        Ok(Self::new(secret_key, config.auth.session.issuer.clone(), config.auth.session.expiry))
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Build claims for a subject, valid from now until now + expiry.
    pub fn claims_for(&self, subject: &SessionSubject) -> SessionClaims {
        let now = Utc::now();
        let exp = now + self.expiry;

        SessionClaims {
            sub: subject.user_id,
            username: subject.username.clone(),
            nickname: subject.nickname.clone(),
            kind: subject.kind,
            is_super_admin: subject.is_super_admin,
            role_ids: subject.role_ids.clone(),
            iss: self.issuer.clone(),
            jti: format!("{}:{}", subject.user_id, subject.token_version),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Sign a token for the subject.
    pub fn issue(&self, subject: &SessionSubject) -> Result<String, Error> {
        self.sign(&self.claims_for(subject))
    }

    /// Sign arbitrary claims with HS256.
    pub fn sign(&self, claims: &SessionClaims) -> Result<String, Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| Error::Internal {
            operation: format!("create JWT: {e}"),
        })
    }

    /// Verify signature, structure, algorithm, issuer and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        // Expired means expired: no grace period past `exp`
        validation.leeway = 0;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::trace!("JWT verification failed: {e}");
                AuthError::InvalidSignatureOrExpired
            })
    }
}

/// Decode the `jti` revocation marker. It must be exactly two colon-separated non-negative
/// integers, the first of which names the same subject as `sub`.
pub fn extract_revocation_info(claims: &SessionClaims) -> Result<RevocationInfo, AuthError> {
    let mut parts = claims.jti.split(':');
    let (Some(user_part), Some(version_part), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthError::MalformedRevocationMarker);
    };

    let user_id = parse_non_negative(user_part)?;
    let token_version = parse_non_negative(version_part)?;

    if user_id != claims.sub {
        return Err(AuthError::MalformedRevocationMarker);
    }

    Ok(RevocationInfo { user_id, token_version })
}

fn parse_non_negative(part: &str) -> Result<i64, AuthError> {
    // Digits only: `u64::from_str` would also take a leading `+`
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthError::MalformedRevocationMarker);
    }
    part.parse::<u64>()
        .ok()
        .and_then(|v| i64::try_from(v).ok())
        .ok_or(AuthError::MalformedRevocationMarker)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-for-jwt";

    fn create_test_codec() -> SessionCodec {
        SessionCodec::new(SECRET, "adminctl", Duration::from_secs(24 * 60 * 60))
    }

    fn create_test_subject() -> SessionSubject {
        SessionSubject {
            user_id: 42,
            username: "alice".to_string(),
            nickname: "Alice".to_string(),
            kind: 1,
            is_super_admin: false,
            role_ids: vec![3, 1, 2],
            token_version: 5,
        }
    }

    #[test]
    fn test_issue_and_verify_reproduces_claims() {
        let codec = create_test_codec();
        let subject = create_test_subject();

        let token = codec.issue(&subject).unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.nickname, "Alice");
        assert_eq!(claims.kind, 1);
        assert!(!claims.is_super_admin);
        assert_eq!(claims.role_ids, vec![3, 1, 2]);
        assert_eq!(claims.jti, "42:5");
        assert_eq!(claims.iss, "adminctl");
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);

        let info = extract_revocation_info(&claims).unwrap();
        assert_eq!(
            info,
            RevocationInfo {
                user_id: 42,
                token_version: 5
            }
        );
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let codec = create_test_codec();
        let token = codec.issue(&create_test_subject()).unwrap();

        let other = SessionCodec::new("different-secret", "adminctl", Duration::from_secs(3600));
        assert_eq!(other.verify(&token), Err(AuthError::InvalidSignatureOrExpired));
    }

    #[test]
    fn test_verify_tampered_payload() {
        let codec = create_test_codec();
        let token = codec.issue(&create_test_subject()).unwrap();

        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let forged = create_test_codec().claims_for(&SessionSubject {
            is_super_admin: true,
            ..create_test_subject()
        });
        let forged_token = codec.sign(&forged).unwrap();
        parts[1] = forged_token.split('.').nth(1).unwrap().to_string();

        assert_eq!(codec.verify(&parts.join(".")), Err(AuthError::InvalidSignatureOrExpired));
    }

    #[test]
    fn test_verify_expired_token() {
        let codec = create_test_codec();
        let mut claims = codec.claims_for(&create_test_subject());
        let now = Utc::now();
        claims.iat = (now - chrono::Duration::seconds(7200)).timestamp();
        claims.exp = (now - chrono::Duration::seconds(3600)).timestamp();

        let token = codec.sign(&claims).unwrap();
        assert_eq!(codec.verify(&token), Err(AuthError::InvalidSignatureOrExpired));
    }

    #[test]
    fn test_verify_just_expired_token() {
        let codec = create_test_codec();
        let mut claims = codec.claims_for(&create_test_subject());
        let now = Utc::now();
        claims.iat = (now - chrono::Duration::seconds(60)).timestamp();
        claims.exp = (now - chrono::Duration::seconds(5)).timestamp();

        let token = codec.sign(&claims).unwrap();
        assert_eq!(codec.verify(&token), Err(AuthError::InvalidSignatureOrExpired));
    }

    #[test]
    fn test_verify_wrong_issuer() {
        let codec = create_test_codec();
        let other = SessionCodec::new(SECRET, "someone-else", Duration::from_secs(3600));
        let token = other.issue(&create_test_subject()).unwrap();

        assert_eq!(codec.verify(&token), Err(AuthError::InvalidSignatureOrExpired));
    }

    #[test]
    fn test_verify_rejects_other_algorithms() {
        let codec = create_test_codec();
        let claims = codec.claims_for(&create_test_subject());
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(codec.verify(&token), Err(AuthError::InvalidSignatureOrExpired));
    }

    #[test]
    fn test_verify_malformed_token() {
        let codec = create_test_codec();

        for token in ["not.a.token", "invalid", "", "too.many.parts.in.this.token"] {
            assert_eq!(
                codec.verify(token),
                Err(AuthError::InvalidSignatureOrExpired),
                "Expected InvalidSignatureOrExpired for token: {token}"
            );
        }
    }

    #[test]
    fn test_malformed_revocation_markers() {
        let codec = create_test_codec();
        let base = codec.claims_for(&create_test_subject());

        for marker in ["", "42", "42:", ":5", "42:5:1", "42:-1", "-42:5", "42:x", "x:5", " 42:5", "42:5 ", "+42:5", "42:+5"] {
            let claims = SessionClaims {
                jti: marker.to_string(),
                ..base.clone()
            };
            assert_eq!(
                extract_revocation_info(&claims),
                Err(AuthError::MalformedRevocationMarker),
                "marker {marker:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_revocation_marker_must_name_subject() {
        let codec = create_test_codec();
        let claims = SessionClaims {
            jti: "43:5".to_string(),
            ..codec.claims_for(&create_test_subject())
        };

        assert_eq!(extract_revocation_info(&claims), Err(AuthError::MalformedRevocationMarker));
    }
}
