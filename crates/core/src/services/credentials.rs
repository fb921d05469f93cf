//! Credential service: password hashing and signed token issuance.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind,
};
use placement_common::{AppError, AppResult, IdGenerator, config::AuthConfig};
use serde::{Deserialize, Serialize};

/// Checked in place of a stored hash when a login names no account.
static ABSENT_ACCOUNT_HASH: LazyLock<Option<String>> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"no account has this password", &salt)
        .ok()
        .map(|h| h.to_string())
});

/// Which half of a token pair a JWT is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Access and refresh tokens issued together.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Stateless apart from the signing secret.
#[derive(Clone)]
pub struct CredentialService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    id_gen: IdGenerator,
}

impl CredentialService {
    /// Create a credential service from the auth configuration.
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl_secs: config.access_token_ttl_secs,
            refresh_ttl_secs: config.refresh_token_ttl_secs,
            id_gen: IdGenerator::new(),
        }
    }

    /// Hash a password using Argon2.
    pub fn hash(&self, plaintext: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
    }

    /// Verify a password against a stored hash.
    pub fn verify(&self, plaintext: &str, hash: &str) -> AppResult<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

        Ok(Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Spend one password verification without a stored hash.
    ///
    /// Logins for unknown emails call this so they take as long as a wrong
    /// password for a known one.
    pub fn verify_absent(&self, plaintext: &str) {
        if let Some(hash) = ABSENT_ACCOUNT_HASH.as_deref() {
            let _ = self.verify(plaintext, hash);
        }
    }

    /// Issue a fresh access/refresh pair for an account.
    pub fn issue_tokens(&self, account_id: &str) -> AppResult<TokenPair> {
        let now = Utc::now().timestamp();

        let access_token = self.sign(&Claims {
            sub: account_id.to_string(),
            kind: TokenKind::Access,
            iat: now,
            exp: now + self.access_ttl_secs,
            jti: self.id_gen.generate_token(),
        })?;
        let refresh_token = self.sign(&Claims {
            sub: account_id.to_string(),
            kind: TokenKind::Refresh,
            iat: now,
            exp: now + self.refresh_ttl_secs,
            jti: self.id_gen.generate_token(),
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.access_ttl_secs,
        })
    }

    /// Verify an access token and return its account id.
    pub fn verify_access_token(&self, token: &str) -> AppResult<String> {
        self.verify_token(token, TokenKind::Access)
    }

    /// Verify a refresh token and return its account id.
    pub fn verify_refresh_token(&self, token: &str) -> AppResult<String> {
        self.verify_token(token, TokenKind::Refresh)
    }

    /// Verify signature, expiry and kind.
    ///
    /// Fails with [`AppError::Expired`] past `exp` and
    /// [`AppError::InvalidCredential`] for anything else wrong.
    pub fn verify_token(&self, token: &str, expected: TokenKind) -> AppResult<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AppError::Expired,
                _ => AppError::InvalidCredential(e.to_string()),
            })?;

        if data.claims.kind != expected {
            return Err(AppError::InvalidCredential(format!(
                "expected {expected:?} token"
            )));
        }

        Ok(data.claims.sub)
    }

    fn sign(&self, claims: &Claims) -> AppResult<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_auth_config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-test-secret-test-secret".to_string(),
            access_token_ttl_secs: 900,
            refresh_token_ttl_secs: 3600,
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let service = CredentialService::new(&test_auth_config());
        let hash = service.hash("correct horse").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(service.verify("correct horse", &hash).unwrap());
        assert!(!service.verify("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_absent_account_hash_is_well_formed() {
        let service = CredentialService::new(&test_auth_config());
        let hash = ABSENT_ACCOUNT_HASH.as_deref().unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!service.verify("correct horse", hash).unwrap());
        service.verify_absent("correct horse");
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        let service = CredentialService::new(&test_auth_config());
        assert!(service.verify("anything", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_issue_and_verify_access_token() {
        let service = CredentialService::new(&test_auth_config());
        let pair = service.issue_tokens("acc1").unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 900);
        assert_eq!(service.verify_access_token(&pair.access_token).unwrap(), "acc1");
        assert_eq!(service.verify_refresh_token(&pair.refresh_token).unwrap(), "acc1");
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let service = CredentialService::new(&test_auth_config());
        let pair = service.issue_tokens("acc1").unwrap();

        assert!(matches!(
            service.verify_access_token(&pair.refresh_token),
            Err(AppError::InvalidCredential(_))
        ));
        assert!(matches!(
            service.verify_refresh_token(&pair.access_token),
            Err(AppError::InvalidCredential(_))
        ));
    }

    #[test]
    fn test_expired_token() {
        let service = CredentialService::new(&test_auth_config());
        let now = Utc::now().timestamp();
        let token = service
            .sign(&Claims {
                sub: "acc1".to_string(),
                kind: TokenKind::Access,
                iat: now - 120,
                exp: now - 60,
                jti: "j".to_string(),
            })
            .unwrap();

        assert!(matches!(
            service.verify_access_token(&token),
            Err(AppError::Expired)
        ));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let service = CredentialService::new(&test_auth_config());
        let other = CredentialService::new(&AuthConfig {
            jwt_secret: "another-secret-another-secret-another".to_string(),
            ..test_auth_config()
        });
        let pair = other.issue_tokens("acc1").unwrap();

        assert!(matches!(
            service.verify_access_token(&pair.access_token),
            Err(AppError::InvalidCredential(_))
        ));
        assert!(matches!(
            service.verify_access_token("garbage"),
            Err(AppError::InvalidCredential(_))
        ));
    }
}
