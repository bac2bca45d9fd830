/// Token signing and validation.
///
/// Access and refresh tokens are HS256-signed JWTs. Validation verifies the
/// signature and expiry first, then gates on the embedded `token_type`, so a
/// refresh token can never pass where an access token is expected and vice
/// versa.
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RawClaims, RefreshClaims};
use crate::auth::principal::Principal;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Sign a new access token for an authenticated principal.
///
/// The only failure mode is a signing-key problem, which is a server
/// misconfiguration rather than a client fault.
pub fn issue_access_token(
    principal: &Principal,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = AccessClaims::new(principal, Utc::now().timestamp(), config.access_token_expiry);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
}

/// Sign a refresh token for a ledger entry created by the caller
pub(crate) fn sign_refresh_token(
    user_id: Uuid,
    jti: String,
    issued_at: i64,
    expires_at: i64,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = RefreshClaims::new(user_id, jti, issued_at, expires_at);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
}

/// Verify signature and expiry, returning the undifferentiated claim set
fn decode_token(token: &str, config: &JwtSettings) -> Result<RawClaims, AppError> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<RawClaims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::Auth(AuthError::TokenExpired),
        _ => {
            tracing::warn!("Token validation error: {}", e);
            AppError::Auth(AuthError::TokenMalformed)
        }
    })
}

/// Validate an access token and extract its claims
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<AccessClaims, AppError> {
    decode_token(token, config)?.into_access()
}

/// Validate a refresh token and extract its claims
pub fn validate_refresh_token(
    token: &str,
    config: &JwtSettings,
) -> Result<RefreshClaims, AppError> {
    decode_token(token, config)?.into_refresh()
}

/// Identifier under which a compact token is blacklisted.
///
/// Access tokens carry no jti claim, so the revocation store keys on the
/// SHA-256 digest of the raw token string instead.
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::principal::Role;
    use chrono::Duration;

    fn test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
        }
    }

    fn test_principal() -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: "panda".to_string(),
            email: "panda@example.com".to_string(),
            role: Role::User,
            email_verified: true,
        }
    }

    #[test]
    fn issue_and_validate_access_token() {
        let config = test_config();
        let principal = test_principal();

        let token = issue_access_token(&principal, &config).expect("Failed to issue token");
        let claims = validate_access_token(&token, &config).expect("Failed to validate token");

        assert_eq!(claims.sub, principal.id.to_string());
        assert_eq!(claims.username, "panda");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn garbage_token_is_malformed() {
        let config = test_config();
        match validate_access_token("not.a.token", &config) {
            Err(AppError::Auth(AuthError::TokenMalformed)) => (),
            other => panic!("Expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn tampered_token_is_malformed() {
        let config = test_config();
        let token = issue_access_token(&test_principal(), &config).unwrap();

        let tampered = format!("{}X", token);
        match validate_access_token(&tampered, &config) {
            Err(AppError::Auth(AuthError::TokenMalformed)) => (),
            other => panic!("Expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn wrong_secret_is_malformed() {
        let config = test_config();
        let token = issue_access_token(&test_principal(), &config).unwrap();

        let mut other_config = test_config();
        other_config.secret = "a-completely-different-signing-secret!!".to_string();
        assert!(validate_access_token(&token, &other_config).is_err());
    }

    #[test]
    fn expired_access_token_is_rejected() {
        // A 15-minute token validated 16 minutes after issuance
        let config = test_config();
        let principal = test_principal();
        let issued_at = (Utc::now() - Duration::minutes(16)).timestamp();
        let claims = AccessClaims::new(&principal, issued_at, config.access_token_expiry);

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap();

        match validate_access_token(&token, &config) {
            Err(AppError::Auth(AuthError::TokenExpired)) => (),
            other => panic!("Expected expired, got {:?}", other),
        }
    }

    #[test]
    fn refresh_token_fails_access_validation() {
        let config = test_config();
        let now = Utc::now().timestamp();
        let token = sign_refresh_token(
            Uuid::new_v4(),
            Uuid::new_v4().to_string(),
            now,
            now + config.refresh_token_expiry,
            &config,
        )
        .unwrap();

        match validate_access_token(&token, &config) {
            Err(AppError::Auth(AuthError::TokenTypeMismatch)) => (),
            other => panic!("Expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn access_token_fails_refresh_validation() {
        let config = test_config();
        let token = issue_access_token(&test_principal(), &config).unwrap();

        match validate_refresh_token(&token, &config) {
            Err(AppError::Auth(AuthError::TokenTypeMismatch)) => (),
            other => panic!("Expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn refresh_claims_jti_round_trips() {
        let config = test_config();
        let jti = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let token = sign_refresh_token(
            Uuid::new_v4(),
            jti.clone(),
            now,
            now + config.refresh_token_expiry,
            &config,
        )
        .unwrap();

        let claims = validate_refresh_token(&token, &config).unwrap();
        assert_eq!(claims.jti, jti);
    }

    #[test]
    fn digest_is_stable_and_not_the_token() {
        let token = "header.payload.signature";
        let digest = token_digest(token);
        assert_eq!(digest, token_digest(token));
        assert_ne!(digest, token);
        assert_eq!(digest.len(), 64);
    }
}
