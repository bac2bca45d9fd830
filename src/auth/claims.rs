/// JWT claim sets for access and refresh tokens.
///
/// Two distinct claim shapes are signed: access tokens carry the facts needed
/// to reconstruct a Principal without a database read; refresh tokens carry
/// only the subject and the `jti` correlating them with the durable ledger.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::principal::{Principal, Role};
use crate::error::{AppError, AuthError};

/// Discriminates access from refresh tokens inside the signed payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessClaims {
    pub fn new(principal: &Principal, issued_at: i64, expiry_seconds: i64) -> Self {
        Self {
            sub: principal.id.to_string(),
            username: principal.username.clone(),
            email: principal.email.clone(),
            role: principal.role,
            token_type: TokenType::Access,
            iat: issued_at,
            exp: issued_at + expiry_seconds,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenMalformed))
    }

    /// Rebuild the request principal from verified claims.
    ///
    /// Tokens are only issued to verified accounts that completed login, so
    /// the reconstructed principal is marked email-verified.
    pub fn to_principal(&self) -> Result<Principal, AppError> {
        Ok(Principal {
            id: self.user_id()?,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            email_verified: true,
        })
    }

    /// Seconds until natural expiry, clamped at zero
    pub fn remaining_lifetime(&self, now: i64) -> i64 {
        (self.exp - now).max(0)
    }
}

/// Claims carried by a refresh token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    /// Unique token identifier correlating with the durable ledger record
    pub jti: String,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, jti: String, issued_at: i64, expires_at: i64) -> Self {
        Self {
            sub: user_id.to_string(),
            jti,
            token_type: TokenType::Refresh,
            iat: issued_at,
            exp: expires_at,
        }
    }

    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenMalformed))
    }
}

/// Decode target for a token of unknown type.
///
/// Mirrors the extract-then-check flow: signature and expiry are verified
/// first, the token_type gate runs second, and only then are the
/// type-specific fields required.
#[derive(Debug, Deserialize)]
pub struct RawClaims {
    pub sub: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub jti: Option<String>,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

impl RawClaims {
    pub fn into_access(self) -> Result<AccessClaims, AppError> {
        if self.token_type != TokenType::Access {
            return Err(AppError::Auth(AuthError::TokenTypeMismatch));
        }
        match (self.username, self.email, self.role) {
            (Some(username), Some(email), Some(role)) => Ok(AccessClaims {
                sub: self.sub,
                username,
                email,
                role,
                token_type: TokenType::Access,
                iat: self.iat,
                exp: self.exp,
            }),
            _ => Err(AppError::Auth(AuthError::TokenMalformed)),
        }
    }

    pub fn into_refresh(self) -> Result<RefreshClaims, AppError> {
        if self.token_type != TokenType::Refresh {
            return Err(AppError::Auth(AuthError::TokenTypeMismatch));
        }
        match self.jti {
            Some(jti) => Ok(RefreshClaims {
                sub: self.sub,
                jti,
                token_type: TokenType::Refresh,
                iat: self.iat,
                exp: self.exp,
            }),
            None => Err(AppError::Auth(AuthError::TokenMalformed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn access_claims_carry_exact_keys() {
        let principal = test_principal();
        let claims = AccessClaims::new(&principal, 1_700_000_000, 900);

        let value = serde_json::to_value(&claims).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["email", "exp", "iat", "role", "sub", "token_type", "username"]
        );
        assert_eq!(object["token_type"], "ACCESS");
        assert_eq!(object["role"], "USER");
        assert_eq!(object["exp"], 1_700_000_900);
    }

    #[test]
    fn refresh_claims_carry_exact_keys() {
        let claims = RefreshClaims::new(
            Uuid::new_v4(),
            Uuid::new_v4().to_string(),
            1_700_000_000,
            1_700_604_800,
        );

        let value = serde_json::to_value(&claims).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["exp", "iat", "jti", "sub", "token_type"]);
        assert_eq!(value["token_type"], "REFRESH");
    }

    #[test]
    fn principal_reconstruction_round_trips() {
        let principal = test_principal();
        let claims = AccessClaims::new(&principal, 1_700_000_000, 900);

        let rebuilt = claims.to_principal().unwrap();
        assert_eq!(rebuilt.id, principal.id);
        assert_eq!(rebuilt.username, principal.username);
        assert_eq!(rebuilt.email, principal.email);
        assert_eq!(rebuilt.role, principal.role);
    }

    #[test]
    fn mistyped_token_is_rejected_before_field_checks() {
        let raw = RawClaims {
            sub: Uuid::new_v4().to_string(),
            username: None,
            email: None,
            role: None,
            jti: Some(Uuid::new_v4().to_string()),
            token_type: TokenType::Refresh,
            iat: 0,
            exp: i64::MAX,
        };
        match raw.into_access() {
            Err(AppError::Auth(AuthError::TokenTypeMismatch)) => (),
            other => panic!("Expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn refresh_without_jti_is_malformed() {
        let raw = RawClaims {
            sub: Uuid::new_v4().to_string(),
            username: None,
            email: None,
            role: None,
            jti: None,
            token_type: TokenType::Refresh,
            iat: 0,
            exp: i64::MAX,
        };
        match raw.into_refresh() {
            Err(AppError::Auth(AuthError::TokenMalformed)) => (),
            other => panic!("Expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn remaining_lifetime_clamps_at_zero() {
        let principal = test_principal();
        let claims = AccessClaims::new(&principal, 1_700_000_000, 900);
        assert_eq!(claims.remaining_lifetime(1_700_000_000), 900);
        assert_eq!(claims.remaining_lifetime(1_700_000_600), 300);
        assert_eq!(claims.remaining_lifetime(1_700_999_999), 0);
    }
}
