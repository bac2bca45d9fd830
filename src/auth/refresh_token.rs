/// Refresh-token ledger and rotation.
///
/// Every issued refresh token has exactly one durable ledger row, keyed by
/// its `jti`. Rotation revokes the old row and issues a fresh pair; rotated
/// rows are kept for audit, never deleted. The revoke step is a conditional
/// update, so concurrent rotations of the same token produce exactly one
/// winner.
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::jwt::{issue_access_token, sign_refresh_token};
use crate::auth::principal::{Principal, Role};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Access/refresh pair returned by login and rotation
#[derive(Debug)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Persist a new ledger row and sign the matching refresh token.
///
/// `supersedes` records the jti of the token this one replaces (rotation
/// audit chain); None for tokens issued at login.
pub async fn issue_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    supersedes: Option<&str>,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let jti = Uuid::new_v4().to_string();
    let issued_at = Utc::now();
    let expires_at = issued_at + Duration::seconds(config.refresh_token_expiry);

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, jti, user_id, is_revoked, supersedes, expires_at, created_at, updated_at)
        VALUES ($1, $2, $3, FALSE, $4, $5, $6, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&jti)
    .bind(user_id)
    .bind(supersedes)
    .bind(expires_at)
    .bind(issued_at)
    .execute(pool)
    .await?;

    sign_refresh_token(
        user_id,
        jti,
        issued_at.timestamp(),
        expires_at.timestamp(),
        config,
    )
}

/// Issue a fresh access/refresh pair for an authenticated principal (login)
pub async fn issue_token_pair(
    pool: &PgPool,
    principal: &Principal,
    config: &JwtSettings,
) -> Result<TokenPair, AppError> {
    let access_token = issue_access_token(principal, config)?;
    let refresh_token = issue_refresh_token(pool, principal.id, None, config).await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Rotate a refresh token: revoke the old ledger row and issue a new pair.
///
/// Failure modes, in evaluation order: the JWT itself is malformed, expired
/// or mistyped; the ledger row is missing (`TokenNotFound`); the row expired
/// server-side (`TokenExpired`); the row was already revoked
/// (`TokenRevoked`). A replayed rotation loses the conditional update and
/// surfaces as `TokenRevoked`.
pub async fn rotate_refresh_token(
    pool: &PgPool,
    token: &str,
    config: &JwtSettings,
) -> Result<TokenPair, AppError> {
    let claims = crate::auth::jwt::validate_refresh_token(token, config)?;

    let record = sqlx::query_as::<_, (Uuid, DateTime<Utc>, bool)>(
        "SELECT user_id, expires_at, is_revoked FROM refresh_tokens WHERE jti = $1",
    )
    .bind(&claims.jti)
    .fetch_optional(pool)
    .await?;

    let (user_id, expires_at, is_revoked) = match record {
        Some(record) => record,
        None => {
            tracing::warn!("Refresh token absent from ledger");
            return Err(AppError::Auth(AuthError::TokenNotFound));
        }
    };

    if expires_at < Utc::now() {
        tracing::info!(user_id = %user_id, "Refresh token expired server-side");
        return Err(AppError::Auth(AuthError::TokenExpired));
    }

    if is_revoked {
        tracing::warn!(user_id = %user_id, "Attempt to reuse a revoked refresh token");
        return Err(AppError::Auth(AuthError::TokenRevoked));
    }

    // Conditional revoke: of N concurrent rotations of this token, exactly
    // one observes a row flip here; the rest get zero rows affected.
    let revoked = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = TRUE, updated_at = $1
        WHERE jti = $2 AND is_revoked = FALSE
        "#,
    )
    .bind(Utc::now())
    .bind(&claims.jti)
    .execute(pool)
    .await?;

    if revoked.rows_affected() == 0 {
        tracing::warn!(user_id = %user_id, "Lost rotation race on refresh token");
        return Err(AppError::Auth(AuthError::TokenRevoked));
    }

    let principal = load_principal(pool, user_id).await?;
    let access_token = issue_access_token(&principal, config)?;
    let refresh_token = issue_refresh_token(pool, user_id, Some(&claims.jti), config).await?;

    tracing::info!(user_id = %user_id, "Refresh token rotated");

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Mark a ledger row revoked (logout). Idempotent: revoking an
/// already-revoked or unknown jti is a no-op.
pub async fn revoke_by_jti(pool: &PgPool, jti: &str) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = TRUE, updated_at = $1
        WHERE jti = $2 AND is_revoked = FALSE
        "#,
    )
    .bind(Utc::now())
    .bind(jti)
    .execute(pool)
    .await?;

    Ok(())
}

async fn load_principal(pool: &PgPool, user_id: Uuid) -> Result<Principal, AppError> {
    let row = sqlx::query_as::<_, (Uuid, String, String, String, bool)>(
        "SELECT id, username, email, role, is_email_verified FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::Auth(AuthError::TokenNotFound))?;

    let role = row
        .3
        .parse::<Role>()
        .map_err(|e| AppError::Internal(format!("Corrupt role column: {}", e)))?;

    Ok(Principal {
        id: row.0,
        username: row.1,
        email: row.2,
        role,
        email_verified: row.4,
    })
}
