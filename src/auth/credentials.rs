/// Credential verification for local (username/password) logins.
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::password::verify_password;
use crate::auth::principal::{Principal, Role};
use crate::error::{AppError, AuthError};

/// Check a username/password pair against the stored LOCAL identity.
///
/// Unknown username and wrong password fail with the same opaque error so
/// the endpoint cannot be used to enumerate accounts.
pub async fn authenticate(
    pool: &PgPool,
    username: &str,
    password: &str,
) -> Result<Principal, AppError> {
    let row = sqlx::query_as::<_, (Option<String>, Uuid, String, String, String, bool)>(
        r#"
        SELECT ai.password_hash, u.id, u.username, u.email, u.role, u.is_email_verified
        FROM auth_identities ai
        JOIN users u ON u.id = ai.user_id
        WHERE ai.provider = 'LOCAL' AND ai.provider_user_id = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    let (password_hash, user_id, username, email, role, is_email_verified) = match row {
        Some(row) => row,
        None => {
            tracing::warn!("Login attempt for unknown username");
            return Err(AppError::Auth(AuthError::InvalidCredentials));
        }
    };

    let password_hash = password_hash.ok_or(AppError::Auth(AuthError::InvalidCredentials))?;

    if !verify_password(password, &password_hash)? {
        tracing::warn!(user_id = %user_id, "Login attempt with wrong password");
        return Err(AppError::Auth(AuthError::InvalidCredentials));
    }

    let role = role
        .parse::<Role>()
        .map_err(|e| AppError::Internal(format!("Corrupt role column: {}", e)))?;

    Ok(Principal {
        id: user_id,
        username,
        email,
        role,
        email_verified: is_email_verified,
    })
}
