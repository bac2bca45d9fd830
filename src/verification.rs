/// E-mail verification codes.
///
/// A registration produces a 6-digit code bound to the user with a
/// 15-minute expiry. Codes are single-use: consuming one marks it used and
/// flips the user's verified flag in the same transaction.
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, DomainError};

const CODE_EXPIRY_MINUTES: i64 = 15;
const PURPOSE_EMAIL: &str = "EMAIL";

/// Random 6-digit numeric code
fn generate_code() -> String {
    let value: u32 = 100_000 + rand::thread_rng().gen_range(0..900_000);
    value.to_string()
}

/// Create and persist a fresh email-verification code for a user
pub async fn create_email_verification_code(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<String, AppError> {
    let code = generate_code();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO verification_codes (id, code, purpose, user_id, is_used, expires_at, created_at)
        VALUES ($1, $2, $3, $4, FALSE, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&code)
    .bind(PURPOSE_EMAIL)
    .bind(user_id)
    .bind(now + Duration::minutes(CODE_EXPIRY_MINUTES))
    .bind(now)
    .execute(pool)
    .await?;

    Ok(code)
}

/// Consume a verification code and mark the user's email verified.
///
/// Checks the latest unused EMAIL code for the account; a wrong code and a
/// stale code fail with distinct errors so the client can offer a resend.
pub async fn verify_email(pool: &PgPool, email: &str, code: &str) -> Result<(), AppError> {
    let user_id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::Domain(DomainError::ResourceNotFound("User".to_string())))?;

    let stored = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
        r#"
        SELECT id, code, expires_at
        FROM verification_codes
        WHERE user_id = $1 AND purpose = $2 AND is_used = FALSE
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(PURPOSE_EMAIL)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        AppError::Domain(DomainError::ResourceNotFound(
            "Valid email verification code".to_string(),
        ))
    })?;

    let (code_id, stored_code, expires_at) = stored;

    if stored_code != code {
        return Err(AppError::Domain(DomainError::VerificationCodeMismatch));
    }

    if expires_at < Utc::now() {
        return Err(AppError::Domain(DomainError::VerificationCodeExpired));
    }

    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE verification_codes SET is_used = TRUE WHERE id = $1")
        .bind(code_id)
        .execute(&mut tx)
        .await?;

    sqlx::query("UPDATE users SET is_email_verified = TRUE, updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(user_id)
        .execute(&mut tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, "Email verified");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            let value: u32 = code.parse().unwrap();
            assert!((100_000..1_000_000).contains(&value));
        }
    }
}
