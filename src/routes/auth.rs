/// Authentication routes
///
/// Registration, email verification, login, token refresh, logout and
/// current-user lookup. Handlers only marshal; the flows live in the auth,
/// verification and blacklist modules.
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    authenticate, hash_password, issue_token_pair, revoke_by_jti, rotate_refresh_token,
    token_digest, validate_refresh_token, AccessClaims, Principal,
};
use crate::blacklist::TokenBlacklist;
use crate::configuration::JwtSettings;
use crate::email_client::EmailClient;
use crate::error::{AppError, DomainError};
use crate::middleware::BearerToken;
use crate::validators::{is_valid_email, is_valid_name, is_valid_username};
use crate::verification::{create_email_verification_code, verify_email};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
}

#[derive(Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub verification_code: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Access and refresh pair handed to the client
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub email_verified: bool,
}

/// POST /auth/register
///
/// Creates the user, its LOCAL credential identity and an email
/// verification code. Tokens are not issued here; the client logs in after
/// verifying.
pub async fn register(
    form: web::Json<RegisterRequest>,
    pool: web::Data<PgPool>,
    email_client: web::Data<EmailClient>,
) -> Result<HttpResponse, AppError> {
    let username = is_valid_username(&form.username)?;
    let email = is_valid_email(&form.email)?;
    let first_name = is_valid_name(&form.first_name)?;
    let last_name = is_valid_name(&form.last_name)?;
    let password_hash = hash_password(&form.password)?;

    let email_taken =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(&email)
            .fetch_one(pool.get_ref())
            .await?;
    if email_taken {
        return Err(AppError::Domain(DomainError::ResourceConflict(
            "Email already registered".to_string(),
        )));
    }

    let username_taken =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
            .bind(&username)
            .fetch_one(pool.get_ref())
            .await?;
    if username_taken {
        return Err(AppError::Domain(DomainError::ResourceConflict(
            "Username already taken".to_string(),
        )));
    }

    let user_id = Uuid::new_v4();
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, first_name, last_name, role, is_email_verified, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, 'USER', FALSE, $6, $6)
        "#,
    )
    .bind(user_id)
    .bind(&username)
    .bind(&email)
    .bind(&first_name)
    .bind(&last_name)
    .bind(now)
    .execute(&mut tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO auth_identities (id, provider, provider_user_id, password_hash, user_id, created_at)
        VALUES ($1, 'LOCAL', $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&username)
    .bind(&password_hash)
    .bind(user_id)
    .bind(now)
    .execute(&mut tx)
    .await?;

    tx.commit().await?;

    let code = create_email_verification_code(pool.get_ref(), user_id).await?;

    // best-effort: a mail outage must not fail the registration
    if let Err(e) = email_client
        .send_verification_code(&email, &first_name, &code)
        .await
    {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to send verification email");
    }

    tracing::info!(user_id = %user_id, "User registered");

    Ok(HttpResponse::Created().json(RegisterResponse {
        id: user_id.to_string(),
        username,
        email,
        email_verified: false,
    }))
}

/// POST /auth/verify-email
pub async fn verify_email_route(
    form: web::Json<VerifyEmailRequest>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let email = is_valid_email(&form.email)?;
    verify_email(pool.get_ref(), &email, &form.verification_code).await?;

    Ok(HttpResponse::Ok().finish())
}

/// POST /auth/login
///
/// Unknown username and wrong password are indistinguishable to the caller.
pub async fn login(
    form: web::Json<LoginRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let principal = authenticate(pool.get_ref(), &form.username, &form.password).await?;

    let pair = issue_token_pair(pool.get_ref(), &principal, jwt_config.get_ref()).await?;

    tracing::info!(user_id = %principal.id, "User logged in");

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: jwt_config.access_token_expiry,
    }))
}

/// POST /auth/refresh
///
/// Rotates the refresh token: the presented token's ledger row is revoked
/// and a fresh pair is issued. A replayed token loses the rotation race and
/// is rejected.
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let pair = rotate_refresh_token(pool.get_ref(), &form.refresh_token, jwt_config.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: jwt_config.access_token_expiry,
    }))
}

/// POST /auth/logout (protected)
///
/// Blacklists the presented access token for its remaining lifetime and
/// marks the refresh token's ledger row revoked.
pub async fn logout(
    form: web::Json<LogoutRequest>,
    principal: web::ReqData<Principal>,
    claims: web::ReqData<AccessClaims>,
    token: web::ReqData<BearerToken>,
    pool: web::Data<PgPool>,
    jwt_config: web::Data<JwtSettings>,
    blacklist: web::Data<TokenBlacklist>,
) -> Result<HttpResponse, AppError> {
    let remaining = claims.remaining_lifetime(Utc::now().timestamp());
    blacklist
        .blacklist(&token_digest(&token.0), remaining)
        .await?;

    match validate_refresh_token(&form.refresh_token, jwt_config.get_ref()) {
        Ok(refresh_claims) => {
            revoke_by_jti(pool.get_ref(), &refresh_claims.jti).await?;
        }
        Err(e) => {
            // already dead tokens don't block a logout
            tracing::warn!(user_id = %principal.id, error = %e, "Logout with invalid refresh token");
        }
    }

    tracing::info!(user_id = %principal.id, "User logged out");

    Ok(HttpResponse::NoContent().finish())
}

/// GET /auth/me (protected)
///
/// Answers from the principal reconstructed out of the token claims; no
/// database read.
pub async fn get_current_user(
    principal: web::ReqData<Principal>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(UserResponse {
        id: principal.id.to_string(),
        username: principal.username.clone(),
        email: principal.email.clone(),
        role: principal.role.as_str().to_string(),
        email_verified: principal.email_verified,
    }))
}
