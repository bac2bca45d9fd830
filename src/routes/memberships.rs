/// Membership routes (all protected)
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::AppError;
use crate::membership::{
    invite_member, leave_project, remove_member, respond_to_invite, update_membership,
    Membership, MembershipStatus, MembershipUpdate, ProjectRole,
};

#[derive(Deserialize)]
pub struct CreateMembershipRequest {
    pub project_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct UpdateMembershipRequest {
    pub role: Option<ProjectRole>,
    pub status: Option<MembershipStatus>,
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

#[derive(Serialize)]
pub struct MembershipResponse {
    pub id: String,
    pub user_id: String,
    pub project_id: String,
    pub role: ProjectRole,
    pub status: MembershipStatus,
    pub joined_at: Option<String>,
}

impl MembershipResponse {
    fn from(membership: Membership) -> Self {
        Self {
            id: membership.id.to_string(),
            user_id: membership.user_id.to_string(),
            project_id: membership.project_id.to_string(),
            role: membership.role,
            status: membership.status,
            joined_at: membership.joined_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// POST /api/members
pub async fn invite(
    form: web::Json<CreateMembershipRequest>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let membership =
        invite_member(pool.get_ref(), &principal, form.project_id, form.user_id).await?;

    Ok(HttpResponse::Created().json(MembershipResponse::from(membership)))
}

/// PATCH /api/members/{membership_id}
pub async fn update(
    path: web::Path<Uuid>,
    form: web::Json<UpdateMembershipRequest>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    update_membership(
        pool.get_ref(),
        &principal,
        path.into_inner(),
        MembershipUpdate {
            role: form.role,
            status: form.status,
        },
    )
    .await?;

    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/members/{membership_id}/respond
pub async fn respond(
    path: web::Path<Uuid>,
    form: web::Json<RespondRequest>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    respond_to_invite(pool.get_ref(), &principal, path.into_inner(), form.accept).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/members/{membership_id}/leave
pub async fn leave(
    path: web::Path<Uuid>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    leave_project(pool.get_ref(), &principal, path.into_inner()).await?;

    Ok(HttpResponse::NoContent().finish())
}

/// DELETE /api/members/{membership_id}
pub async fn remove(
    path: web::Path<Uuid>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    remove_member(pool.get_ref(), &principal, path.into_inner()).await?;

    Ok(HttpResponse::NoContent().finish())
}
