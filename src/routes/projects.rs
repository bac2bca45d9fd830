/// Project routes (all protected)
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Principal;
use crate::authz::{authorize, resolve_visible_statuses, AccessDecision};
use crate::error::{AppError, ValidationError};
use crate::projects::{find_project, list_projects, Project, ProjectStatus, ProjectStatusFilter};

#[derive(Deserialize)]
pub struct ListProjectsQuery {
    /// Comma-separated status filters, e.g. `status=IN_PROGRESS,COMPLETED`
    /// or `status=ALL`
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct ProjectResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub owner_id: String,
    pub created_at: String,
}

impl ProjectResponse {
    fn from(project: Project) -> Self {
        Self {
            id: project.id.to_string(),
            name: project.name,
            description: project.description,
            status: project.status,
            owner_id: project.owner_id.to_string(),
            created_at: project.created_at.to_rfc3339(),
        }
    }
}

fn parse_filter(value: &str) -> Result<ProjectStatusFilter, AppError> {
    match value.trim().to_uppercase().as_str() {
        "ARCHIVED" => Ok(ProjectStatusFilter::Archived),
        "IN_PROGRESS" => Ok(ProjectStatusFilter::InProgress),
        "COMPLETED" => Ok(ProjectStatusFilter::Completed),
        "DELETED" => Ok(ProjectStatusFilter::Deleted),
        "ALL" => Ok(ProjectStatusFilter::All),
        other => Err(AppError::Validation(ValidationError::InvalidFormat(
            format!("unknown status filter: {}", other),
        ))),
    }
}

/// GET /api/projects
pub async fn list(
    query: web::Query<ListProjectsQuery>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let filters = match &query.status {
        None => None,
        Some(raw) => Some(
            raw.split(',')
                .filter(|s| !s.trim().is_empty())
                .map(parse_filter)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };

    let visible = resolve_visible_statuses(&principal, filters)?;
    let projects = list_projects(pool.get_ref(), &visible).await?;

    let body: Vec<ProjectResponse> = projects.into_iter().map(ProjectResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /api/projects/{project_id}
pub async fn get(
    path: web::Path<Uuid>,
    principal: web::ReqData<Principal>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, AppError> {
    let project_id = path.into_inner();

    authorize(
        pool.get_ref(),
        &principal,
        AccessDecision::ViewProject { project_id },
    )
    .await?;

    let project = find_project(pool.get_ref(), project_id).await?;

    Ok(HttpResponse::Ok().json(ProjectResponse::from(project)))
}
