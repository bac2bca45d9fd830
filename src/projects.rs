/// Projects as authorization targets and listing subjects.
///
/// Project CRUD beyond what the policy engine and the listing need lives
/// outside this service.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, DomainError};

/// Lifecycle status of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Archived,
    InProgress,
    Completed,
    Deleted,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Archived => "ARCHIVED",
            ProjectStatus::InProgress => "IN_PROGRESS",
            ProjectStatus::Completed => "COMPLETED",
            ProjectStatus::Deleted => "DELETED",
        }
    }
}

impl std::str::FromStr for ProjectStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ARCHIVED" => Ok(ProjectStatus::Archived),
            "IN_PROGRESS" => Ok(ProjectStatus::InProgress),
            "COMPLETED" => Ok(ProjectStatus::Completed),
            "DELETED" => Ok(ProjectStatus::Deleted),
            other => Err(format!("unknown project status: {}", other)),
        }
    }
}

/// API-level status filter for project listing. `ALL` is expanded by the
/// policy engine according to the caller's global role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatusFilter {
    Archived,
    InProgress,
    Completed,
    Deleted,
    All,
}

impl ProjectStatusFilter {
    /// Map an API filter onto the domain status. `All` has no single
    /// counterpart and is expanded before this is called.
    pub fn to_status(self) -> Option<ProjectStatus> {
        match self {
            ProjectStatusFilter::Archived => Some(ProjectStatus::Archived),
            ProjectStatusFilter::InProgress => Some(ProjectStatus::InProgress),
            ProjectStatusFilter::Completed => Some(ProjectStatus::Completed),
            ProjectStatusFilter::Deleted => Some(ProjectStatus::Deleted),
            ProjectStatusFilter::All => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn project_from_row(
    row: (
        Uuid,
        String,
        Option<String>,
        String,
        Uuid,
        DateTime<Utc>,
        DateTime<Utc>,
    ),
) -> Result<Project, AppError> {
    let status = row
        .3
        .parse::<ProjectStatus>()
        .map_err(|e| AppError::Internal(format!("Corrupt status column: {}", e)))?;

    Ok(Project {
        id: row.0,
        name: row.1,
        description: row.2,
        status,
        owner_id: row.4,
        created_at: row.5,
        updated_at: row.6,
    })
}

/// List projects whose status is in the already-authorized visible set
pub async fn list_projects(
    pool: &PgPool,
    visible: &[ProjectStatus],
) -> Result<Vec<Project>, AppError> {
    let statuses: Vec<String> = visible.iter().map(|s| s.as_str().to_string()).collect();

    let rows = sqlx::query_as::<_, (
        Uuid,
        String,
        Option<String>,
        String,
        Uuid,
        DateTime<Utc>,
        DateTime<Utc>,
    )>(
        r#"
        SELECT id, name, description, status, owner_id, created_at, updated_at
        FROM projects
        WHERE status = ANY($1)
        ORDER BY created_at DESC
        "#,
    )
    .bind(&statuses)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(project_from_row).collect()
}

/// Fetch a single project or fail with 404
pub async fn find_project(pool: &PgPool, project_id: Uuid) -> Result<Project, AppError> {
    let row = sqlx::query_as::<_, (
        Uuid,
        String,
        Option<String>,
        String,
        Uuid,
        DateTime<Utc>,
        DateTime<Utc>,
    )>(
        r#"
        SELECT id, name, description, status, owner_id, created_at, updated_at
        FROM projects
        WHERE id = $1
        "#,
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::Domain(DomainError::ResourceNotFound("Project".to_string())))?;

    project_from_row(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_value(ProjectStatus::InProgress).unwrap(),
            "IN_PROGRESS"
        );
        assert_eq!(
            "IN_PROGRESS".parse::<ProjectStatus>().unwrap(),
            ProjectStatus::InProgress
        );
    }

    #[test]
    fn all_filter_has_no_single_status() {
        assert_eq!(ProjectStatusFilter::All.to_status(), None);
        assert_eq!(
            ProjectStatusFilter::Deleted.to_status(),
            Some(ProjectStatus::Deleted)
        );
    }
}
