/// Membership lifecycle operations.
///
/// Every operation takes the acting principal explicitly and authorizes
/// through the policy engine before touching the row. Lifecycle changes
/// update the single (user, project) row in place; the uniqueness of that
/// pair is enforced by a database constraint, so concurrent invites cannot
/// create duplicates.
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Principal;
use crate::authz::{authorize, AccessDecision};
use crate::error::{AppError, DatabaseError, DomainError};
use crate::membership::model::{Membership, MembershipStatus, ProjectRole};

/// Invite a user into a project, creating a PENDING membership.
///
/// A closed row (REJECTED, LEFT or DELETED) for the same pair is resurrected
/// to PENDING; an open row (PENDING or ACTIVE) is a conflict.
pub async fn invite_member(
    pool: &PgPool,
    actor: &Principal,
    project_id: Uuid,
    target_user_id: Uuid,
) -> Result<Membership, AppError> {
    authorize(pool, actor, AccessDecision::Invite { project_id }).await?;

    if let Some(existing) = find_by_project_and_user(pool, project_id, target_user_id).await? {
        if !existing.status.is_terminal() && existing.status != MembershipStatus::Rejected {
            return Err(AppError::Domain(DomainError::ResourceConflict(
                "An active or pending membership already exists".to_string(),
            )));
        }

        sqlx::query(
            "UPDATE memberships SET status = 'PENDING', updated_at = $1 WHERE id = $2",
        )
        .bind(Utc::now())
        .bind(existing.id)
        .execute(pool)
        .await?;

        tracing::info!(
            membership_id = %existing.id,
            project_id = %project_id,
            user_id = %target_user_id,
            "Re-invited user to project"
        );

        return Ok(Membership {
            status: MembershipStatus::Pending,
            updated_at: Utc::now(),
            ..existing
        });
    }

    ensure_user_exists(pool, target_user_id).await?;
    ensure_project_exists(pool, project_id).await?;

    let membership_id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO memberships (id, user_id, project_id, role, status, created_at, updated_at)
        VALUES ($1, $2, $3, 'MEMBER', 'PENDING', $4, $4)
        "#,
    )
    .bind(membership_id)
    .bind(target_user_id)
    .bind(project_id)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|e| match AppError::from(e) {
        // lost the race against a concurrent invite for the same pair
        AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
            AppError::Domain(DomainError::ResourceConflict(
                "An active or pending membership already exists".to_string(),
            ))
        }
        other => other,
    })?;

    tracing::info!(
        membership_id = %membership_id,
        project_id = %project_id,
        user_id = %target_user_id,
        "Invited user to project"
    );

    Ok(Membership {
        id: membership_id,
        user_id: target_user_id,
        project_id,
        role: ProjectRole::Member,
        status: MembershipStatus::Pending,
        joined_at: None,
        created_at: now,
        updated_at: now,
    })
}

/// Accept or reject a pending invite (self-action)
pub async fn respond_to_invite(
    pool: &PgPool,
    actor: &Principal,
    membership_id: Uuid,
    accept: bool,
) -> Result<(), AppError> {
    authorize(pool, actor, AccessDecision::RespondToInvite { membership_id }).await?;

    let membership = require_membership(pool, membership_id).await?;

    if membership.status != MembershipStatus::Pending {
        return Err(AppError::Domain(DomainError::InvalidStateTransition(
            format!(
                "Cannot respond to an invite in status {}",
                membership.status.as_str()
            ),
        )));
    }

    let now = Utc::now();
    if accept {
        sqlx::query(
            "UPDATE memberships SET status = 'ACTIVE', joined_at = $1, updated_at = $1 WHERE id = $2",
        )
        .bind(now)
        .bind(membership_id)
        .execute(pool)
        .await?;
    } else {
        sqlx::query("UPDATE memberships SET status = 'REJECTED', updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(membership_id)
            .execute(pool)
            .await?;
    }

    tracing::info!(
        membership_id = %membership_id,
        accepted = accept,
        "Responded to project invite"
    );

    Ok(())
}

/// Leave a project (self-action; owners are refused by the policy)
pub async fn leave_project(
    pool: &PgPool,
    actor: &Principal,
    membership_id: Uuid,
) -> Result<(), AppError> {
    authorize(pool, actor, AccessDecision::Leave { membership_id }).await?;

    let membership = require_membership(pool, membership_id).await?;

    if membership.status != MembershipStatus::Active {
        return Err(AppError::Domain(DomainError::InvalidStateTransition(
            format!(
                "Cannot leave a project from status {}",
                membership.status.as_str()
            ),
        )));
    }

    sqlx::query("UPDATE memberships SET status = 'LEFT', updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(membership_id)
        .execute(pool)
        .await?;

    tracing::info!(membership_id = %membership_id, "Member left project");

    Ok(())
}

/// Requested changes for the membership PATCH path
#[derive(Debug, Default)]
pub struct MembershipUpdate {
    pub role: Option<ProjectRole>,
    pub status: Option<MembershipStatus>,
}

/// Change a membership's role and/or status.
///
/// Status: self-changes are always allowed; changing someone else's status
/// requires an OWNER or MANAGER role in the project. Role: OWNER only, and
/// OWNER itself may not be assigned (no second owner by promotion). Both
/// are additionally gated on the lifecycle state machine.
pub async fn update_membership(
    pool: &PgPool,
    actor: &Principal,
    membership_id: Uuid,
    update: MembershipUpdate,
) -> Result<(), AppError> {
    authorize(pool, actor, AccessDecision::UpdateMembership { membership_id }).await?;

    let membership = require_membership(pool, membership_id).await?;
    let actor_role = actor_project_role(pool, membership.project_id, actor.id).await?;
    let is_self = actor.id == membership.user_id;

    let mut new_status = None;
    if let Some(status) = update.status {
        validate_status_change(actor, is_self, actor_role)?;

        if !membership.status.can_transition_to(status) {
            return Err(AppError::Domain(DomainError::InvalidStateTransition(
                format!(
                    "Cannot move membership from {} to {}",
                    membership.status.as_str(),
                    status.as_str()
                ),
            )));
        }
        new_status = Some(status);
    }

    let mut new_role = None;
    if let Some(role) = update.role {
        authorize(
            pool,
            actor,
            AccessDecision::ManageMembers {
                project_id: membership.project_id,
            },
        )
        .await?;
        validate_role_assignment(role)?;
        new_role = Some(role);
    }

    if new_status.is_none() && new_role.is_none() {
        return Ok(());
    }

    let now = Utc::now();
    let became_active = new_status == Some(MembershipStatus::Active)
        && membership.status == MembershipStatus::Pending;

    sqlx::query(
        r#"
        UPDATE memberships
        SET role = COALESCE($1, role),
            status = COALESCE($2, status),
            joined_at = CASE WHEN $3 THEN $4 ELSE joined_at END,
            updated_at = $4
        WHERE id = $5
        "#,
    )
    .bind(new_role.map(|r| r.as_str()))
    .bind(new_status.map(|s| s.as_str()))
    .bind(became_active)
    .bind(now)
    .bind(membership_id)
    .execute(pool)
    .await?;

    tracing::info!(
        membership_id = %membership_id,
        actor_id = %actor.id,
        "Membership updated"
    );

    Ok(())
}

/// Soft-delete a membership (OWNER/MANAGER of the project, or ADMIN)
pub async fn remove_member(
    pool: &PgPool,
    actor: &Principal,
    membership_id: Uuid,
) -> Result<(), AppError> {
    authorize(pool, actor, AccessDecision::UpdateMembership { membership_id }).await?;

    let membership = require_membership(pool, membership_id).await?;
    let actor_role = actor_project_role(pool, membership.project_id, actor.id).await?;

    if !actor.is_admin() && !actor_role.map(|r| r.can_manage_members()).unwrap_or(false) {
        return Err(AppError::Authorization(
            "Only an owner or manager can remove members".to_string(),
        ));
    }

    sqlx::query("UPDATE memberships SET status = 'DELETED', updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(membership_id)
        .execute(pool)
        .await?;

    tracing::info!(
        membership_id = %membership_id,
        actor_id = %actor.id,
        "Member removed from project"
    );

    Ok(())
}

fn validate_status_change(
    actor: &Principal,
    is_self: bool,
    actor_role: Option<ProjectRole>,
) -> Result<(), AppError> {
    if is_self || actor.is_admin() {
        return Ok(());
    }
    match actor_role {
        Some(role) if role.can_manage_members() => Ok(()),
        _ => Err(AppError::Authorization(
            "Only an owner or manager can update another member's status".to_string(),
        )),
    }
}

/// Ownership is never assigned through a role change
fn validate_role_assignment(new_role: ProjectRole) -> Result<(), AppError> {
    if new_role == ProjectRole::Owner {
        return Err(AppError::Authorization(
            "Cannot appoint another owner".to_string(),
        ));
    }
    Ok(())
}

/// Fetch a membership row, converting the stored text columns
pub async fn find_membership(
    pool: &PgPool,
    membership_id: Uuid,
) -> Result<Option<Membership>, AppError> {
    let row = sqlx::query_as::<_, MembershipRow>(
        r#"
        SELECT id, user_id, project_id, role, status, joined_at, created_at, updated_at
        FROM memberships
        WHERE id = $1
        "#,
    )
    .bind(membership_id)
    .fetch_optional(pool)
    .await?;

    row.map(membership_from_row).transpose()
}

async fn require_membership(pool: &PgPool, membership_id: Uuid) -> Result<Membership, AppError> {
    find_membership(pool, membership_id)
        .await?
        .ok_or_else(|| AppError::Domain(DomainError::ResourceNotFound("Membership".to_string())))
}

async fn find_by_project_and_user(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<Option<Membership>, AppError> {
    let row = sqlx::query_as::<_, MembershipRow>(
        r#"
        SELECT id, user_id, project_id, role, status, joined_at, created_at, updated_at
        FROM memberships
        WHERE project_id = $1 AND user_id = $2
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(membership_from_row).transpose()
}

async fn actor_project_role(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<Option<ProjectRole>, AppError> {
    let role = sqlx::query_scalar::<_, String>(
        "SELECT role FROM memberships WHERE project_id = $1 AND user_id = $2",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    role.map(|r| {
        r.parse::<ProjectRole>()
            .map_err(|e| AppError::Internal(format!("Corrupt role column: {}", e)))
    })
    .transpose()
}

async fn ensure_user_exists(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::Domain(DomainError::ResourceNotFound(
            "User".to_string(),
        )))
    }
}

async fn ensure_project_exists(pool: &PgPool, project_id: Uuid) -> Result<(), AppError> {
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
            .bind(project_id)
            .fetch_one(pool)
            .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::Domain(DomainError::ResourceNotFound(
            "Project".to_string(),
        )))
    }
}

type MembershipRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    String,
    Option<chrono::DateTime<chrono::Utc>>,
    chrono::DateTime<chrono::Utc>,
    chrono::DateTime<chrono::Utc>,
);

fn membership_from_row(row: MembershipRow) -> Result<Membership, AppError> {
    let role = row
        .3
        .parse::<ProjectRole>()
        .map_err(|e| AppError::Internal(format!("Corrupt role column: {}", e)))?;
    let status = row
        .4
        .parse::<MembershipStatus>()
        .map_err(|e| AppError::Internal(format!("Corrupt status column: {}", e)))?;

    Ok(Membership {
        id: row.0,
        user_id: row.1,
        project_id: row.2,
        role,
        status,
        joined_at: row.5,
        created_at: row.6,
        updated_at: row.7,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;

    fn user(role: Role) -> Principal {
        Principal {
            id: Uuid::new_v4(),
            username: "actor".to_string(),
            email: "actor@example.com".to_string(),
            role,
            email_verified: true,
        }
    }

    #[test]
    fn self_status_changes_are_allowed() {
        let actor = user(Role::User);
        assert!(validate_status_change(&actor, true, None).is_ok());
    }

    #[test]
    fn foreign_status_changes_need_a_managing_role() {
        let actor = user(Role::User);
        assert!(validate_status_change(&actor, false, Some(ProjectRole::Owner)).is_ok());
        assert!(validate_status_change(&actor, false, Some(ProjectRole::Manager)).is_ok());
        assert!(validate_status_change(&actor, false, Some(ProjectRole::Member)).is_err());
        assert!(validate_status_change(&actor, false, None).is_err());

        let admin = user(Role::Admin);
        assert!(validate_status_change(&admin, false, None).is_ok());
    }

    #[test]
    fn nobody_can_appoint_a_second_owner() {
        match validate_role_assignment(ProjectRole::Owner) {
            Err(AppError::Authorization(_)) => (),
            other => panic!("Expected denial, got {:?}", other),
        }
        assert!(validate_role_assignment(ProjectRole::Manager).is_ok());
        assert!(validate_role_assignment(ProjectRole::Member).is_ok());
    }
}
