/// Authorization policy engine.
///
/// Every privileged operation names its decision as a variant of
/// `AccessDecision`; `authorize` is the single entry point. The decision set
/// is closed, so the policy surface is enumerable and each variant carries
/// exactly the facts it needs. `authorize` loads those facts and delegates
/// to pure check functions; the checks themselves perform no IO and take the
/// acting principal as an explicit parameter.
///
/// A global ADMIN bypasses project-level checks. Self-action checks
/// (responding to an invite, leaving) are identity checks and have no admin
/// bypass.
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::{AppError, DomainError};
use crate::membership::{MembershipStatus, ProjectRole};
use crate::projects::{ProjectStatus, ProjectStatusFilter};

/// The closed set of authorization decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Invite { project_id: Uuid },
    ManageMembers { project_id: Uuid },
    RespondToInvite { membership_id: Uuid },
    Leave { membership_id: Uuid },
    UpdateMembership { membership_id: Uuid },
    ViewProject { project_id: Uuid },
}

/// The actor's own membership row in a project, if any
pub type ProjectStanding = Option<(ProjectRole, MembershipStatus)>;

/// Facts about a target membership row
#[derive(Debug, Clone, Copy)]
pub struct MembershipFacts {
    pub membership_id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub role: ProjectRole,
    pub status: MembershipStatus,
}

/// Evaluate a decision for an actor, loading only the facts it needs
pub async fn authorize(
    pool: &PgPool,
    actor: &Principal,
    decision: AccessDecision,
) -> Result<(), AppError> {
    match decision {
        AccessDecision::Invite { project_id } => {
            let standing = actor_standing(pool, project_id, actor.id).await?;
            check_invite(actor, standing)
        }
        AccessDecision::ManageMembers { project_id } => {
            let standing = actor_standing(pool, project_id, actor.id).await?;
            check_manage_members(actor, standing)
        }
        AccessDecision::RespondToInvite { membership_id } => {
            let target = require_membership(pool, membership_id).await?;
            check_respond_to_invite(actor, &target)
        }
        AccessDecision::Leave { membership_id } => {
            let target = require_membership(pool, membership_id).await?;
            check_leave(actor, &target)
        }
        AccessDecision::UpdateMembership { membership_id } => {
            let target = require_membership(pool, membership_id).await?;
            let standing = actor_standing(pool, target.project_id, actor.id).await?;
            check_update_membership(actor, &target, standing)
        }
        AccessDecision::ViewProject { project_id } => {
            let standing = actor_standing(pool, project_id, actor.id).await?;
            check_view_project(actor, standing)
        }
    }
}

/// ADMIN, or an ACTIVE OWNER/MANAGER membership in the project
fn check_invite(actor: &Principal, standing: ProjectStanding) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }
    match standing {
        Some((role, MembershipStatus::Active)) if role.can_manage_members() => Ok(()),
        _ => Err(AppError::Authorization(
            "Only an active owner or manager can invite members".to_string(),
        )),
    }
}

/// ADMIN, or an ACTIVE OWNER membership (role changes)
fn check_manage_members(actor: &Principal, standing: ProjectStanding) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }
    match standing {
        Some((ProjectRole::Owner, MembershipStatus::Active)) => Ok(()),
        _ => Err(AppError::Authorization(
            "Only an active owner can manage members".to_string(),
        )),
    }
}

/// Only the invited user may respond to an invite
fn check_respond_to_invite(actor: &Principal, target: &MembershipFacts) -> Result<(), AppError> {
    if target.user_id == actor.id {
        Ok(())
    } else {
        Err(AppError::Authorization(
            "Only the invited user can respond to this invite".to_string(),
        ))
    }
}

/// Self-action, and owners may not leave: ownership must be transferred
/// before the owner can exit the project.
fn check_leave(actor: &Principal, target: &MembershipFacts) -> Result<(), AppError> {
    if target.user_id != actor.id {
        return Err(AppError::Authorization(
            "Only the member themselves can leave a project".to_string(),
        ));
    }
    if target.role == ProjectRole::Owner {
        return Err(AppError::Authorization(
            "An owner cannot leave the project; transfer ownership first".to_string(),
        ));
    }
    Ok(())
}

/// The target row must still be open, and the actor must hold a membership
/// (ACTIVE or PENDING) in the same project.
fn check_update_membership(
    actor: &Principal,
    target: &MembershipFacts,
    standing: ProjectStanding,
) -> Result<(), AppError> {
    if target.status.is_terminal() {
        return Err(AppError::Authorization(format!(
            "Membership in status {} cannot be updated",
            target.status.as_str()
        )));
    }
    if actor.is_admin() {
        return Ok(());
    }
    match standing {
        Some((_, MembershipStatus::Active)) | Some((_, MembershipStatus::Pending)) => Ok(()),
        _ => Err(AppError::Authorization(
            "No membership in this project".to_string(),
        )),
    }
}

/// ADMIN, or any ACTIVE membership in the project
fn check_view_project(actor: &Principal, standing: ProjectStanding) -> Result<(), AppError> {
    if actor.is_admin() {
        return Ok(());
    }
    match standing {
        Some((_, MembershipStatus::Active)) => Ok(()),
        _ => Err(AppError::Authorization(
            "No active membership in this project".to_string(),
        )),
    }
}

const DEFAULT_VISIBLE_STATUSES: [ProjectStatus; 2] =
    [ProjectStatus::InProgress, ProjectStatus::Completed];

/// Resolve the statuses a listing request may see.
///
/// No filter defaults to {IN_PROGRESS, COMPLETED}. `ALL` expands to every
/// status for admins and every non-deleted status otherwise. A non-admin
/// explicitly asking for DELETED is denied.
pub fn resolve_visible_statuses(
    actor: &Principal,
    filters: Option<Vec<ProjectStatusFilter>>,
) -> Result<Vec<ProjectStatus>, AppError> {
    let filters = match filters {
        None => return Ok(DEFAULT_VISIBLE_STATUSES.to_vec()),
        Some(filters) if filters.is_empty() => return Ok(DEFAULT_VISIBLE_STATUSES.to_vec()),
        Some(filters) => filters,
    };

    let filters = if filters.contains(&ProjectStatusFilter::All) {
        if actor.is_admin() {
            vec![
                ProjectStatusFilter::Archived,
                ProjectStatusFilter::InProgress,
                ProjectStatusFilter::Completed,
                ProjectStatusFilter::Deleted,
            ]
        } else {
            vec![
                ProjectStatusFilter::InProgress,
                ProjectStatusFilter::Completed,
                ProjectStatusFilter::Archived,
            ]
        }
    } else {
        filters
    };

    if filters.contains(&ProjectStatusFilter::Deleted) && !actor.is_admin() {
        return Err(AppError::Authorization(
            "Only admins can view deleted projects".to_string(),
        ));
    }

    Ok(filters
        .into_iter()
        .filter_map(ProjectStatusFilter::to_status)
        .collect())
}

async fn actor_standing(
    pool: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> Result<ProjectStanding, AppError> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT role, status FROM memberships WHERE project_id = $1 AND user_id = $2",
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.map(|(role, status)| {
        let role = role
            .parse::<ProjectRole>()
            .map_err(|e| AppError::Internal(format!("Corrupt role column: {}", e)))?;
        let status = status
            .parse::<MembershipStatus>()
            .map_err(|e| AppError::Internal(format!("Corrupt status column: {}", e)))?;
        Ok((role, status))
    })
    .transpose()
}

async fn require_membership(
    pool: &PgPool,
    membership_id: Uuid,
) -> Result<MembershipFacts, AppError> {
    load_membership_facts(pool, membership_id)
        .await?
        .ok_or_else(|| AppError::Domain(DomainError::ResourceNotFound("Membership".to_string())))
}

/// Load the policy-relevant facts of a membership row
pub async fn load_membership_facts(
    pool: &PgPool,
    membership_id: Uuid,
) -> Result<Option<MembershipFacts>, AppError> {
    let row = sqlx::query_as::<_, (Uuid, Uuid, Uuid, String, String)>(
        "SELECT id, user_id, project_id, role, status FROM memberships WHERE id = $1",
    )
    .bind(membership_id)
    .fetch_optional(pool)
    .await?;

    row.map(|(membership_id, user_id, project_id, role, status)| {
        let role = role
            .parse::<ProjectRole>()
            .map_err(|e| AppError::Internal(format!("Corrupt role column: {}", e)))?;
        let status = status
            .parse::<MembershipStatus>()
            .map_err(|e| AppError::Internal(format!("Corrupt status column: {}", e)))?;
        Ok(MembershipFacts {
            membership_id,
            user_id,
            project_id,
            role,
            status,
        })
    })
    .transpose()
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

    fn facts(user_id: Uuid, role: ProjectRole, status: MembershipStatus) -> MembershipFacts {
        MembershipFacts {
            membership_id: Uuid::new_v4(),
            user_id,
            project_id: Uuid::new_v4(),
            role,
            status,
        }
    }

    #[test]
    fn invite_requires_active_owner_or_manager() {
        let actor = user(Role::User);

        for role in [ProjectRole::Owner, ProjectRole::Manager] {
            assert!(check_invite(&actor, Some((role, MembershipStatus::Active))).is_ok());
        }
        assert!(check_invite(&actor, Some((ProjectRole::Member, MembershipStatus::Active))).is_err());
        assert!(check_invite(&actor, Some((ProjectRole::Owner, MembershipStatus::Pending))).is_err());
        assert!(check_invite(&actor, None).is_err());
    }

    #[test]
    fn admin_bypasses_project_level_checks() {
        let admin = user(Role::Admin);
        assert!(check_invite(&admin, None).is_ok());
        assert!(check_manage_members(&admin, None).is_ok());
        assert!(check_view_project(&admin, None).is_ok());

        let target = facts(Uuid::new_v4(), ProjectRole::Member, MembershipStatus::Active);
        assert!(check_update_membership(&admin, &target, None).is_ok());
    }

    #[test]
    fn manage_members_requires_active_owner() {
        let actor = user(Role::User);
        assert!(
            check_manage_members(&actor, Some((ProjectRole::Owner, MembershipStatus::Active)))
                .is_ok()
        );
        assert!(check_manage_members(
            &actor,
            Some((ProjectRole::Manager, MembershipStatus::Active))
        )
        .is_err());
        assert!(check_manage_members(
            &actor,
            Some((ProjectRole::Owner, MembershipStatus::Left))
        )
        .is_err());
    }

    #[test]
    fn only_the_invited_user_responds() {
        let actor = user(Role::User);
        let own = facts(actor.id, ProjectRole::Member, MembershipStatus::Pending);
        let other = facts(Uuid::new_v4(), ProjectRole::Member, MembershipStatus::Pending);

        assert!(check_respond_to_invite(&actor, &own).is_ok());
        assert!(check_respond_to_invite(&actor, &other).is_err());
    }

    #[test]
    fn owner_can_never_leave() {
        let actor = user(Role::User);
        let own = facts(actor.id, ProjectRole::Owner, MembershipStatus::Active);
        match check_leave(&actor, &own) {
            Err(AppError::Authorization(_)) => (),
            other => panic!("Expected denial, got {:?}", other),
        }

        // even an admin acting on someone else's membership is denied:
        // leaving is a self-action
        let admin = user(Role::Admin);
        assert!(check_leave(&admin, &own).is_err());
    }

    #[test]
    fn member_can_leave() {
        let actor = user(Role::User);
        let own = facts(actor.id, ProjectRole::Member, MembershipStatus::Active);
        assert!(check_leave(&actor, &own).is_ok());
    }

    #[test]
    fn terminal_memberships_cannot_be_updated() {
        let actor = user(Role::User);
        for status in [MembershipStatus::Left, MembershipStatus::Deleted] {
            let target = facts(Uuid::new_v4(), ProjectRole::Member, status);
            let standing = Some((ProjectRole::Owner, MembershipStatus::Active));
            assert!(check_update_membership(&actor, &target, standing).is_err());
        }
    }

    #[test]
    fn updating_requires_standing_in_the_project() {
        let actor = user(Role::User);
        let target = facts(Uuid::new_v4(), ProjectRole::Member, MembershipStatus::Active);

        assert!(check_update_membership(
            &actor,
            &target,
            Some((ProjectRole::Member, MembershipStatus::Pending))
        )
        .is_ok());
        assert!(check_update_membership(
            &actor,
            &target,
            Some((ProjectRole::Member, MembershipStatus::Left))
        )
        .is_err());
        assert!(check_update_membership(&actor, &target, None).is_err());
    }

    #[test]
    fn viewing_requires_active_membership() {
        let actor = user(Role::User);
        for role in [ProjectRole::Owner, ProjectRole::Manager, ProjectRole::Member] {
            assert!(check_view_project(&actor, Some((role, MembershipStatus::Active))).is_ok());
        }
        assert!(check_view_project(&actor, Some((ProjectRole::Member, MembershipStatus::Pending)))
            .is_err());
        assert!(check_view_project(&actor, None).is_err());
    }

    #[test]
    fn no_filter_defaults_to_in_progress_and_completed() {
        let actor = user(Role::User);
        assert_eq!(
            resolve_visible_statuses(&actor, None).unwrap(),
            vec![ProjectStatus::InProgress, ProjectStatus::Completed]
        );
        assert_eq!(
            resolve_visible_statuses(&actor, Some(vec![])).unwrap(),
            vec![ProjectStatus::InProgress, ProjectStatus::Completed]
        );
    }

    #[test]
    fn all_expands_by_global_role() {
        let admin = user(Role::Admin);
        let expanded =
            resolve_visible_statuses(&admin, Some(vec![ProjectStatusFilter::All])).unwrap();
        assert!(expanded.contains(&ProjectStatus::Deleted));
        assert_eq!(expanded.len(), 4);

        let plain = user(Role::User);
        let expanded =
            resolve_visible_statuses(&plain, Some(vec![ProjectStatusFilter::All])).unwrap();
        assert!(!expanded.contains(&ProjectStatus::Deleted));
        assert_eq!(expanded.len(), 3);
    }

    #[test]
    fn non_admin_requesting_deleted_is_denied() {
        let plain = user(Role::User);
        match resolve_visible_statuses(&plain, Some(vec![ProjectStatusFilter::Deleted])) {
            Err(AppError::Authorization(_)) => (),
            other => panic!("Expected denial, got {:?}", other),
        }

        let admin = user(Role::Admin);
        assert_eq!(
            resolve_visible_statuses(&admin, Some(vec![ProjectStatusFilter::Deleted])).unwrap(),
            vec![ProjectStatus::Deleted]
        );
    }
}
