use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role a user holds within a project. Ordering of privilege:
/// OWNER > MANAGER > MEMBER.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectRole {
    Owner,
    Manager,
    Member,
}

impl ProjectRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Owner => "OWNER",
            ProjectRole::Manager => "MANAGER",
            ProjectRole::Member => "MEMBER",
        }
    }

    /// Roles allowed to invite and to change member status
    pub fn can_manage_members(&self) -> bool {
        matches!(self, ProjectRole::Owner | ProjectRole::Manager)
    }
}

impl std::str::FromStr for ProjectRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "OWNER" => Ok(ProjectRole::Owner),
            "MANAGER" => Ok(ProjectRole::Manager),
            "MEMBER" => Ok(ProjectRole::Member),
            other => Err(format!("unknown project role: {}", other)),
        }
    }
}

/// Lifecycle status of a membership.
///
/// PENDING, ACTIVE and REJECTED form the open lifecycle; LEFT and DELETED
/// are terminal for the update path. Re-invitation is the only way back to
/// PENDING from a closed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Pending,
    Active,
    Rejected,
    Left,
    Deleted,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Pending => "PENDING",
            MembershipStatus::Active => "ACTIVE",
            MembershipStatus::Rejected => "REJECTED",
            MembershipStatus::Left => "LEFT",
            MembershipStatus::Deleted => "DELETED",
        }
    }

    /// Terminal states may not be mutated; they are consulted before every
    /// update.
    pub fn is_terminal(&self) -> bool {
        matches!(self, MembershipStatus::Left | MembershipStatus::Deleted)
    }

    /// Legality of a status transition on the update path.
    ///
    /// Re-invitation (closed row back to PENDING) is handled by the invite
    /// operation, not here; no update-path transition leaves a terminal
    /// state.
    pub fn can_transition_to(&self, next: MembershipStatus) -> bool {
        use MembershipStatus::*;

        if self.is_terminal() {
            return false;
        }
        match (*self, next) {
            (current, next) if current == next => true,
            (Pending, Active) | (Pending, Rejected) => true,
            (Active, Left) => true,
            // removal: any open row can be closed
            (_, Deleted) => true,
            (_, Left) => true,
            _ => false,
        }
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PENDING" => Ok(MembershipStatus::Pending),
            "ACTIVE" => Ok(MembershipStatus::Active),
            "REJECTED" => Ok(MembershipStatus::Rejected),
            "LEFT" => Ok(MembershipStatus::Left),
            "DELETED" => Ok(MembershipStatus::Deleted),
            other => Err(format!("unknown membership status: {}", other)),
        }
    }
}

/// A user's relationship to a project. At most one row exists per
/// (user, project) pair; lifecycle changes update the row in place.
#[derive(Debug, Clone)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub role: ProjectRole,
    pub status: MembershipStatus,
    pub joined_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use MembershipStatus::*;

    #[test]
    fn role_privileges() {
        assert!(ProjectRole::Owner.can_manage_members());
        assert!(ProjectRole::Manager.can_manage_members());
        assert!(!ProjectRole::Member.can_manage_members());
    }

    #[test]
    fn terminal_states() {
        assert!(Left.is_terminal());
        assert!(Deleted.is_terminal());
        assert!(!Pending.is_terminal());
        assert!(!Active.is_terminal());
        assert!(!Rejected.is_terminal());
    }

    #[test]
    fn invite_responses_only_from_pending() {
        assert!(Pending.can_transition_to(Active));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Active.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Active));
    }

    #[test]
    fn any_open_row_can_be_closed() {
        for open in [Pending, Active, Rejected] {
            assert!(open.can_transition_to(Deleted));
            assert!(open.can_transition_to(Left));
        }
    }

    #[test]
    fn nothing_leaves_a_terminal_state_via_update() {
        for terminal in [Left, Deleted] {
            for next in [Pending, Active, Rejected, Left, Deleted] {
                assert!(
                    !terminal.can_transition_to(next),
                    "{:?} -> {:?} must be illegal",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [Pending, Active, Rejected, Left, Deleted] {
            assert_eq!(status.as_str().parse::<MembershipStatus>().unwrap(), status);
        }
        assert!("GONE".parse::<MembershipStatus>().is_err());
    }
}
