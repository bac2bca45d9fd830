/// Membership module
///
/// The join entity between users and projects: lifecycle state machine,
/// row model and the service operations mutating it.
mod model;
mod service;

pub use model::{Membership, MembershipStatus, ProjectRole};
pub use service::{
    find_membership, invite_member, leave_project, remove_member, respond_to_invite,
    update_membership, MembershipUpdate,
};
