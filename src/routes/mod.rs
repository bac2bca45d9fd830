mod auth;
mod health_check;
mod memberships;
mod projects;

pub use auth::{get_current_user, login, logout, refresh, register, verify_email_route};
pub use health_check::health_check;
pub use memberships::{invite, leave, remove, respond, update};
pub use projects::{get as get_project, list as list_projects};
