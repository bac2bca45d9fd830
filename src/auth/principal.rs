use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Global role of a user. Project-level roles live on memberships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// The authenticated identity making a request.
///
/// A Principal is a value: it is reconstructed on every request, either from
/// verified access-token claims (authenticated requests) or from a user row
/// (login), and is never mutated in place. Policy checks receive it as an
/// explicit parameter; there is no ambient "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub email_verified: bool,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::Admin.as_str(), "ADMIN");
        assert!("OWNER".parse::<Role>().is_err());
    }

    #[test]
    fn admin_check() {
        let principal = Principal {
            id: Uuid::new_v4(),
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            role: Role::Admin,
            email_verified: true,
        };
        assert!(principal.is_admin());
    }
}
