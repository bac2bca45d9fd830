/// Authentication module
///
/// Token issuance/validation/rotation, password hashing, credential
/// verification and the refresh-token ledger.
mod claims;
mod credentials;
mod jwt;
mod password;
mod principal;
mod refresh_token;

pub use claims::{AccessClaims, RefreshClaims, TokenType};
pub use credentials::authenticate;
pub use jwt::{issue_access_token, token_digest, validate_access_token, validate_refresh_token};
pub use password::{hash_password, verify_password};
pub use principal::{Principal, Role};
pub use refresh_token::{
    issue_refresh_token, issue_token_pair, revoke_by_jti, rotate_refresh_token, TokenPair,
};
