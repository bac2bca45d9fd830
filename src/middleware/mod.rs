mod auth_middleware;

pub use auth_middleware::{AuthMiddleware, BearerToken};
