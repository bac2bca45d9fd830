/// Redis-backed token revocation store.
///
/// Records token identifiers invalidated before natural expiry. Entries are
/// written with a TTL equal to the token's remaining lifetime, so the store
/// never holds an entry for a token that is already dead on its own.
///
/// The store only asserts invalidity: a missing entry means the token is
/// presumed valid. An unreachable store is the opposite of a missing entry
/// and fails the request (503) rather than silently passing it.
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::AppError;

const KEY_PREFIX: &str = "blacklist:";

#[derive(Clone)]
pub struct TokenBlacklist {
    connection: ConnectionManager,
}

impl TokenBlacklist {
    /// Connect to Redis and start a reconnecting connection manager
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::Cache(format!("Invalid Redis URL: {}", e)))?;
        let connection = ConnectionManager::new(client).await?;

        Ok(Self { connection })
    }

    /// Record a token identifier as revoked for `ttl_seconds`.
    ///
    /// A non-positive TTL means the token already expired naturally; there
    /// is nothing left to block and no entry is written.
    pub async fn blacklist(&self, token_id: &str, ttl_seconds: i64) -> Result<(), AppError> {
        if ttl_seconds <= 0 {
            return Ok(());
        }

        let mut connection = self.connection.clone();
        let _: () = connection
            .set_ex(format!("{}{}", KEY_PREFIX, token_id), "1", ttl_seconds as u64)
            .await?;

        Ok(())
    }

    /// Check whether a token identifier has been revoked
    pub async fn is_blacklisted(&self, token_id: &str) -> Result<bool, AppError> {
        let mut connection = self.connection.clone();
        let exists: bool = connection
            .exists(format!("{}{}", KEY_PREFIX, token_id))
            .await?;

        Ok(exists)
    }
}
