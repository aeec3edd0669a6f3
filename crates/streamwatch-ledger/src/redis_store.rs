//! Redis-backed ledger
//!
//! One Redis set per guild under `currently_streaming:{guild}`. `SADD` and
//! `SREM` return the number of elements actually changed, which gives the
//! atomic add-if-absent / remove-if-present semantics directly. The set
//! survives restarts and shard migrations.

use crate::error::LedgerError;
use crate::ledger::Ledger;
use redis::aio::MultiplexedConnection;
use redis::Client;
use streamwatch_types::{GuildId, MemberId};

/// Redis key for a guild's streaming set
#[must_use]
pub fn streaming_key(guild: GuildId) -> String {
    format!("currently_streaming:{guild}")
}

/// Ledger stored in Redis sets
#[derive(Clone)]
pub struct RedisLedger {
    conn: MultiplexedConnection,
}

impl RedisLedger {
    /// Connect to `redis_url`
    ///
    /// # Errors
    /// - `LedgerError::Backend` if the URL is invalid or the server is down
    pub async fn connect(redis_url: &str) -> Result<Self, LedgerError> {
        let client = Client::open(redis_url)
            .map_err(|e| LedgerError::backend(GuildId::default(), e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| LedgerError::backend(GuildId::default(), e.to_string()))?;
        tracing::info!(url = %redis_url, "Connected streaming ledger to redis");
        Ok(Self { conn })
    }

    async fn changed(&self, command: &str, guild: GuildId, member: MemberId) -> Result<bool, LedgerError> {
        let changed: i64 = redis::cmd(command)
            .arg(streaming_key(guild))
            .arg(member.0)
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| LedgerError::backend(guild, e.to_string()))?;
        match changed {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(LedgerError::UnexpectedReply(format!(
                "{command} changed {other} elements"
            ))),
        }
    }
}

#[async_trait::async_trait]
impl Ledger for RedisLedger {
    async fn add_if_absent(&self, guild: GuildId, member: MemberId) -> Result<bool, LedgerError> {
        self.changed("SADD", guild, member).await
    }

    async fn remove_if_present(
        &self,
        guild: GuildId,
        member: MemberId,
    ) -> Result<bool, LedgerError> {
        self.changed("SREM", guild, member).await
    }

    async fn members(&self, guild: GuildId) -> Result<Vec<MemberId>, LedgerError> {
        let raw: Vec<u64> = redis::cmd("SMEMBERS")
            .arg(streaming_key(guild))
            .query_async(&mut self.conn.clone())
            .await
            .map_err(|e| LedgerError::backend(guild, e.to_string()))?;
        let mut members: Vec<MemberId> = raw.into_iter().map(MemberId::new).collect();
        members.sort_unstable();
        Ok(members)
    }
}
