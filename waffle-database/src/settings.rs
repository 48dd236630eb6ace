//! Per-guild key/value settings.
//!
//! Writes are delete-then-insert. A concurrent reader can briefly see no
//! value between the two statements.
//!
//! Reads fill the cache from the datastore. A reader only writes back when no
//! local write to the same key started while it was loading, so a slow read
//! cannot re-cache the value a writer just replaced. A write that lands
//! between that check and the cache write still leaves the old value cached
//! until the TTL runs out; writers in other processes are not tracked at all.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::cache::CacheService;
use crate::error::StoreResult;
use crate::filter::Filter;
use crate::schema::{Field, FieldKind, Table, TableSchema};
use crate::store::{Query, RecordStore, Scope};
use crate::value::{Record, Value};

pub const SETTINGS_TABLE: &str = "server_setting";

pub mod keys {
    /// Channel that receives moderation audit lines.
    pub const MODERATION_LOG: &str = "moderation_log";
    pub const MUTE_ROLE: &str = "mute_role";
    pub const ADMIN_ROLE: &str = "admin_role";
    pub const MOD_ROLE: &str = "mod_role";
}

pub fn settings_schema() -> TableSchema {
    TableSchema::new(
        SETTINGS_TABLE,
        [
            Field::new("guild_id", FieldKind::BigInteger).not_null(),
            Field::new("key", FieldKind::Text).not_null(),
            Field::new("value", FieldKind::Text).not_null(),
        ],
    )
}

#[derive(Clone, Debug)]
pub struct Settings {
    table: Table,
    cache: CacheService,
    /// Writes started per `(guild, key)`.
    writes: Arc<DashMap<(u64, String), u64>>,
}

impl Settings {
    pub async fn setup(store: &RecordStore, cache: CacheService) -> StoreResult<Self> {
        let table = store.ensure_table(settings_schema()).await?;
        Ok(Self {
            table,
            cache,
            writes: Arc::new(DashMap::new()),
        })
    }

    /// Most recently written value for `key`, if any.
    pub async fn get(&self, guild_id: u64, key: &str) -> StoreResult<Option<String>> {
        let cache_key = self.cache.setting_key(guild_id, key);
        match self.cache.get_json::<Option<String>>(&cache_key).await {
            Ok(Some(cached)) => return Ok(cached),
            Ok(None) => {}
            Err(e) => warn!(?e, %cache_key, "settings cache get failed; reading datastore"),
        }

        let seen = self.write_generation(guild_id, key);
        let loaded = self.load(guild_id, key).await?;

        if self.write_generation(guild_id, key) != seen {
            debug!(%cache_key, "setting changed while loading; not caching");
        } else if let Err(e) = self.cache.set_json(&cache_key, &loaded).await {
            warn!(?e, %cache_key, "settings cache set failed");
        }

        Ok(loaded)
    }

    /// Replace the value for `key`. `None` clears it.
    pub async fn set(&self, guild_id: u64, key: &str, value: Option<&str>) -> StoreResult<()> {
        let guild = Value::from_id(guild_id)?;
        *self.writes.entry((guild_id, key.to_owned())).or_insert(0) += 1;

        self.table
            .delete(&Scope::Matching(
                Filter::new().with("guild_id", guild.clone()).with("key", key),
            ))
            .await?;

        if let Some(value) = value {
            self.table
                .insert(
                    &Record::new()
                        .with("guild_id", guild)
                        .with("key", key)
                        .with("value", value),
                )
                .await?;
        }

        let cache_key = self.cache.setting_key(guild_id, key);
        if let Err(e) = self.cache.del(&cache_key).await {
            warn!(?e, %cache_key, "settings cache invalidation failed");
        }

        Ok(())
    }

    /// Read a setting holding a snowflake id. Unparsable values read as absent.
    pub async fn get_id(&self, guild_id: u64, key: &str) -> StoreResult<Option<u64>> {
        let Some(raw) = self.get(guild_id, key).await? else {
            return Ok(None);
        };

        match raw.trim().parse::<u64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                warn!(guild_id, key, value = %raw, "setting is not a valid id; ignoring");
                Ok(None)
            }
        }
    }

    pub async fn set_id(&self, guild_id: u64, key: &str, id: Option<u64>) -> StoreResult<()> {
        let formatted = id.map(|id| id.to_string());
        self.set(guild_id, key, formatted.as_deref()).await
    }

    fn write_generation(&self, guild_id: u64, key: &str) -> u64 {
        self.writes
            .get(&(guild_id, key.to_owned()))
            .map_or(0, |generation| *generation)
    }

    async fn load(&self, guild_id: u64, key: &str) -> StoreResult<Option<String>> {
        let rows = self
            .table
            .filter(
                &Filter::new()
                    .with("guild_id", Value::from_id(guild_id)?)
                    .with("key", key),
                Query::new().order_by_desc("id").limit(1),
            )
            .await?;

        rows.first()
            .map(|row| row.get_text("value").map(str::to_owned))
            .transpose()
    }
}
