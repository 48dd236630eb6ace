use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use waffle_database::{Settings, keys};
use waffle_utils::time::relative_timestamp;

use crate::infraction::PunishmentKind;
use crate::platform::Platform;

/// One line in a guild's moderation log.
#[derive(Clone, Debug, PartialEq)]
pub enum AuditEntry {
    Issued {
        id: i64,
        kind: PunishmentKind,
        user_id: u64,
        author_id: u64,
        reason: Option<String>,
        expiry: Option<DateTime<Utc>>,
    },
    Ended {
        id: i64,
        kind: PunishmentKind,
        user_id: u64,
    },
    ReversalFailed {
        id: i64,
        kind: PunishmentKind,
        user_id: u64,
        cause: String,
    },
    MuteReapplied {
        user_id: u64,
    },
    SettingChanged {
        author_id: u64,
        key: String,
        value: Option<String>,
    },
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEntry::Issued {
                id,
                kind,
                user_id,
                author_id,
                reason,
                expiry,
            } => {
                write!(
                    f,
                    "{} #{id} <@{user_id}> was {} by <@{author_id}>",
                    kind.emoji(),
                    kind.past_tense()
                )?;
                if let Some(expiry) = expiry {
                    write!(f, ", expires {}", relative_timestamp(*expiry))?;
                }
                write!(f, ". Reason: {}", reason.as_deref().unwrap_or("none given"))
            }
            AuditEntry::Ended { id, kind, user_id } => {
                write!(f, "⏱️ #{id} {kind} on <@{user_id}> has ended")
            }
            AuditEntry::ReversalFailed {
                id,
                kind,
                user_id,
                cause,
            } => write!(
                f,
                "❗ #{id} {kind} on <@{user_id}> ended but could not be reversed: {cause}"
            ),
            AuditEntry::MuteReapplied { user_id } => {
                write!(f, "🔇 <@{user_id}> rejoined while muted; mute role re-applied")
            }
            AuditEntry::SettingChanged {
                author_id,
                key,
                value,
            } => match value {
                Some(value) => write!(f, "⚙️ <@{author_id}> set `{key}` to `{value}`"),
                None => write!(f, "⚙️ <@{author_id}> cleared `{key}`"),
            },
        }
    }
}

/// Writes audit lines to the guild's configured moderation log channel.
#[derive(Clone)]
pub struct AuditLog {
    settings: Settings,
    platform: Arc<dyn Platform>,
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl AuditLog {
    pub fn new(settings: Settings, platform: Arc<dyn Platform>) -> Self {
        Self { settings, platform }
    }

    /// Never fails: a missing channel is a no-op and errors are logged.
    pub async fn record(&self, guild_id: u64, entry: &AuditEntry) {
        let channel_id = match self.settings.get_id(guild_id, keys::MODERATION_LOG).await {
            Ok(Some(channel_id)) => channel_id,
            Ok(None) => {
                debug!(guild_id, "no moderation log channel configured");
                return;
            }
            Err(source) => {
                warn!(?source, guild_id, "failed to read moderation log channel");
                return;
            }
        };

        if let Err(source) = self
            .platform
            .send_message(channel_id, entry.to_string())
            .await
        {
            warn!(?source, guild_id, channel_id, "failed to write moderation log entry");
        }
    }
}
