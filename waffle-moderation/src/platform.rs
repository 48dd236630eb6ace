//! The chat-platform capabilities the moderation core relies on.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("missing permissions: {0}")]
    Forbidden(String),

    #[error("platform request failed: {0}")]
    Other(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// What the core needs to know about a guild member at one point in time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberSnapshot {
    pub user_id: u64,
    pub display_name: String,
    pub roles: Vec<u64>,
    pub bot: bool,
    /// Position of the highest role held; `0` is `@everyone`.
    pub top_role_position: u16,
}

impl MemberSnapshot {
    pub fn has_role(&self, role_id: u64) -> bool {
        self.roles.contains(&role_id)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Platform: Send + Sync {
    /// `Ok(None)` when the user is not in the guild.
    async fn member(&self, guild_id: u64, user_id: u64) -> PlatformResult<Option<MemberSnapshot>>;

    async fn bot_member(&self, guild_id: u64) -> PlatformResult<MemberSnapshot>;

    async fn guild_owner(&self, guild_id: u64) -> PlatformResult<u64>;

    async fn role_position(&self, guild_id: u64, role_id: u64) -> PlatformResult<Option<u16>>;

    async fn send_message(&self, channel_id: u64, content: String) -> PlatformResult<()>;

    async fn direct_message(&self, user_id: u64, content: String) -> PlatformResult<()>;

    async fn ban(&self, guild_id: u64, user_id: u64, reason: Option<String>) -> PlatformResult<()>;

    async fn unban(&self, guild_id: u64, user_id: u64) -> PlatformResult<()>;

    async fn kick(&self, guild_id: u64, user_id: u64, reason: Option<String>) -> PlatformResult<()>;

    async fn add_roles(&self, guild_id: u64, user_id: u64, role_ids: Vec<u64>) -> PlatformResult<()>;

    async fn remove_roles(
        &self,
        guild_id: u64,
        user_id: u64,
        role_ids: Vec<u64>,
    ) -> PlatformResult<()>;

    /// `None` resets the nickname.
    async fn set_nickname(
        &self,
        guild_id: u64,
        user_id: u64,
        nickname: Option<String>,
    ) -> PlatformResult<()>;

    async fn add_reaction(&self, channel_id: u64, message_id: u64, emoji: String)
    -> PlatformResult<()>;

    /// Removes `user_id`'s reaction, or the bot's own when `None`.
    async fn remove_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: String,
        user_id: Option<u64>,
    ) -> PlatformResult<()>;
}
