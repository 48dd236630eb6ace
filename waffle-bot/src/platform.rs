//! [`Platform`] backed by the Discord REST API.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use tracing::debug;

use waffle_moderation::{MemberSnapshot, Platform, PlatformError, PlatformResult};

pub struct SerenityPlatform {
    http: Arc<serenity::Http>,
    bot_id: serenity::UserId,
}

impl SerenityPlatform {
    pub fn new(http: Arc<serenity::Http>, bot_id: serenity::UserId) -> Self {
        Self { http, bot_id }
    }

    fn http(&self) -> &serenity::Http {
        &self.http
    }

    async fn role_positions(
        &self,
        guild_id: u64,
    ) -> PlatformResult<HashMap<serenity::RoleId, u16>> {
        let roles = serenity::GuildId::new(guild_id)
            .roles(self.http())
            .await
            .map_err(classify)?;

        Ok(roles
            .into_iter()
            .map(|(role_id, role)| (role_id, role.position))
            .collect())
    }

    async fn snapshot(
        &self,
        guild_id: u64,
        user_id: serenity::UserId,
    ) -> PlatformResult<Option<MemberSnapshot>> {
        let member = match serenity::GuildId::new(guild_id)
            .member(self.http(), user_id)
            .await
            .map_err(classify)
        {
            Ok(member) => member,
            Err(PlatformError::NotFound(_)) => return Ok(None),
            Err(other) => return Err(other),
        };

        let positions = self.role_positions(guild_id).await?;
        Ok(Some(MemberSnapshot {
            user_id: member.user.id.get(),
            display_name: member.display_name().to_owned(),
            roles: member.roles.iter().map(|role_id| role_id.get()).collect(),
            bot: member.user.bot,
            top_role_position: top_role_position(&member.roles, &positions),
        }))
    }
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn member(&self, guild_id: u64, user_id: u64) -> PlatformResult<Option<MemberSnapshot>> {
        self.snapshot(guild_id, serenity::UserId::new(user_id)).await
    }

    async fn bot_member(&self, guild_id: u64) -> PlatformResult<MemberSnapshot> {
        self.snapshot(guild_id, self.bot_id)
            .await?
            .ok_or_else(|| PlatformError::NotFound("bot is not a member of the guild".to_owned()))
    }

    async fn guild_owner(&self, guild_id: u64) -> PlatformResult<u64> {
        let guild = serenity::GuildId::new(guild_id)
            .to_partial_guild(self.http())
            .await
            .map_err(classify)?;
        Ok(guild.owner_id.get())
    }

    async fn role_position(&self, guild_id: u64, role_id: u64) -> PlatformResult<Option<u16>> {
        let positions = self.role_positions(guild_id).await?;
        Ok(positions.get(&serenity::RoleId::new(role_id)).copied())
    }

    async fn send_message(&self, channel_id: u64, content: String) -> PlatformResult<()> {
        serenity::ChannelId::new(channel_id)
            .say(self.http(), content)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn direct_message(&self, user_id: u64, content: String) -> PlatformResult<()> {
        serenity::UserId::new(user_id)
            .direct_message(self.http(), serenity::CreateMessage::new().content(content))
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn ban(&self, guild_id: u64, user_id: u64, reason: Option<String>) -> PlatformResult<()> {
        let guild = serenity::GuildId::new(guild_id);
        let user = serenity::UserId::new(user_id);
        match reason {
            Some(reason) => guild.ban_with_reason(self.http(), user, 0, &reason).await,
            None => guild.ban(self.http(), user, 0).await,
        }
        .map_err(classify)
    }

    async fn unban(&self, guild_id: u64, user_id: u64) -> PlatformResult<()> {
        serenity::GuildId::new(guild_id)
            .unban(self.http(), serenity::UserId::new(user_id))
            .await
            .map_err(classify)
    }

    async fn kick(&self, guild_id: u64, user_id: u64, reason: Option<String>) -> PlatformResult<()> {
        let guild = serenity::GuildId::new(guild_id);
        let user = serenity::UserId::new(user_id);
        match reason {
            Some(reason) => guild.kick_with_reason(self.http(), user, &reason).await,
            None => guild.kick(self.http(), user).await,
        }
        .map_err(classify)
    }

    async fn add_roles(&self, guild_id: u64, user_id: u64, role_ids: Vec<u64>) -> PlatformResult<()> {
        for role_id in role_ids {
            self.http()
                .add_member_role(
                    serenity::GuildId::new(guild_id),
                    serenity::UserId::new(user_id),
                    serenity::RoleId::new(role_id),
                    None,
                )
                .await
                .map_err(classify)?;
        }
        Ok(())
    }

    async fn remove_roles(
        &self,
        guild_id: u64,
        user_id: u64,
        role_ids: Vec<u64>,
    ) -> PlatformResult<()> {
        for role_id in role_ids {
            self.http()
                .remove_member_role(
                    serenity::GuildId::new(guild_id),
                    serenity::UserId::new(user_id),
                    serenity::RoleId::new(role_id),
                    None,
                )
                .await
                .map_err(classify)?;
        }
        Ok(())
    }

    async fn set_nickname(
        &self,
        guild_id: u64,
        user_id: u64,
        nickname: Option<String>,
    ) -> PlatformResult<()> {
        // An empty nickname resets to the account name.
        let builder = serenity::EditMember::new().nickname(nickname.unwrap_or_default());
        serenity::GuildId::new(guild_id)
            .edit_member(self.http(), serenity::UserId::new(user_id), builder)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: String,
    ) -> PlatformResult<()> {
        serenity::ChannelId::new(channel_id)
            .create_reaction(
                self.http(),
                serenity::MessageId::new(message_id),
                reaction_type(&emoji)?,
            )
            .await
            .map_err(classify)
    }

    async fn remove_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: String,
        user_id: Option<u64>,
    ) -> PlatformResult<()> {
        serenity::ChannelId::new(channel_id)
            .delete_reaction(
                self.http(),
                serenity::MessageId::new(message_id),
                user_id.map(serenity::UserId::new),
                reaction_type(&emoji)?,
            )
            .await
            .map_err(classify)
    }
}

/// Highest position among the held roles; `0` when only `@everyone` applies.
fn top_role_position(held: &[serenity::RoleId], positions: &HashMap<serenity::RoleId, u16>) -> u16 {
    held.iter()
        .filter_map(|role_id| positions.get(role_id))
        .copied()
        .max()
        .unwrap_or(0)
}

fn reaction_type(emoji: &str) -> PlatformResult<serenity::ReactionType> {
    serenity::ReactionType::try_from(emoji)
        .map_err(|_| PlatformError::Other(format!("`{emoji}` is not a usable emoji")))
}

fn classify(error: ::serenity::Error) -> PlatformError {
    if let ::serenity::Error::Http(::serenity::http::HttpError::UnsuccessfulRequest(response)) = &error
    {
        let message = response.error.message.clone();
        match response.status_code.as_u16() {
            404 => return PlatformError::NotFound(message),
            403 => return PlatformError::Forbidden(message),
            status => debug!(status, "unclassified discord error"),
        }
    }

    PlatformError::Other(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_role_is_the_highest_held_position() {
        let positions = HashMap::from([
            (serenity::RoleId::new(10), 3),
            (serenity::RoleId::new(11), 7),
            (serenity::RoleId::new(12), 9),
        ]);
        let held = [serenity::RoleId::new(10), serenity::RoleId::new(11)];

        assert_eq!(top_role_position(&held, &positions), 7);
        assert_eq!(top_role_position(&[], &positions), 0);
    }

    #[test]
    fn unicode_and_custom_emoji_parse() {
        assert!(matches!(
            reaction_type("🍎"),
            Ok(serenity::ReactionType::Unicode(ref emoji)) if emoji == "🍎"
        ));
        assert!(matches!(
            reaction_type("<:waffle:123456789>"),
            Ok(serenity::ReactionType::Custom { .. })
        ));
    }

    #[test]
    fn non_http_errors_are_other() {
        let error = ::serenity::Error::Other("gateway closed");
        assert_eq!(
            classify(error),
            PlatformError::Other("gateway closed".to_owned())
        );
    }
}
