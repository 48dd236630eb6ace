use poise::serenity_prelude as serenity;
use tracing::warn;

use crate::CommandMeta;
use crate::moderation::shared::{guild_only_message, require_staff, usage_message};
use waffle_core::{Context, Error};
use waffle_moderation::{MessageRef, ModerationError, RankError, ReactionMapping, can_modify_role};
use waffle_utils::parse::parse_snowflake;

pub const META: CommandMeta = CommandMeta {
    name: "reactionrole",
    desc: "Give out roles when members react to a message.",
    category: "roles",
    usage: "!reactionrole <add|remove|list>",
};

const ADD_USAGE: &str = "!reactionrole add <#channel> <message_id> <emoji> <@role> [nickname tag]";
const REMOVE_USAGE: &str = "!reactionrole remove <#channel> <message_id> <emoji>";
const LIST_USAGE: &str = "!reactionrole list <#channel> <message_id>";

#[poise::command(
    prefix_command,
    slash_command,
    category = "Roles",
    subcommands("add", "remove", "list")
)]
pub async fn reactionrole(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(usage_message(META.usage)).await?;
    Ok(())
}

/// Map an emoji on a message to a role.
#[poise::command(prefix_command, slash_command)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "Channel mention/id"] channel: Option<String>,
    #[description = "Message id"] message: Option<String>,
    #[description = "Emoji to react with"] emoji: Option<String>,
    #[description = "Role mention/id"] role: Option<String>,
    #[description = "Nickname tag applied with the role"]
    #[rest]
    nickname: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_staff(ctx, guild_id, serenity::Permissions::MANAGE_ROLES).await? {
        return Ok(());
    }

    let target = message_ref(guild_id, channel.as_deref(), message.as_deref());
    let role_id = role.as_deref().and_then(parse_snowflake);
    let (Some(target), Some(emoji), Some(role_id)) = (target, emoji, role_id) else {
        ctx.say(usage_message(ADD_USAGE)).await?;
        return Ok(());
    };

    let data = ctx.data();
    let Some(position) = data.platform.role_position(guild_id.get(), role_id).await? else {
        ctx.say("I couldn't find that role.").await?;
        return Ok(());
    };

    let actor = data
        .platform
        .member(guild_id.get(), ctx.author().id.get())
        .await?;
    let bot = data.platform.bot_member(guild_id.get()).await?;
    let owner_id = data.platform.guild_owner(guild_id.get()).await?;
    let checked = match actor {
        Some(actor) => can_modify_role(&actor, position, &bot, owner_id),
        None => Err(RankError::CantModify),
    };
    if let Err(rank) = checked {
        ctx.say(rank.to_string()).await?;
        return Ok(());
    }

    let nickname = nickname
        .map(|tag| tag.trim().to_owned())
        .filter(|tag| !tag.is_empty());

    match data
        .reaction_roles
        .add_mapping(target, &emoji, role_id, nickname)
        .await
    {
        Ok(()) => {
            ctx.say(format!("Reacting with {emoji} now toggles <@&{role_id}>."))
                .await?;
        }
        Err(ModerationError::Platform(source)) => {
            warn!(?source, message_id = target.message_id, "failed to attach reaction");
            ctx.say(format!(
                "The mapping was saved, but I couldn't react to that message: {source}"
            ))
            .await?;
        }
        Err(other) => return Err(other.into()),
    }

    Ok(())
}

/// Remove every mapping for an emoji on a message.
#[poise::command(prefix_command, slash_command)]
pub async fn remove(
    ctx: Context<'_>,
    #[description = "Channel mention/id"] channel: Option<String>,
    #[description = "Message id"] message: Option<String>,
    #[description = "Emoji to unmap"] emoji: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_staff(ctx, guild_id, serenity::Permissions::MANAGE_ROLES).await? {
        return Ok(());
    }

    let target = message_ref(guild_id, channel.as_deref(), message.as_deref());
    let (Some(target), Some(emoji)) = (target, emoji) else {
        ctx.say(usage_message(REMOVE_USAGE)).await?;
        return Ok(());
    };

    match ctx.data().reaction_roles.remove_mapping(target, &emoji).await {
        Ok(0) => {
            ctx.say(format!("{emoji} is not mapped on that message.")).await?;
        }
        Ok(removed) => {
            ctx.say(format!("Removed {removed} mapping(s) for {emoji}."))
                .await?;
        }
        Err(ModerationError::Platform(source)) => {
            warn!(?source, message_id = target.message_id, "failed to remove reaction");
            ctx.say(format!(
                "The mapping was removed, but I couldn't clear my reaction: {source}"
            ))
            .await?;
        }
        Err(other) => return Err(other.into()),
    }

    Ok(())
}

/// Show the mappings on a message.
#[poise::command(prefix_command, slash_command)]
pub async fn list(
    ctx: Context<'_>,
    #[description = "Channel mention/id"] channel: Option<String>,
    #[description = "Message id"] message: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_staff(ctx, guild_id, serenity::Permissions::MANAGE_ROLES).await? {
        return Ok(());
    }

    let Some(target) = message_ref(guild_id, channel.as_deref(), message.as_deref()) else {
        ctx.say(usage_message(LIST_USAGE)).await?;
        return Ok(());
    };

    let mappings = ctx.data().reaction_roles.mappings_for(target).await?;
    ctx.say(describe_mappings(&mappings)).await?;
    Ok(())
}

fn message_ref(
    guild_id: serenity::GuildId,
    channel: Option<&str>,
    message: Option<&str>,
) -> Option<MessageRef> {
    Some(MessageRef {
        guild_id: guild_id.get(),
        channel_id: parse_snowflake(channel?)?,
        message_id: parse_snowflake(message?)?,
    })
}

fn describe_mappings(mappings: &[ReactionMapping]) -> String {
    if mappings.is_empty() {
        return "No reaction roles are set up on that message.".to_owned();
    }

    mappings
        .iter()
        .map(|mapping| match mapping.nickname.as_deref() {
            Some(tag) => format!("{} → <@&{}> (tag: {tag})", mapping.emoji, mapping.role_id),
            None => format!("{} → <@&{}>", mapping.emoji, mapping.role_id),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
