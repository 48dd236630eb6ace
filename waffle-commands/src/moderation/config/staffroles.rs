//! Roles that grant access to staff commands without the matching Discord
//! permission.

use poise::serenity_prelude as serenity;

use crate::CommandMeta;
use crate::moderation::config::setting::configure_role;
use crate::moderation::shared::{guild_only_message, require_admin};
use waffle_core::{Context, Error};
use waffle_database::keys;

pub const ADMINROLE_META: CommandMeta = CommandMeta {
    name: "adminrole",
    desc: "Set or view the admin role. Server owner only.",
    category: "moderation",
    usage: "!adminrole [@role|role_id|clear]",
};

pub const MODROLE_META: CommandMeta = CommandMeta {
    name: "modrole",
    desc: "Set or view the moderator role.",
    category: "moderation",
    usage: "!modrole [@role|role_id|clear]",
};

#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn adminrole(
    ctx: Context<'_>,
    #[description = "Role mention/id, or 'clear'"]
    #[rest]
    input: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    let owner_id = ctx.data().platform.guild_owner(guild_id.get()).await?;
    if owner_id != ctx.author().id.get() {
        ctx.say("Only the server owner can change the admin role.")
            .await?;
        return Ok(());
    }

    configure_role(
        ctx,
        guild_id,
        keys::ADMIN_ROLE,
        "admin role",
        input.as_deref(),
        false,
    )
    .await
}

#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn modrole(
    ctx: Context<'_>,
    #[description = "Role mention/id, or 'clear'"]
    #[rest]
    input: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_admin(ctx, guild_id, serenity::Permissions::MANAGE_GUILD).await? {
        return Ok(());
    }

    configure_role(
        ctx,
        guild_id,
        keys::MOD_ROLE,
        "moderator role",
        input.as_deref(),
        false,
    )
    .await
}
