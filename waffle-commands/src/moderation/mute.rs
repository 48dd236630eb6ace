use poise::serenity_prelude as serenity;

use crate::CommandMeta;
use crate::moderation::shared::{
    apply_punishment, guild_only_message, require_staff, split_duration, usage_message,
};
use waffle_core::{Context, Error};
use waffle_moderation::PunishmentKind;

pub const META: CommandMeta = CommandMeta {
    name: "mute",
    desc: "Mute a user with the configured mute role, optionally for a limited time.",
    category: "moderation",
    usage: "!mute <user> [duration] [reason]",
};

#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn mute(
    ctx: Context<'_>,
    #[description = "The user to mute"] user: Option<serenity::User>,
    #[description = "Optional duration (e.g. 1d12h) followed by a reason"]
    #[rest]
    rest: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_staff(ctx, guild_id, serenity::Permissions::MANAGE_ROLES).await? {
        return Ok(());
    }

    let Some(user) = user else {
        ctx.say(usage_message(META.usage)).await?;
        return Ok(());
    };

    let (duration, reason) = match split_duration(rest.as_deref()) {
        Ok(parsed) => parsed,
        Err(message) => {
            ctx.say(message).await?;
            return Ok(());
        }
    };

    apply_punishment(ctx, guild_id, &user, PunishmentKind::Mute, duration, reason).await
}
