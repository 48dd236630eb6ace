use poise::serenity_prelude as serenity;

use crate::CommandMeta;
use crate::moderation::shared::{
    apply_punishment, guild_only_message, require_staff, split_duration, usage_message,
};
use waffle_core::{Context, Error};
use waffle_moderation::PunishmentKind;

pub const META: CommandMeta = CommandMeta {
    name: "warn",
    desc: "Warn a user, optionally for a limited time.",
    category: "moderation",
    usage: "!warn <user> [duration] [reason]",
};

#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn warn(
    ctx: Context<'_>,
    #[description = "The user to warn"] user: Option<serenity::User>,
    #[description = "Optional duration (e.g. 1d12h) followed by a reason"]
    #[rest]
    rest: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_staff(ctx, guild_id, serenity::Permissions::MODERATE_MEMBERS).await? {
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

    apply_punishment(ctx, guild_id, &user, PunishmentKind::Warn, duration, reason).await
}
