use poise::serenity_prelude as serenity;

use crate::CommandMeta;
use crate::moderation::shared::{
    apply_punishment, guild_only_message, require_staff, usage_message,
};
use waffle_core::{Context, Error};
use waffle_moderation::PunishmentKind;

pub const META: CommandMeta = CommandMeta {
    name: "kick",
    desc: "Kick a user from the server.",
    category: "moderation",
    usage: "!kick <user> [reason]",
};

#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "The user to kick"] user: Option<serenity::User>,
    #[description = "Reason for the kick"]
    #[rest]
    rest: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_staff(ctx, guild_id, serenity::Permissions::KICK_MEMBERS).await? {
        return Ok(());
    }

    let Some(user) = user else {
        ctx.say(usage_message(META.usage)).await?;
        return Ok(());
    };

    let reason = rest
        .map(|reason| reason.trim().to_owned())
        .filter(|reason| !reason.is_empty());

    apply_punishment(ctx, guild_id, &user, PunishmentKind::Kick, None, reason).await
}
