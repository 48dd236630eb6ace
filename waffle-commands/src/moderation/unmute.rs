use poise::serenity_prelude as serenity;

use crate::CommandMeta;
use crate::moderation::shared::{guild_only_message, lift_punishment, require_staff, usage_message};
use waffle_core::{Context, Error};
use waffle_moderation::{ModerationError, PunishmentKind, ensure_can_modify_member};

pub const META: CommandMeta = CommandMeta {
    name: "unmute",
    desc: "Remove the mute role from a user and close the tracked case.",
    category: "moderation",
    usage: "!unmute <user>",
};

#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn unmute(
    ctx: Context<'_>,
    #[description = "The user to unmute"] user: Option<serenity::User>,
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

    let checked = ensure_can_modify_member(
        ctx.data().platform.as_ref(),
        guild_id.get(),
        ctx.author().id.get(),
        user.id.get(),
    )
    .await;
    match checked {
        Ok(()) => {}
        Err(ModerationError::Rank(rank)) => {
            ctx.say(rank.to_string()).await?;
            return Ok(());
        }
        Err(other) => return Err(other.into()),
    }

    lift_punishment(ctx, guild_id, &user, PunishmentKind::Mute).await
}
