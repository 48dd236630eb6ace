use poise::serenity_prelude as serenity;

use crate::CommandMeta;
use crate::moderation::shared::{guild_only_message, lift_punishment, require_staff, usage_message};
use waffle_core::{Context, Error};
use waffle_moderation::PunishmentKind;

pub const META: CommandMeta = CommandMeta {
    name: "unban",
    desc: "Lift a user's ban and close the tracked case.",
    category: "moderation",
    usage: "!unban <user>",
};

#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "The user to unban"] user: Option<serenity::User>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_staff(ctx, guild_id, serenity::Permissions::BAN_MEMBERS).await? {
        return Ok(());
    }

    let Some(user) = user else {
        ctx.say(usage_message(META.usage)).await?;
        return Ok(());
    };

    lift_punishment(ctx, guild_id, &user, PunishmentKind::Ban).await
}
