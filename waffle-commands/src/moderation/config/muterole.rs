use poise::serenity_prelude as serenity;

use crate::CommandMeta;
use crate::moderation::config::setting::configure_role;
use crate::moderation::shared::{guild_only_message, require_staff};
use waffle_core::{Context, Error};
use waffle_database::keys;

pub const META: CommandMeta = CommandMeta {
    name: "muterole",
    desc: "Set or view the role applied by mute.",
    category: "moderation",
    usage: "!muterole [@role|role_id|clear]",
};

#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn muterole(
    ctx: Context<'_>,
    #[description = "Role mention/id, or 'clear'"]
    #[rest]
    input: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_staff(ctx, guild_id, serenity::Permissions::MANAGE_ROLES).await? {
        return Ok(());
    }

    configure_role(
        ctx,
        guild_id,
        keys::MUTE_ROLE,
        "mute role",
        input.as_deref(),
        true,
    )
    .await
}
