use poise::serenity_prelude as serenity;

use crate::CommandMeta;
use crate::moderation::config::setting::{SettingInput, parse_setting_input, record_change};
use crate::moderation::shared::{guild_only_message, require_staff};
use waffle_core::{Context, Error};
use waffle_database::keys;

pub const META: CommandMeta = CommandMeta {
    name: "modlog",
    desc: "Set or view the moderation log channel.",
    category: "moderation",
    usage: "!modlog [#channel|channel_id|clear]",
};

#[poise::command(prefix_command, slash_command, category = "Moderation")]
pub async fn modlog(
    ctx: Context<'_>,
    #[description = "Channel mention/id, or 'clear'"]
    #[rest]
    input: Option<String>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    if !require_staff(ctx, guild_id, serenity::Permissions::MANAGE_GUILD).await? {
        return Ok(());
    }

    let settings = &ctx.data().settings;
    match parse_setting_input(input.as_deref()) {
        SettingInput::Show => {
            match settings.get_id(guild_id.get(), keys::MODERATION_LOG).await? {
                Some(channel_id) => {
                    ctx.say(format!("<#{channel_id}> is the moderation log channel."))
                        .await?;
                }
                None => {
                    ctx.say("You have not set a moderation log channel yet on this server!")
                        .await?;
                }
            }
        }
        SettingInput::Clear => {
            record_change(ctx, guild_id, keys::MODERATION_LOG, None).await;
            settings
                .set_id(guild_id.get(), keys::MODERATION_LOG, None)
                .await?;
            ctx.say("Moderation log channel cleared.").await?;
        }
        SettingInput::Set(channel_id) => {
            settings
                .set_id(guild_id.get(), keys::MODERATION_LOG, Some(channel_id))
                .await?;
            record_change(ctx, guild_id, keys::MODERATION_LOG, Some(channel_id)).await;
            ctx.say(format!("<#{channel_id}> is now the moderation log."))
                .await?;
        }
        SettingInput::Invalid => {
            ctx.say("Provide a valid channel mention/id, or `clear`.")
                .await?;
        }
    }

    Ok(())
}
