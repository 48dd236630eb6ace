use poise::serenity_prelude as serenity;

use waffle_core::{Context, Error};
use waffle_moderation::{AuditEntry, RankError, can_modify_role};
use waffle_utils::parse::parse_snowflake;

#[derive(Debug, PartialEq, Eq)]
pub enum SettingInput {
    Show,
    Clear,
    Set(u64),
    Invalid,
}

/// `clear`, a mention or a raw id. Nothing at all shows the current value.
pub fn parse_setting_input(input: Option<&str>) -> SettingInput {
    let Some(input) = input.map(str::trim).filter(|entry| !entry.is_empty()) else {
        return SettingInput::Show;
    };

    if input.eq_ignore_ascii_case("clear") {
        return SettingInput::Clear;
    }

    match parse_snowflake(input) {
        Some(id) => SettingInput::Set(id),
        None => SettingInput::Invalid,
    }
}

pub async fn record_change(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
    key: &str,
    value: Option<u64>,
) {
    let entry = AuditEntry::SettingChanged {
        author_id: ctx.author().id.get(),
        key: key.to_owned(),
        value: value.map(|id| id.to_string()),
    };
    ctx.data().audit.record(guild_id.get(), &entry).await;
}

/// Show, clear or set a role-valued guild setting.
///
/// When `check_rank` is set, both the caller and the bot must sit above the
/// role in the hierarchy.
pub async fn configure_role(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
    key: &str,
    label: &str,
    input: Option<&str>,
    check_rank: bool,
) -> Result<(), Error> {
    let data = ctx.data();
    let guild = guild_id.get();

    match parse_setting_input(input) {
        SettingInput::Show => match data.settings.get_id(guild, key).await? {
            Some(role_id) => {
                ctx.say(format!("<@&{role_id}> is the {label}.")).await?;
            }
            None => {
                ctx.say(format!("No {label} is configured on this server.")).await?;
            }
        },
        SettingInput::Clear => {
            data.settings.set_id(guild, key, None).await?;
            record_change(ctx, guild_id, key, None).await;
            ctx.say(format!("The {label} has been cleared.")).await?;
        }
        SettingInput::Set(role_id) => {
            let Some(position) = data.platform.role_position(guild, role_id).await? else {
                ctx.say("I couldn't find that role.").await?;
                return Ok(());
            };

            if check_rank {
                let actor = data.platform.member(guild, ctx.author().id.get()).await?;
                let bot = data.platform.bot_member(guild).await?;
                let owner_id = data.platform.guild_owner(guild).await?;
                let checked = match actor {
                    Some(actor) => can_modify_role(&actor, position, &bot, owner_id),
                    None => Err(RankError::CantModify),
                };
                if let Err(rank) = checked {
                    ctx.say(rank.to_string()).await?;
                    return Ok(());
                }
            }

            data.settings.set_id(guild, key, Some(role_id)).await?;
            record_change(ctx, guild_id, key, Some(role_id)).await;
            ctx.say(format!("<@&{role_id}> is now the {label}.")).await?;
        }
        SettingInput::Invalid => {
            ctx.say("Provide a valid role mention/id, or `clear`.").await?;
        }
    }

    Ok(())
}
