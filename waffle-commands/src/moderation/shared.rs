use poise::serenity_prelude as serenity;
use tracing::error;

use waffle_core::{Context, Error};
use waffle_database::keys;
use waffle_moderation::{
    ModerationError, NewPunishment, Pardon, PunishmentKind, Reversal, ensure_can_modify_member,
};
use waffle_utils::formatting::format_compact_duration;
use waffle_utils::parse::{looks_like_duration, parse_duration_seconds};
use waffle_utils::permissions::has_permission;
use waffle_utils::time::expiry_after;

pub const INVALID_DURATION: &str =
    "The duration must be entered in the correct format (e.g. 1w2d).";

pub fn guild_only_message() -> &'static str {
    "This command can only be used in a server."
}

pub fn usage_message(usage: &str) -> String {
    format!("Usage: `{usage}`")
}

/// Split `[duration] [reason...]`. A leading token shaped like a duration
/// must parse, otherwise the whole input is the reason.
pub fn split_duration(rest: Option<&str>) -> Result<(Option<u64>, Option<String>), &'static str> {
    let Some(rest) = rest.map(str::trim).filter(|rest| !rest.is_empty()) else {
        return Ok((None, None));
    };

    let (first, remainder) = match rest.split_once(char::is_whitespace) {
        Some((first, remainder)) => (first, remainder.trim()),
        None => (rest, ""),
    };

    if !looks_like_duration(first) {
        return Ok((None, Some(rest.to_owned())));
    }

    let seconds = parse_duration_seconds(first).ok_or(INVALID_DURATION)?;
    let reason = Some(remainder)
        .filter(|reason| !reason.is_empty())
        .map(str::to_owned);

    Ok((Some(seconds), reason))
}

/// Staff are members with the Discord permission, or holders of the
/// configured admin or mod role.
pub async fn require_staff(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
    required: serenity::Permissions,
) -> Result<bool, Error> {
    require_access(ctx, guild_id, required, &[keys::ADMIN_ROLE, keys::MOD_ROLE]).await
}

/// Like [`require_staff`], but the mod role is not enough.
pub async fn require_admin(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
    required: serenity::Permissions,
) -> Result<bool, Error> {
    require_access(ctx, guild_id, required, &[keys::ADMIN_ROLE]).await
}

async fn require_access(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
    required: serenity::Permissions,
    role_keys: &[&str],
) -> Result<bool, Error> {
    if has_permission(ctx.http(), guild_id, ctx.author().id, required).await? {
        return Ok(true);
    }

    let data = ctx.data();
    if let Some(member) = data
        .platform
        .member(guild_id.get(), ctx.author().id.get())
        .await?
    {
        for key in role_keys {
            if let Some(role_id) = data.settings.get_id(guild_id.get(), key).await? {
                if member.has_role(role_id) {
                    return Ok(true);
                }
            }
        }
    }

    ctx.say("You do not have permission to do that.").await?;
    Ok(false)
}

pub fn punishment_message(
    kind: PunishmentKind,
    name: &str,
    author_id: u64,
    duration: Option<u64>,
    reason: Option<&str>,
    id: i64,
) -> String {
    let span = duration
        .map(|seconds| format!(" for {}", format_compact_duration(seconds)))
        .unwrap_or_default();

    format!(
        "{} {name} has been {}{span} by <@{author_id}>. Reason: {} (case #{id})",
        kind.emoji(),
        kind.past_tense(),
        reason.unwrap_or("none given")
    )
}

pub fn pardon_message(kind: PunishmentKind, name: &str, pardon: &Pardon) -> String {
    let verb = match kind {
        PunishmentKind::Ban => "unbanned",
        PunishmentKind::Mute => "unmuted",
        PunishmentKind::Kick | PunishmentKind::Warn => "pardoned",
    };

    match pardon {
        Pardon::Ended {
            id,
            reversal: Reversal::Failed(cause),
        } => format!("Case #{id} is closed, but {name} could not be {verb}: {cause}"),
        Pardon::Ended {
            id,
            reversal: Reversal::AlreadyEnded,
        } => format!("Case #{id} was already closed."),
        Pardon::Ended { id, .. } => format!("{name} has been {verb}. Case #{id} is closed."),
        Pardon::Untracked(Reversal::Failed(cause)) => {
            format!("{name} could not be {verb}: {cause}")
        }
        Pardon::Untracked(_) => format!("{name} has been {verb}."),
    }
}

/// Rank-check, apply and record a punishment, replying with the outcome.
pub async fn apply_punishment(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
    user: &serenity::User,
    kind: PunishmentKind,
    duration: Option<u64>,
    reason: Option<String>,
) -> Result<(), Error> {
    if user.id == ctx.author().id {
        ctx.say(format!("You can't {kind} yourself.")).await?;
        return Ok(());
    }

    let data = ctx.data();
    match ensure_can_modify_member(
        data.platform.as_ref(),
        guild_id.get(),
        ctx.author().id.get(),
        user.id.get(),
    )
    .await
    {
        Ok(()) => {}
        Err(ModerationError::Rank(rank)) => {
            ctx.say(rank.to_string()).await?;
            return Ok(());
        }
        Err(other) => return Err(other.into()),
    }

    let expiry = match duration {
        Some(seconds) => match expiry_after(seconds) {
            Some(expiry) => Some(expiry),
            None => {
                ctx.say(INVALID_DURATION).await?;
                return Ok(());
            }
        },
        None => None,
    };

    let new = NewPunishment::new(kind, guild_id.get(), ctx.author().id.get(), user.id.get())
        .reason(reason.clone())
        .expiry(expiry);

    match data.punishments.punish(new).await {
        Ok(id) => {
            let message = punishment_message(
                kind,
                &user.name,
                ctx.author().id.get(),
                duration,
                reason.as_deref(),
                id,
            );
            ctx.say(message).await?;
        }
        Err(ModerationError::MuteRoleMissing) => {
            ctx.say("No mute role is configured. Set one with `!muterole`.")
                .await?;
        }
        Err(ModerationError::Platform(source)) => {
            error!(?source, %kind, "punishment request failed");
            ctx.say(format!(
                "I couldn't {kind} that user. Check role hierarchy and permissions."
            ))
            .await?;
        }
        Err(other) => return Err(other.into()),
    }

    Ok(())
}

/// Lift an active punishment and reply with the outcome.
pub async fn lift_punishment(
    ctx: Context<'_>,
    guild_id: serenity::GuildId,
    user: &serenity::User,
    kind: PunishmentKind,
) -> Result<(), Error> {
    let pardon = ctx
        .data()
        .punishments
        .pardon(kind, guild_id.get(), user.id.get())
        .await?;

    ctx.say(pardon_message(kind, &user.name, &pardon)).await?;
    Ok(())
}
