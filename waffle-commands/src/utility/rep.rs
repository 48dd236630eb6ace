use poise::serenity_prelude as serenity;

use crate::CommandMeta;
use crate::moderation::shared::{guild_only_message, usage_message};
use waffle_core::{Context, Error};

pub const META: CommandMeta = CommandMeta {
    name: "rep",
    desc: "Give a member a reputation point.",
    category: "utility",
    usage: "!rep <member>",
};

#[poise::command(prefix_command, slash_command, category = "Utility")]
pub async fn rep(
    ctx: Context<'_>,
    #[description = "The member to thank"] member: Option<serenity::User>,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        ctx.say(guild_only_message()).await?;
        return Ok(());
    };

    let Some(member) = member else {
        ctx.say(usage_message(META.usage)).await?;
        return Ok(());
    };

    if member.id == ctx.author().id {
        ctx.say("You can't give reputation to yourself.").await?;
        return Ok(());
    }
    if member.bot {
        ctx.say("Bots don't collect reputation.").await?;
        return Ok(());
    }

    let points = ctx
        .data()
        .reputation
        .award(guild_id.get(), member.id.get())
        .await?;

    ctx.say(reputation_message(member.id.get(), points)).await?;
    Ok(())
}

fn reputation_message(member_id: u64, points: i64) -> String {
    let unit = if points == 1 { "point" } else { "points" };
    format!("🥇 <@{member_id}> now has `{points}` reputation {unit}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_are_pluralized() {
        assert_eq!(
            reputation_message(20, 1),
            "🥇 <@20> now has `1` reputation point."
        );
        assert_eq!(
            reputation_message(20, 7),
            "🥇 <@20> now has `7` reputation points."
        );
    }
}
