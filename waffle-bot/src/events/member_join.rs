use poise::serenity_prelude as serenity;
use tracing::{error, info};

use waffle_core::Data;

/// Put the mute role back on members who rejoin while muted.
pub async fn handle_member_join(data: &Data, member: &serenity::Member) {
    let guild_id = member.guild_id.get();
    let user_id = member.user.id.get();

    match data.punishments.on_member_join(guild_id, user_id).await {
        Ok(true) => info!(guild_id, user_id, "re-applied mute to returning member"),
        Ok(false) => {}
        Err(source) => error!(?source, guild_id, user_id, "failed to check returning member"),
    }
}
