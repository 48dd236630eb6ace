use poise::serenity_prelude as serenity;
use tracing::{debug, error};

use waffle_core::Data;
use waffle_moderation::{MessageRef, ReactionEvent, ToggleOutcome};

/// Toggle mapped roles when a member reacts to a reaction-role message.
pub async fn handle_reaction_add(data: &Data, reaction: &serenity::Reaction) {
    let (Some(guild_id), Some(user_id)) = (reaction.guild_id, reaction.user_id) else {
        return;
    };

    let member = match data.platform.member(guild_id.get(), user_id.get()).await {
        Ok(Some(member)) => member,
        Ok(None) => return,
        Err(source) => {
            error!(?source, "failed to resolve reacting member");
            return;
        }
    };

    let event = ReactionEvent {
        message: MessageRef {
            guild_id: guild_id.get(),
            channel_id: reaction.channel_id.get(),
            message_id: reaction.message_id.get(),
        },
        emoji: reaction.emoji.to_string(),
        member,
    };

    match data.reaction_roles.on_reaction(&event).await {
        Ok(ToggleOutcome::Added(roles)) => {
            debug!(user_id = user_id.get(), ?roles, "reaction roles added");
        }
        Ok(ToggleOutcome::Removed(roles)) => {
            debug!(user_id = user_id.get(), ?roles, "reaction roles removed");
        }
        Ok(ToggleOutcome::Ignored | ToggleOutcome::Unmapped) => {}
        Err(source) => {
            error!(?source, message_id = event.message.message_id, "reaction role toggle failed");
        }
    }
}
