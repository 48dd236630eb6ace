//! Role hierarchy checks run before any moderation action.

use thiserror::Error;

use crate::error::ModerationResult;
use crate::platform::{MemberSnapshot, Platform};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RankError {
    #[error("You do not have permission to do that.")]
    CantModify,

    #[error("I do not have permission to do that.")]
    BotHasLowRank,
}

/// The actor must own the guild or outrank the target, and the bot must
/// outrank the target.
pub fn can_modify_member(
    actor: &MemberSnapshot,
    target: &MemberSnapshot,
    bot: &MemberSnapshot,
    owner_id: u64,
) -> Result<(), RankError> {
    can_modify_position(actor, target.top_role_position, bot, owner_id)
}

pub fn can_modify_role(
    actor: &MemberSnapshot,
    role_position: u16,
    bot: &MemberSnapshot,
    owner_id: u64,
) -> Result<(), RankError> {
    can_modify_position(actor, role_position, bot, owner_id)
}

fn can_modify_position(
    actor: &MemberSnapshot,
    position: u16,
    bot: &MemberSnapshot,
    owner_id: u64,
) -> Result<(), RankError> {
    if actor.user_id != owner_id && actor.top_role_position <= position {
        return Err(RankError::CantModify);
    }
    if bot.top_role_position <= position {
        return Err(RankError::BotHasLowRank);
    }
    Ok(())
}

/// Resolve everyone involved and run [`can_modify_member`].
///
/// A target who is not in the guild (e.g. banning by id) has nothing to
/// outrank. An actor who cannot be resolved fails the check.
pub async fn ensure_can_modify_member(
    platform: &dyn Platform,
    guild_id: u64,
    actor_id: u64,
    target_id: u64,
) -> ModerationResult<()> {
    let Some(target) = platform.member(guild_id, target_id).await? else {
        return Ok(());
    };
    let Some(actor) = platform.member(guild_id, actor_id).await? else {
        return Err(RankError::CantModify.into());
    };
    let bot = platform.bot_member(guild_id).await?;
    let owner_id = platform.guild_owner(guild_id).await?;

    can_modify_member(&actor, &target, &bot, owner_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModerationError;
    use crate::testing::{FakeGuild, member};

    #[test]
    fn higher_roles_may_modify_lower_ones() {
        let actor = member(10, 5);
        let target = member(11, 3);
        let bot = member(99, 8);

        assert_eq!(can_modify_member(&actor, &target, &bot, 1), Ok(()));
    }

    #[test]
    fn equal_rank_is_not_enough() {
        let actor = member(10, 5);
        let target = member(11, 5);
        let bot = member(99, 8);

        assert_eq!(
            can_modify_member(&actor, &target, &bot, 1),
            Err(RankError::CantModify)
        );
    }

    #[test]
    fn owners_bypass_the_actor_check_but_not_the_bot_check() {
        let owner = member(1, 0);
        let target = member(11, 5);

        assert_eq!(can_modify_member(&owner, &target, &member(99, 8), 1), Ok(()));
        assert_eq!(
            can_modify_member(&owner, &target, &member(99, 5), 1),
            Err(RankError::BotHasLowRank)
        );
    }

    #[test]
    fn role_checks_use_the_role_position() {
        let actor = member(10, 5);
        let bot = member(99, 8);

        assert_eq!(can_modify_role(&actor, 4, &bot, 1), Ok(()));
        assert_eq!(can_modify_role(&actor, 6, &bot, 1), Err(RankError::CantModify));
    }

    #[tokio::test]
    async fn resolves_members_through_the_platform() {
        let (platform, _log) = FakeGuild::new()
            .with_member(member(10, 5))
            .with_member(member(11, 7))
            .build();

        let err = ensure_can_modify_member(platform.as_ref(), 1, 10, 11)
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Rank(RankError::CantModify)));

        // Not in the guild.
        ensure_can_modify_member(platform.as_ref(), 1, 10, 12)
            .await
            .unwrap();
    }

    #[test]
    fn messages_match_the_user_facing_text() {
        assert_eq!(
            RankError::CantModify.to_string(),
            "You do not have permission to do that."
        );
        assert_eq!(
            RankError::BotHasLowRank.to_string(),
            "I do not have permission to do that."
        );
    }
}
