//! Reaction-driven role toggles.
//!
//! A message can carry several mappings per emoji. Reacting toggles the whole
//! set of mapped roles as a unit and the bot then removes the reaction so the
//! emoji can be pressed again.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};
use waffle_database::{
    Field, FieldKind, Filter, Query, Record, RecordStore, Scope, Table, TableSchema, Value,
};
use waffle_utils::formatting::{strip_nickname_tag, tag_nickname};

use crate::error::ModerationResult;
use crate::platform::{MemberSnapshot, Platform, PlatformError, PlatformResult};

pub const REACTION_ROLES_TABLE: &str = "reaction_roles";

pub fn reaction_roles_schema() -> TableSchema {
    TableSchema::new(
        REACTION_ROLES_TABLE,
        [
            Field::new("guild_id", FieldKind::BigInteger).not_null(),
            Field::new("channel_id", FieldKind::BigInteger).not_null(),
            Field::new("message_id", FieldKind::BigInteger).not_null(),
            Field::new("emoji", FieldKind::Text).not_null(),
            Field::new("role_id", FieldKind::BigInteger).not_null(),
            Field::new("nickname", FieldKind::Text),
        ],
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

impl MessageRef {
    fn filter(&self) -> ModerationResult<Filter> {
        Ok(Filter::new()
            .with("guild_id", Value::from_id(self.guild_id)?)
            .with("channel_id", Value::from_id(self.channel_id)?)
            .with("message_id", Value::from_id(self.message_id)?))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionMapping {
    pub message: MessageRef,
    pub emoji: String,
    pub role_id: u64,
    pub nickname: Option<String>,
}

impl ReactionMapping {
    fn from_record(record: &Record) -> ModerationResult<Self> {
        Ok(Self {
            message: MessageRef {
                guild_id: record.get_id("guild_id")?,
                channel_id: record.get_id("channel_id")?,
                message_id: record.get_id("message_id")?,
            },
            emoji: record.get_text("emoji")?.to_owned(),
            role_id: record.get_id("role_id")?,
            nickname: record.get_opt_text("nickname")?.map(str::to_owned),
        })
    }
}

/// A member added a reaction to a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionEvent {
    pub message: MessageRef,
    pub emoji: String,
    pub member: MemberSnapshot,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Reactions from bots are not processed.
    Ignored,
    /// The emoji has no mappings on that message.
    Unmapped,
    Added(Vec<u64>),
    Removed(Vec<u64>),
}

#[derive(Clone)]
pub struct ReactionRoleEngine {
    table: Table,
    platform: Arc<dyn Platform>,
}

impl fmt::Debug for ReactionRoleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionRoleEngine")
            .field("table", &self.table.name())
            .finish_non_exhaustive()
    }
}

impl ReactionRoleEngine {
    pub async fn setup(store: &RecordStore, platform: Arc<dyn Platform>) -> ModerationResult<Self> {
        let table = store.ensure_table(reaction_roles_schema()).await?;
        Ok(Self { table, platform })
    }

    /// Persist a mapping and put the emoji on the message.
    pub async fn add_mapping(
        &self,
        message: MessageRef,
        emoji: &str,
        role_id: u64,
        nickname: Option<String>,
    ) -> ModerationResult<()> {
        let nickname = nickname.filter(|tag| !tag.trim().is_empty());
        self.table
            .insert(
                &Record::new()
                    .with("guild_id", Value::from_id(message.guild_id)?)
                    .with("channel_id", Value::from_id(message.channel_id)?)
                    .with("message_id", Value::from_id(message.message_id)?)
                    .with("emoji", emoji)
                    .with("role_id", Value::from_id(role_id)?)
                    .with("nickname", nickname),
            )
            .await?;

        self.platform
            .add_reaction(message.channel_id, message.message_id, emoji.to_owned())
            .await?;

        Ok(())
    }

    /// Drop every mapping for `emoji` on the message and take the bot's reaction off.
    pub async fn remove_mapping(&self, message: MessageRef, emoji: &str) -> ModerationResult<u64> {
        let removed = self
            .table
            .delete(&Scope::Matching(message.filter()?.with("emoji", emoji)))
            .await?;

        self.platform
            .remove_reaction(message.channel_id, message.message_id, emoji.to_owned(), None)
            .await?;

        Ok(removed)
    }

    pub async fn mappings_for(&self, message: MessageRef) -> ModerationResult<Vec<ReactionMapping>> {
        let rows = self
            .table
            .filter(&message.filter()?, Query::new().order_by("id"))
            .await?;

        rows.iter().map(ReactionMapping::from_record).collect()
    }

    /// Toggle the roles mapped to the reacted emoji.
    ///
    /// If the member already holds every mapped role they are all removed and
    /// the nickname tag is dropped; otherwise all are added and the first
    /// configured tag is applied. The triggering reaction is removed either way.
    pub async fn on_reaction(&self, event: &ReactionEvent) -> ModerationResult<ToggleOutcome> {
        if event.member.bot {
            return Ok(ToggleOutcome::Ignored);
        }

        let rows = self
            .table
            .filter(
                &event.message.filter()?.with("emoji", event.emoji.as_str()),
                Query::new().order_by("id"),
            )
            .await?;
        if rows.is_empty() {
            return Ok(ToggleOutcome::Unmapped);
        }

        let mappings = rows
            .iter()
            .map(ReactionMapping::from_record)
            .collect::<ModerationResult<Vec<_>>>()?;

        let toggled = self.toggle(event, &mappings).await;

        if let Err(source) = self
            .platform
            .remove_reaction(
                event.message.channel_id,
                event.message.message_id,
                event.emoji.clone(),
                Some(event.member.user_id),
            )
            .await
        {
            warn!(
                ?source,
                message_id = event.message.message_id,
                user_id = event.member.user_id,
                "failed to remove triggering reaction"
            );
        }

        Ok(toggled?)
    }

    async fn toggle(
        &self,
        event: &ReactionEvent,
        mappings: &[ReactionMapping],
    ) -> PlatformResult<ToggleOutcome> {
        let mut roles: Vec<u64> = Vec::with_capacity(mappings.len());
        for mapping in mappings {
            if !roles.contains(&mapping.role_id) {
                roles.push(mapping.role_id);
            }
        }
        let tag = mappings
            .iter()
            .find_map(|mapping| mapping.nickname.as_deref().filter(|tag| !tag.is_empty()));

        let guild_id = event.message.guild_id;
        let member = &event.member;

        if roles.iter().all(|role| member.has_role(*role)) {
            self.platform
                .remove_roles(guild_id, member.user_id, roles.clone())
                .await?;
            if tag.is_some() {
                let base = strip_nickname_tag(&member.display_name).to_owned();
                self.set_nickname(guild_id, member.user_id, base).await?;
            }
            Ok(ToggleOutcome::Removed(roles))
        } else {
            self.platform
                .add_roles(guild_id, member.user_id, roles.clone())
                .await?;
            if let Some(tag) = tag {
                let tagged = tag_nickname(&member.display_name, tag);
                self.set_nickname(guild_id, member.user_id, tagged).await?;
            }
            Ok(ToggleOutcome::Added(roles))
        }
    }

    async fn set_nickname(&self, guild_id: u64, user_id: u64, nickname: String) -> PlatformResult<()> {
        match self
            .platform
            .set_nickname(guild_id, user_id, Some(nickname))
            .await
        {
            Err(PlatformError::Forbidden(reason)) => {
                debug!(guild_id, user_id, %reason, "not allowed to change nickname");
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BOT_ID, Call, CallLog, FakeGuild, member};

    const MESSAGE: MessageRef = MessageRef {
        guild_id: 1,
        channel_id: 2,
        message_id: 3,
    };

    async fn engine(fake: FakeGuild) -> (ReactionRoleEngine, CallLog) {
        let (platform, log) = fake.build();
        let engine = ReactionRoleEngine::setup(&RecordStore::memory(), platform)
            .await
            .unwrap();
        (engine, log)
    }

    fn reaction(emoji: &str, member: MemberSnapshot) -> ReactionEvent {
        ReactionEvent {
            message: MESSAGE,
            emoji: emoji.to_owned(),
            member,
        }
    }

    fn holding(user_id: u64, roles: &[u64], display_name: &str) -> MemberSnapshot {
        MemberSnapshot {
            roles: roles.to_vec(),
            display_name: display_name.to_owned(),
            ..member(user_id, 1)
        }
    }

    #[tokio::test]
    async fn adding_a_mapping_reacts_on_the_message() {
        let (engine, log) = engine(FakeGuild::new()).await;
        engine.add_mapping(MESSAGE, "🍎", 40, None).await.unwrap();

        assert_eq!(
            log.calls(),
            vec![Call::AddReaction {
                message: 3,
                emoji: "🍎".to_owned(),
            }]
        );
        let mappings = engine.mappings_for(MESSAGE).await.unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].role_id, 40);
    }

    #[tokio::test]
    async fn removing_a_mapping_drops_rows_and_the_bot_reaction() {
        let (engine, log) = engine(FakeGuild::new()).await;
        engine.add_mapping(MESSAGE, "🍎", 40, None).await.unwrap();
        engine.add_mapping(MESSAGE, "🍐", 41, None).await.unwrap();

        assert_eq!(engine.remove_mapping(MESSAGE, "🍎").await.unwrap(), 1);
        assert!(log.calls().contains(&Call::RemoveReaction {
            message: 3,
            emoji: "🍎".to_owned(),
            user: None,
        }));

        let remaining = engine.mappings_for(MESSAGE).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].emoji, "🍐");
    }

    #[tokio::test]
    async fn missing_roles_are_added_and_nickname_tagged() {
        let (engine, log) = engine(FakeGuild::new()).await;
        engine
            .add_mapping(MESSAGE, "🔴", 40, Some("Red".to_owned()))
            .await
            .unwrap();
        engine.add_mapping(MESSAGE, "🔴", 41, None).await.unwrap();

        let outcome = engine
            .on_reaction(&reaction("🔴", holding(20, &[40], "Alice")))
            .await
            .unwrap();

        assert_eq!(outcome, ToggleOutcome::Added(vec![40, 41]));
        let calls = log.calls();
        assert!(calls.contains(&Call::AddRoles {
            guild: 1,
            user: 20,
            roles: vec![40, 41],
        }));
        assert!(calls.contains(&Call::Nickname {
            user: 20,
            nickname: Some("Alice || Red".to_owned()),
        }));
        assert_eq!(
            calls.last(),
            Some(&Call::RemoveReaction {
                message: 3,
                emoji: "🔴".to_owned(),
                user: Some(20),
            })
        );
    }

    #[tokio::test]
    async fn held_roles_are_removed_and_tag_stripped() {
        let (engine, log) = engine(FakeGuild::new()).await;
        engine
            .add_mapping(MESSAGE, "🔴", 40, Some("Red".to_owned()))
            .await
            .unwrap();

        let outcome = engine
            .on_reaction(&reaction("🔴", holding(20, &[40, 99], "Alice || Red")))
            .await
            .unwrap();

        assert_eq!(outcome, ToggleOutcome::Removed(vec![40]));
        let calls = log.calls();
        assert!(calls.contains(&Call::RemoveRoles {
            guild: 1,
            user: 20,
            roles: vec![40],
        }));
        assert!(calls.contains(&Call::Nickname {
            user: 20,
            nickname: Some("Alice".to_owned()),
        }));
    }

    #[tokio::test]
    async fn unrelated_roles_are_never_touched() {
        let (engine, log) = engine(FakeGuild::new()).await;
        engine.add_mapping(MESSAGE, "🔴", 40, None).await.unwrap();
        engine.add_mapping(MESSAGE, "🔵", 50, None).await.unwrap();

        engine
            .on_reaction(&reaction("🔴", holding(20, &[50, 60], "Bob")))
            .await
            .unwrap();

        let touched: Vec<Vec<u64>> = log
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::AddRoles { roles, .. } | Call::RemoveRoles { roles, .. } => Some(roles),
                _ => None,
            })
            .collect();
        assert_eq!(touched, vec![vec![40]]);
    }

    #[tokio::test]
    async fn bots_and_unmapped_emoji_do_nothing() {
        let (engine, log) = engine(FakeGuild::new()).await;
        engine.add_mapping(MESSAGE, "🔴", 40, None).await.unwrap();
        let baseline = log.calls().len();

        let mut bot = member(BOT_ID, 50);
        bot.bot = true;
        assert_eq!(
            engine.on_reaction(&reaction("🔴", bot)).await.unwrap(),
            ToggleOutcome::Ignored
        );
        assert_eq!(
            engine
                .on_reaction(&reaction("🟢", holding(20, &[], "Alice")))
                .await
                .unwrap(),
            ToggleOutcome::Unmapped
        );
        assert_eq!(log.calls().len(), baseline);
    }

    #[tokio::test]
    async fn forbidden_nickname_changes_are_swallowed() {
        let (engine, log) = engine(FakeGuild::new().forbid_nicknames()).await;
        engine
            .add_mapping(MESSAGE, "🔴", 40, Some("Red".to_owned()))
            .await
            .unwrap();

        let outcome = engine
            .on_reaction(&reaction("🔴", holding(20, &[], "Owner")))
            .await
            .unwrap();

        assert_eq!(outcome, ToggleOutcome::Added(vec![40]));
        assert_eq!(
            log.count(|call| matches!(call, Call::RemoveReaction { user: Some(20), .. })),
            1
        );
    }

    #[tokio::test]
    async fn long_names_fit_after_tagging() {
        let (engine, log) = engine(FakeGuild::new()).await;
        engine
            .add_mapping(MESSAGE, "🔴", 40, Some("Crimson".to_owned()))
            .await
            .unwrap();

        engine
            .on_reaction(&reaction("🔴", holding(20, &[], &"N".repeat(40))))
            .await
            .unwrap();

        let nickname = log
            .calls()
            .into_iter()
            .find_map(|call| match call {
                Call::Nickname { nickname, .. } => nickname,
                _ => None,
            })
            .unwrap();
        assert_eq!(nickname.chars().count(), 32);
        assert!(nickname.ends_with(" || Crimson"));
    }
}
