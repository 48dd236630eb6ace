use std::sync::{Arc, Mutex};

use crate::platform::{MemberSnapshot, MockPlatform, Platform, PlatformError};

pub const OWNER_ID: u64 = 1;
pub const BOT_ID: u64 = 999;

pub fn member(user_id: u64, top_role_position: u16) -> MemberSnapshot {
    MemberSnapshot {
        user_id,
        display_name: format!("user{user_id}"),
        roles: Vec::new(),
        bot: false,
        top_role_position,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Message { channel: u64, content: String },
    DirectMessage { user: u64 },
    Ban { guild: u64, user: u64 },
    Unban { guild: u64, user: u64 },
    Kick { guild: u64, user: u64 },
    AddRoles { guild: u64, user: u64, roles: Vec<u64> },
    RemoveRoles { guild: u64, user: u64, roles: Vec<u64> },
    Nickname { user: u64, nickname: Option<String> },
    AddReaction { message: u64, emoji: String },
    RemoveReaction { message: u64, emoji: String, user: Option<u64> },
}

#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    fn push(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|call| wanted(call)).count()
    }
}

/// Builds a [`MockPlatform`] that answers from fixed guild state and records
/// every side effect.
pub struct FakeGuild {
    members: Vec<MemberSnapshot>,
    bot: MemberSnapshot,
    role_positions: Vec<(u64, u16)>,
    forbid_nicknames: bool,
    ban_fails: bool,
    unban_fails: bool,
}

impl FakeGuild {
    pub fn new() -> Self {
        let mut bot = member(BOT_ID, 50);
        bot.bot = true;
        Self {
            members: Vec::new(),
            bot,
            role_positions: Vec::new(),
            forbid_nicknames: false,
            ban_fails: false,
            unban_fails: false,
        }
    }

    pub fn with_member(mut self, member: MemberSnapshot) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_role(mut self, role_id: u64, position: u16) -> Self {
        self.role_positions.push((role_id, position));
        self
    }

    pub fn forbid_nicknames(mut self) -> Self {
        self.forbid_nicknames = true;
        self
    }

    pub fn ban_fails(mut self) -> Self {
        self.ban_fails = true;
        self
    }

    pub fn unban_fails(mut self) -> Self {
        self.unban_fails = true;
        self
    }

    pub fn build(self) -> (Arc<dyn Platform>, CallLog) {
        let log = CallLog::default();
        let mut mock = MockPlatform::new();

        let members = self.members;
        mock.expect_member()
            .returning(move |_, user| Ok(members.iter().find(|m| m.user_id == user).cloned()));

        let bot = self.bot;
        mock.expect_bot_member().returning(move |_| Ok(bot.clone()));
        mock.expect_guild_owner().returning(|_| Ok(OWNER_ID));

        let positions = self.role_positions;
        mock.expect_role_position().returning(move |_, role| {
            Ok(positions
                .iter()
                .find(|(id, _)| *id == role)
                .map(|(_, position)| *position))
        });

        let calls = log.clone();
        mock.expect_send_message().returning(move |channel, content| {
            calls.push(Call::Message { channel, content });
            Ok(())
        });

        let calls = log.clone();
        mock.expect_direct_message().returning(move |user, _| {
            calls.push(Call::DirectMessage { user });
            Ok(())
        });

        let calls = log.clone();
        let ban_fails = self.ban_fails;
        mock.expect_ban().returning(move |guild, user, _| {
            calls.push(Call::Ban { guild, user });
            if ban_fails {
                Err(PlatformError::Forbidden("Missing Permissions".to_owned()))
            } else {
                Ok(())
            }
        });

        let calls = log.clone();
        let unban_fails = self.unban_fails;
        mock.expect_unban().returning(move |guild, user| {
            calls.push(Call::Unban { guild, user });
            if unban_fails {
                Err(PlatformError::NotFound("Unknown Ban".to_owned()))
            } else {
                Ok(())
            }
        });

        let calls = log.clone();
        mock.expect_kick().returning(move |guild, user, _| {
            calls.push(Call::Kick { guild, user });
            Ok(())
        });

        let calls = log.clone();
        mock.expect_add_roles().returning(move |guild, user, roles| {
            calls.push(Call::AddRoles { guild, user, roles });
            Ok(())
        });

        let calls = log.clone();
        mock.expect_remove_roles().returning(move |guild, user, roles| {
            calls.push(Call::RemoveRoles { guild, user, roles });
            Ok(())
        });

        let calls = log.clone();
        let forbid_nicknames = self.forbid_nicknames;
        mock.expect_set_nickname().returning(move |_, user, nickname| {
            if forbid_nicknames {
                return Err(PlatformError::Forbidden("Missing Permissions".to_owned()));
            }
            calls.push(Call::Nickname { user, nickname });
            Ok(())
        });

        let calls = log.clone();
        mock.expect_add_reaction().returning(move |_, message, emoji| {
            calls.push(Call::AddReaction { message, emoji });
            Ok(())
        });

        let calls = log.clone();
        mock.expect_remove_reaction()
            .returning(move |_, message, emoji, user| {
                calls.push(Call::RemoveReaction {
                    message,
                    emoji,
                    user,
                });
                Ok(())
            });

        (Arc::new(mock), log)
    }
}

pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
