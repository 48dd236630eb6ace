pub mod moderation;
pub mod roles;
pub mod utility;

use waffle_core::{Data, Error};

pub struct CommandMeta {
    pub name: &'static str,
    pub desc: &'static str,
    pub category: &'static str,
    pub usage: &'static str,
}

pub const COMMANDS: &[CommandMeta] = &[
    moderation::ban::META,
    moderation::unban::META,
    moderation::kick::META,
    moderation::mute::META,
    moderation::unmute::META,
    moderation::warn::META,
    moderation::config::modlog::META,
    moderation::config::muterole::META,
    moderation::config::staffroles::ADMINROLE_META,
    moderation::config::staffroles::MODROLE_META,
    roles::reactionrole::META,
    utility::rep::META,
];

pub fn commands() -> Vec<poise::Command<Data, Error>> {
    vec![
        moderation::ban::ban(),
        moderation::unban::unban(),
        moderation::kick::kick(),
        moderation::mute::mute(),
        moderation::unmute::unmute(),
        moderation::warn::warn(),
        moderation::config::modlog::modlog(),
        moderation::config::muterole::muterole(),
        moderation::config::staffroles::adminrole(),
        moderation::config::staffroles::modrole(),
        roles::reactionrole::reactionrole(),
        utility::rep::rep(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_has_metadata() {
        let names: Vec<String> = commands().into_iter().map(|command| command.name).collect();
        assert_eq!(names.len(), COMMANDS.len());
        for meta in COMMANDS {
            assert!(names.iter().any(|name| name == meta.name), "{}", meta.name);
            assert!(meta.usage.starts_with('!'));
        }
    }
}
