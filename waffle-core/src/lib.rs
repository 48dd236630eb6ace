use std::fmt;
use std::sync::Arc;

use waffle_database::Settings;
use waffle_moderation::{
    AuditLog, Platform, PunishmentManager, ReactionRoleEngine, ReputationBoard,
};

pub type Error = anyhow::Error;

/// Shared state handed to every command and event handler.
#[derive(Clone)]
pub struct Data {
    pub settings: Settings,
    pub punishments: PunishmentManager,
    pub reaction_roles: ReactionRoleEngine,
    pub reputation: ReputationBoard,
    pub audit: AuditLog,
    pub platform: Arc<dyn Platform>,
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("punishments", &self.punishments)
            .field("reaction_roles", &self.reaction_roles)
            .field("reputation", &self.reputation)
            .finish_non_exhaustive()
    }
}

pub type Context<'a> = poise::Context<'a, Data, Error>;
