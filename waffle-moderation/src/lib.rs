pub mod audit;
pub mod checks;
pub mod error;
pub mod infraction;
pub mod platform;
pub mod punishment;
pub mod reaction_roles;
pub mod reputation;

#[cfg(test)]
mod testing;

pub use audit::{AuditEntry, AuditLog};
pub use checks::{RankError, can_modify_member, can_modify_role, ensure_can_modify_member};
pub use error::{ModerationError, ModerationResult};
pub use infraction::{Infraction, NewPunishment, PunishmentKind};
pub use platform::{MemberSnapshot, Platform, PlatformError, PlatformResult};
pub use punishment::{Pardon, PunishmentManager, Reversal};
pub use reaction_roles::{
    MessageRef, ReactionEvent, ReactionMapping, ReactionRoleEngine, ToggleOutcome,
};
pub use reputation::ReputationBoard;
