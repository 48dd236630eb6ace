use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use waffle_database::{Field, FieldKind, Record, TableSchema};

use crate::error::{ModerationError, ModerationResult};

pub const INFRACTION_TABLE: &str = "infraction";

pub fn infraction_schema() -> TableSchema {
    TableSchema::new(
        INFRACTION_TABLE,
        [
            Field::new("guild_id", FieldKind::BigInteger).not_null(),
            Field::new("member_id", FieldKind::BigInteger).not_null(),
            Field::new("author_id", FieldKind::BigInteger).not_null(),
            Field::new("type", FieldKind::Text).not_null(),
            Field::new("reason", FieldKind::Text),
            Field::new("issue_date", FieldKind::Timestamp).not_null(),
            Field::new("expiry_date", FieldKind::Timestamp),
            Field::new("completed", FieldKind::Boolean)
                .default_value(false)
                .not_null(),
        ],
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PunishmentKind {
    Ban,
    Kick,
    Mute,
    Warn,
}

impl PunishmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PunishmentKind::Ban => "ban",
            PunishmentKind::Kick => "kick",
            PunishmentKind::Mute => "mute",
            PunishmentKind::Warn => "warn",
        }
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            PunishmentKind::Ban => "banned",
            PunishmentKind::Kick => "kicked",
            PunishmentKind::Mute => "muted",
            PunishmentKind::Warn => "warned",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            PunishmentKind::Ban => "🔨",
            PunishmentKind::Kick => "👢",
            PunishmentKind::Mute => "🔇",
            PunishmentKind::Warn => "⚠️",
        }
    }
}

impl fmt::Display for PunishmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PunishmentKind {
    type Err = ModerationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "ban" => Ok(PunishmentKind::Ban),
            "kick" => Ok(PunishmentKind::Kick),
            "mute" => Ok(PunishmentKind::Mute),
            "warn" => Ok(PunishmentKind::Warn),
            other => Err(ModerationError::UnknownKind(other.to_owned())),
        }
    }
}

/// A persisted punishment.
#[derive(Clone, Debug, PartialEq)]
pub struct Infraction {
    pub id: i64,
    pub guild_id: u64,
    pub member_id: u64,
    pub author_id: u64,
    pub kind: PunishmentKind,
    pub reason: Option<String>,
    pub issue_date: DateTime<Utc>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub completed: bool,
}

impl Infraction {
    pub fn from_record(record: &Record) -> ModerationResult<Self> {
        Ok(Self {
            id: record.get_i64("id")?,
            guild_id: record.get_id("guild_id")?,
            member_id: record.get_id("member_id")?,
            author_id: record.get_id("author_id")?,
            kind: record.get_text("type")?.parse()?,
            reason: record.get_opt_text("reason")?.map(str::to_owned),
            issue_date: record.get_timestamp("issue_date")?,
            expiry_date: record.get_opt_timestamp("expiry_date")?,
            completed: record.get_bool("completed")?,
        })
    }
}

/// Input to [`crate::PunishmentManager::add_punishment`].
#[derive(Clone, Debug, PartialEq)]
pub struct NewPunishment {
    pub kind: PunishmentKind,
    pub guild_id: u64,
    pub author_id: u64,
    pub user_id: u64,
    pub reason: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

impl NewPunishment {
    pub fn new(kind: PunishmentKind, guild_id: u64, author_id: u64, user_id: u64) -> Self {
        Self {
            kind,
            guild_id,
            author_id,
            user_id,
            reason: None,
            expiry: None,
        }
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }

    pub fn expiry(mut self, expiry: Option<DateTime<Utc>>) -> Self {
        self.expiry = expiry;
        self
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn kinds_round_trip_through_text() {
        for kind in [
            PunishmentKind::Ban,
            PunishmentKind::Kick,
            PunishmentKind::Mute,
            PunishmentKind::Warn,
        ] {
            assert_eq!(kind.as_str().parse::<PunishmentKind>().unwrap(), kind);
        }
        assert!(matches!(
            "jail".parse::<PunishmentKind>(),
            Err(ModerationError::UnknownKind(_))
        ));
    }

    #[test]
    fn records_decode_into_infractions() {
        let issued = Utc::now();
        let record = Record::new()
            .with("id", 3_i64)
            .with("guild_id", 1_i64)
            .with("member_id", 2_i64)
            .with("author_id", 4_i64)
            .with("type", "mute")
            .with("reason", Option::<String>::None)
            .with("issue_date", issued)
            .with("expiry_date", issued + Duration::minutes(10))
            .with("completed", false);

        let infraction = Infraction::from_record(&record).unwrap();
        assert_eq!(infraction.kind, PunishmentKind::Mute);
        assert_eq!(infraction.reason, None);
        assert_eq!(infraction.expiry_date, Some(issued + Duration::minutes(10)));
        assert!(!infraction.completed);
    }

    #[test]
    fn malformed_records_are_rejected() {
        let record = Record::new().with("id", 3_i64).with("type", "mute");
        assert!(Infraction::from_record(&record).is_err());
    }
}
