use chrono::{DateTime, Utc};
use thiserror::Error;
use waffle_database::StoreError;

use crate::checks::RankError;
use crate::platform::PlatformError;

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Rank(#[from] RankError),

    #[error("punishment tracking has already been started")]
    TrackingAlreadyStarted,

    #[error("expiry {expiry} is not after the issue time {issued}")]
    ExpiryNotAfterIssue {
        issued: DateTime<Utc>,
        expiry: DateTime<Utc>,
    },

    #[error("unknown punishment type `{0}`")]
    UnknownKind(String),

    #[error("no mute role is configured for this server")]
    MuteRoleMissing,

    #[error("gave up after repeated conflicting writes: {0}")]
    Contended(String),
}

pub type ModerationResult<T> = Result<T, ModerationError>;
