//! Durable punishment lifecycle.
//!
//! Every sanction is persisted as an infraction row before it is applied on
//! the platform. Time-bound sanctions also get one armed timer that completes
//! the row and then undoes the side effect. Completion is always committed
//! before the reversal is attempted, so a failed unban never leaves the row
//! open to fire again, and only the caller that moves a row from open to
//! completed performs the reversal.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};
use waffle_database::{
    Filter, Query, Record, RecordStore, Scope, Settings, StoreResult, Table, Value, keys,
};
use waffle_utils::delay::{DelayScheduler, ScheduledTask};

use crate::audit::{AuditEntry, AuditLog};
use crate::error::{ModerationError, ModerationResult};
use crate::infraction::{Infraction, NewPunishment, PunishmentKind, infraction_schema};
use crate::platform::{Platform, PlatformResult};

/// What happened to the side effect of an ended punishment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reversal {
    Reversed,
    /// Kicks and warnings have nothing to undo.
    NotApplicable,
    /// Someone else completed the infraction first; nothing was touched.
    AlreadyEnded,
    Failed(String),
}

/// Result of lifting a punishment on request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pardon {
    Ended { id: i64, reversal: Reversal },
    /// No active infraction was on record; the side effect was undone anyway.
    Untracked(Reversal),
}

#[derive(Clone, Copy, Debug)]
struct ExpiryTarget {
    id: i64,
    kind: PunishmentKind,
    guild_id: u64,
    user_id: u64,
}

struct Inner {
    infractions: Table,
    settings: Settings,
    platform: Arc<dyn Platform>,
    audit: AuditLog,
    scheduler: DelayScheduler,
    armed: DashMap<i64, ScheduledTask>,
    tracking: AtomicBool,
}

#[derive(Clone)]
pub struct PunishmentManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for PunishmentManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PunishmentManager")
            .field("armed", &self.inner.armed.len())
            .field("tracking", &self.inner.tracking.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl PunishmentManager {
    pub async fn setup(
        store: &RecordStore,
        settings: Settings,
        platform: Arc<dyn Platform>,
        audit: AuditLog,
        scheduler: DelayScheduler,
    ) -> ModerationResult<Self> {
        let infractions = store.ensure_table(infraction_schema()).await?;

        Ok(Self {
            inner: Arc::new(Inner {
                infractions,
                settings,
                platform,
                audit,
                scheduler,
                armed: DashMap::new(),
                tracking: AtomicBool::new(false),
            }),
        })
    }

    /// Arm a timer for every incomplete infraction that has an expiry.
    ///
    /// Runs once per manager; later calls fail with
    /// [`ModerationError::TrackingAlreadyStarted`] and arm nothing.
    pub async fn start_tracking(&self) -> ModerationResult<usize> {
        if self.inner.tracking.swap(true, Ordering::SeqCst) {
            return Err(ModerationError::TrackingAlreadyStarted);
        }

        let rows = match self
            .inner
            .infractions
            .filter(
                &Filter::new()
                    .with("expiry_date__ne", Value::Null)
                    .with("completed", false),
                Query::new().order_by("id"),
            )
            .await
        {
            Ok(rows) => rows,
            Err(source) => {
                self.inner.tracking.store(false, Ordering::SeqCst);
                return Err(source.into());
            }
        };

        let mut armed = 0;
        for row in &rows {
            let infraction = match Infraction::from_record(row) {
                Ok(infraction) => infraction,
                Err(source) => {
                    warn!(?source, "skipping malformed infraction row");
                    continue;
                }
            };
            if let Some(expiry) = infraction.expiry_date {
                self.arm(
                    ExpiryTarget {
                        id: infraction.id,
                        kind: infraction.kind,
                        guild_id: infraction.guild_id,
                        user_id: infraction.member_id,
                    },
                    expiry,
                );
                armed += 1;
            }
        }

        info!(armed, "punishment tracking started");
        Ok(armed)
    }

    /// Persist a punishment and arm its expiry. Returns the infraction id.
    pub async fn add_punishment(&self, new: NewPunishment) -> ModerationResult<i64> {
        let id = self.record(&new).await?;
        self.announce(id, new).await;
        Ok(id)
    }

    /// Record the sanction, then apply it on the platform.
    ///
    /// Nothing reaches the platform unless the row was written. When the
    /// platform refuses, the row is completed and the error returned.
    pub async fn punish(&self, new: NewPunishment) -> ModerationResult<i64> {
        check_expiry(Utc::now(), new.expiry)?;

        let mute_role = match new.kind {
            PunishmentKind::Mute => Some(
                self.mute_role(new.guild_id)
                    .await?
                    .ok_or(ModerationError::MuteRoleMissing)?,
            ),
            _ => None,
        };

        let id = self.record(&new).await?;

        let notice = format!(
            "{} You have been {}. Reason: {}",
            new.kind.emoji(),
            new.kind.past_tense(),
            new.reason.as_deref().unwrap_or("none given")
        );
        if let Err(source) = self.inner.platform.direct_message(new.user_id, notice).await {
            debug!(?source, user_id = new.user_id, "could not notify punished user");
        }

        if let Err(source) = self.apply(&new, mute_role).await {
            warn!(
                ?source,
                id,
                kind = %new.kind,
                user_id = new.user_id,
                "sanction refused; closing its record"
            );
            if let Err(close) = self.complete_punishment(id).await {
                warn!(?close, id, "could not close the refused infraction");
            }
            return Err(source.into());
        }

        self.announce(id, new).await;
        Ok(id)
    }

    /// Most recent active infraction of `kind`: not completed and either
    /// permanent or not yet expired.
    pub async fn get_punishment(
        &self,
        kind: PunishmentKind,
        guild_id: u64,
        user_id: u64,
    ) -> ModerationResult<Option<Infraction>> {
        let rows = self
            .inner
            .infractions
            .filter(
                &Filter::new()
                    .with("type", kind.as_str())
                    .with("guild_id", Value::from_id(guild_id)?)
                    .with("member_id", Value::from_id(user_id)?)
                    .with("completed", false)
                    .with("expiry_date", Value::Null)
                    .with("expiry_date__gt", Utc::now()),
                Query::new().order_by_desc("id").limit(1),
            )
            .await?;

        rows.first().map(Infraction::from_record).transpose()
    }

    /// Mark an infraction completed and disarm its timer. Safe to repeat.
    ///
    /// Returns whether the infraction exists.
    pub async fn complete_punishment(&self, id: i64) -> ModerationResult<bool> {
        let touched = self
            .inner
            .infractions
            .update(
                &Scope::Matching(Filter::new().with("id", id)),
                &Record::new().with("completed", true),
            )
            .await?;
        self.disarm(id);

        Ok(touched > 0)
    }

    /// Complete the infraction, then undo its side effect.
    ///
    /// Only the call that flips the row from open to completed reverses
    /// anything; later calls get [`Reversal::AlreadyEnded`]. Reversal failures
    /// are logged and reported in the returned [`Reversal`]; they never roll
    /// back completion.
    pub async fn end_punishment(
        &self,
        kind: PunishmentKind,
        id: i64,
        guild_id: u64,
        user_id: u64,
    ) -> ModerationResult<Reversal> {
        let touched = self
            .inner
            .infractions
            .update(
                &Scope::Matching(Filter::new().with("id", id).with("completed", false)),
                &Record::new().with("completed", true),
            )
            .await?;
        self.disarm(id);

        if touched == 0 {
            debug!(id, %kind, "infraction was already completed");
            return Ok(Reversal::AlreadyEnded);
        }

        let reversal = self.reverse(kind, guild_id, user_id).await;
        let entry = match &reversal {
            Reversal::Failed(cause) => {
                warn!(id, %kind, guild_id, user_id, %cause, "punishment completed but not reversed");
                AuditEntry::ReversalFailed {
                    id,
                    kind,
                    user_id,
                    cause: cause.clone(),
                }
            }
            Reversal::Reversed | Reversal::NotApplicable | Reversal::AlreadyEnded => {
                info!(id, %kind, guild_id, user_id, "punishment ended");
                AuditEntry::Ended { id, kind, user_id }
            }
        };
        self.inner.audit.record(guild_id, &entry).await;

        Ok(reversal)
    }

    /// Lift the active punishment of `kind`, if any.
    pub async fn pardon(
        &self,
        kind: PunishmentKind,
        guild_id: u64,
        user_id: u64,
    ) -> ModerationResult<Pardon> {
        match self.get_punishment(kind, guild_id, user_id).await? {
            Some(infraction) => {
                let reversal = self
                    .end_punishment(kind, infraction.id, guild_id, user_id)
                    .await?;
                Ok(Pardon::Ended {
                    id: infraction.id,
                    reversal,
                })
            }
            None => Ok(Pardon::Untracked(self.reverse(kind, guild_id, user_id).await)),
        }
    }

    /// Re-apply the mute role to a member who left and came back while muted.
    pub async fn on_member_join(&self, guild_id: u64, user_id: u64) -> ModerationResult<bool> {
        if self
            .get_punishment(PunishmentKind::Mute, guild_id, user_id)
            .await?
            .is_none()
        {
            return Ok(false);
        }

        let Some(role_id) = self.mute_role(guild_id).await? else {
            warn!(guild_id, user_id, "muted member rejoined but no mute role is configured");
            return Ok(false);
        };

        self.inner
            .platform
            .add_roles(guild_id, user_id, vec![role_id])
            .await?;
        self.inner
            .audit
            .record(guild_id, &AuditEntry::MuteReapplied { user_id })
            .await;

        Ok(true)
    }

    pub fn armed_count(&self) -> usize {
        self.inner.armed.len()
    }

    async fn record(&self, new: &NewPunishment) -> ModerationResult<i64> {
        let issued = Utc::now();
        check_expiry(issued, new.expiry)?;

        let record = Record::new()
            .with("guild_id", Value::from_id(new.guild_id)?)
            .with("member_id", Value::from_id(new.user_id)?)
            .with("author_id", Value::from_id(new.author_id)?)
            .with("type", new.kind.as_str())
            .with("reason", new.reason.clone())
            .with("issue_date", issued)
            .with("expiry_date", new.expiry);
        let id = self.inner.infractions.insert_returning_id(&record).await?;

        if let Some(expiry) = new.expiry {
            self.arm(
                ExpiryTarget {
                    id,
                    kind: new.kind,
                    guild_id: new.guild_id,
                    user_id: new.user_id,
                },
                expiry,
            );
        }

        info!(
            id,
            kind = %new.kind,
            guild_id = new.guild_id,
            user_id = new.user_id,
            "punishment recorded"
        );
        Ok(id)
    }

    async fn announce(&self, id: i64, new: NewPunishment) {
        self.inner
            .audit
            .record(
                new.guild_id,
                &AuditEntry::Issued {
                    id,
                    kind: new.kind,
                    user_id: new.user_id,
                    author_id: new.author_id,
                    reason: new.reason,
                    expiry: new.expiry,
                },
            )
            .await;
    }

    async fn apply(&self, new: &NewPunishment, mute_role: Option<u64>) -> PlatformResult<()> {
        let platform = &self.inner.platform;
        match new.kind {
            PunishmentKind::Ban => {
                platform
                    .ban(new.guild_id, new.user_id, new.reason.clone())
                    .await
            }
            PunishmentKind::Kick => {
                platform
                    .kick(new.guild_id, new.user_id, new.reason.clone())
                    .await
            }
            PunishmentKind::Mute => {
                platform
                    .add_roles(new.guild_id, new.user_id, mute_role.into_iter().collect())
                    .await
            }
            PunishmentKind::Warn => Ok(()),
        }
    }

    fn disarm(&self, id: i64) {
        if let Some((_, task)) = self.inner.armed.remove(&id) {
            task.cancel();
            debug!(id, "expiry timer disarmed");
        }
    }

    fn arm(&self, target: ExpiryTarget, expiry: DateTime<Utc>) {
        let Entry::Vacant(slot) = self.inner.armed.entry(target.id) else {
            debug!(id = target.id, "expiry already armed");
            return;
        };

        let inner = Arc::downgrade(&self.inner);
        let task = self
            .inner
            .scheduler
            .schedule(expiry, move || expire(inner, target));
        debug!(id = target.id, task_id = task.id(), %expiry, "expiry armed");
        slot.insert(task);
    }

    async fn reverse(&self, kind: PunishmentKind, guild_id: u64, user_id: u64) -> Reversal {
        let platform = &self.inner.platform;
        let result = match kind {
            PunishmentKind::Ban => platform.unban(guild_id, user_id).await,
            PunishmentKind::Mute => match self.mute_role(guild_id).await {
                Ok(Some(role_id)) => {
                    platform
                        .remove_roles(guild_id, user_id, vec![role_id])
                        .await
                }
                Ok(None) => return Reversal::Failed("no mute role is configured".to_owned()),
                Err(source) => return Reversal::Failed(source.to_string()),
            },
            PunishmentKind::Kick | PunishmentKind::Warn => return Reversal::NotApplicable,
        };

        match result {
            Ok(()) => Reversal::Reversed,
            Err(source) => Reversal::Failed(source.to_string()),
        }
    }

    async fn mute_role(&self, guild_id: u64) -> StoreResult<Option<u64>> {
        self.inner.settings.get_id(guild_id, keys::MUTE_ROLE).await
    }
}

async fn expire(inner: Weak<Inner>, target: ExpiryTarget) -> anyhow::Result<()> {
    let Some(inner) = inner.upgrade() else {
        return Ok(());
    };
    inner.armed.remove(&target.id);

    let manager = PunishmentManager { inner };
    manager
        .end_punishment(target.kind, target.id, target.guild_id, target.user_id)
        .await?;

    Ok(())
}

fn check_expiry(issued: DateTime<Utc>, expiry: Option<DateTime<Utc>>) -> ModerationResult<()> {
    match expiry {
        Some(expiry) if expiry <= issued => {
            Err(ModerationError::ExpiryNotAfterIssue { issued, expiry })
        }
        _ => Ok(()),
    }
}
