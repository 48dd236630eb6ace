//! Member-to-member reputation points.
//!
//! One row per `(guild, member)`. Awards bump the stored count with a
//! compare-and-set update so two awards landing together both count.

use std::fmt;

use tracing::{debug, info};
use waffle_database::{
    Field, FieldKind, Filter, Query, Record, RecordStore, Scope, Table, TableSchema, Value,
};

use crate::error::{ModerationError, ModerationResult};

pub const REPUTATION_TABLE: &str = "reputation";

const MAX_AWARD_ATTEMPTS: usize = 5;

pub fn reputation_schema() -> TableSchema {
    TableSchema::new(
        REPUTATION_TABLE,
        [
            Field::new("guild_id", FieldKind::BigInteger).not_null(),
            Field::new("member_id", FieldKind::BigInteger).not_null(),
            Field::new("points", FieldKind::BigInteger)
                .not_null()
                .default_value(0_i64),
        ],
    )
}

#[derive(Clone)]
pub struct ReputationBoard {
    table: Table,
}

impl fmt::Debug for ReputationBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReputationBoard")
            .field("table", &self.table.name())
            .finish()
    }
}

impl ReputationBoard {
    pub async fn setup(store: &RecordStore) -> ModerationResult<Self> {
        let table = store.ensure_table(reputation_schema()).await?;
        Ok(Self { table })
    }

    /// Give `member_id` one point. Returns the new total.
    pub async fn award(&self, guild_id: u64, member_id: u64) -> ModerationResult<i64> {
        let owner = owner_filter(guild_id, member_id)?;

        for attempt in 1..=MAX_AWARD_ATTEMPTS {
            let Some(current) = self.current(&owner).await? else {
                self.table
                    .insert(
                        &Record::new()
                            .with("guild_id", Value::from_id(guild_id)?)
                            .with("member_id", Value::from_id(member_id)?)
                            .with("points", 1_i64),
                    )
                    .await?;
                info!(guild_id, member_id, points = 1, "reputation awarded");
                return Ok(1);
            };

            let points = current.points + 1;
            let touched = self
                .table
                .update(
                    &Scope::Matching(
                        Filter::new()
                            .with("id", current.id)
                            .with("points", current.points),
                    ),
                    &Record::new().with("points", points),
                )
                .await?;

            if touched > 0 {
                info!(guild_id, member_id, points, "reputation awarded");
                return Ok(points);
            }
            debug!(guild_id, member_id, attempt, "reputation changed underneath; retrying");
        }

        Err(ModerationError::Contended(format!(
            "reputation for member {member_id} kept changing"
        )))
    }

    /// Current points, `0` for members who never received any.
    pub async fn points(&self, guild_id: u64, member_id: u64) -> ModerationResult<i64> {
        let owner = owner_filter(guild_id, member_id)?;
        Ok(self
            .current(&owner)
            .await?
            .map_or(0, |current| current.points))
    }

    async fn current(&self, owner: &Filter) -> ModerationResult<Option<Standing>> {
        let rows = self
            .table
            .filter(owner, Query::new().order_by("id").limit(1))
            .await?;

        rows.first()
            .map(|row| {
                Ok(Standing {
                    id: row.get_i64("id")?,
                    points: row.get_i64("points")?,
                })
            })
            .transpose()
    }
}

struct Standing {
    id: i64,
    points: i64,
}

fn owner_filter(guild_id: u64, member_id: u64) -> ModerationResult<Filter> {
    Ok(Filter::new()
        .with("guild_id", Value::from_id(guild_id)?)
        .with("member_id", Value::from_id(member_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn board() -> (ReputationBoard, RecordStore) {
        let store = RecordStore::memory();
        (ReputationBoard::setup(&store).await.unwrap(), store)
    }

    #[tokio::test]
    async fn first_award_creates_the_row() {
        let (board, store) = board().await;

        assert_eq!(board.points(1, 20).await.unwrap(), 0);
        assert_eq!(board.award(1, 20).await.unwrap(), 1);
        assert_eq!(board.points(1, 20).await.unwrap(), 1);

        let table = store.ensure_table(reputation_schema()).await.unwrap();
        let rows = table.filter(&Filter::new(), Query::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn later_awards_increment_in_place() {
        let (board, store) = board().await;

        for expected in 1..=3 {
            assert_eq!(board.award(1, 20).await.unwrap(), expected);
        }

        let table = store.ensure_table(reputation_schema()).await.unwrap();
        let rows = table.filter(&Filter::new(), Query::new()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("points").unwrap(), 3);
    }

    #[tokio::test]
    async fn points_are_scoped_per_guild_and_member() {
        let (board, _) = board().await;

        board.award(1, 20).await.unwrap();
        board.award(1, 20).await.unwrap();
        board.award(1, 21).await.unwrap();
        board.award(2, 20).await.unwrap();

        assert_eq!(board.points(1, 20).await.unwrap(), 2);
        assert_eq!(board.points(1, 21).await.unwrap(), 1);
        assert_eq!(board.points(2, 20).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_awards_all_count() {
        let (board, _) = board().await;
        board.award(1, 20).await.unwrap();

        let (a, b) = tokio::join!(board.award(1, 20), board.award(1, 20));
        let mut totals = [a.unwrap(), b.unwrap()];
        totals.sort();

        assert_eq!(totals, [2, 3]);
        assert_eq!(board.points(1, 20).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unstorable_ids_are_rejected() {
        let (board, _) = board().await;
        assert!(matches!(
            board.award(1, u64::MAX).await,
            Err(ModerationError::Store(_))
        ));
    }
}
