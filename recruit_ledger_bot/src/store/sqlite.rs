use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, Sqlite,
};

use super::{BlacklistFilter, RecordStore, RecruitFilter, StoreError};
use crate::{
    ids::generate_id,
    types::{
        BlacklistEntry, BlacklistPatch, BlacklistSnapshot, FirstActivities, NewRecruit,
        RankingAdjustment, RankingEntry, RecruitPatch, RecruitRequest, RecruitStatus,
        Transition, MANUAL_ADJUSTMENT_CANDIDATE,
    },
};

type Pool = sqlx::Pool<Sqlite>;
type Query<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Candidate name on synthetic records made by manual ranking adjustments.
const MANUAL_ADJUSTMENT_NAME: &str = "Manual adjustment";
/// Reject reason on records reversed by manual ranking adjustments.
const MANUAL_ADJUSTMENT_REVERSAL: &str = "Manual ranking adjustment";

macro_rules! blacklist_columns {
    () => {
        "id, passport_id, display_name, reason, author_id,
        origin_guild_id, origin_channel_id, origin_message_id, created_at,
        removed, removed_by, removed_at, remove_reason"
    };
}

macro_rules! recruit_columns {
    () => {
        "id, recruiter_id, candidate_id, candidate_name, phone, passport,
        status, created_at, approved_by, approved_at,
        rejected_by, rejected_at, reject_reason,
        blacklist_flag, blacklist_reason, approval_channel_id, approval_message_id,
        first_race, first_farm, first_dismantle,
        kit_delivered, kit_delivered_by, kit_delivered_at"
    };
}

fn blacklist_from_row(row: &SqliteRow) -> Result<BlacklistEntry, sqlx::Error> {
    Ok(BlacklistEntry {
        id: row.try_get("id")?,
        passport_id: row.try_get("passport_id")?,
        display_name: row.try_get("display_name")?,
        reason: row.try_get("reason")?,
        author_id: row.try_get("author_id")?,
        origin_guild_id: row.try_get("origin_guild_id")?,
        origin_channel_id: row.try_get("origin_channel_id")?,
        origin_message_id: row.try_get("origin_message_id")?,
        created_at: row.try_get("created_at")?,
        removed: row.try_get("removed")?,
        removed_by: row.try_get("removed_by")?,
        removed_at: row.try_get("removed_at")?,
        remove_reason: row.try_get("remove_reason")?,
    })
}

fn recruit_from_row(row: &SqliteRow) -> Result<RecruitRequest, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = RecruitStatus::from_str(&status).map_err(|e| sqlx::Error::ColumnDecode {
        index: String::from("status"),
        source: Box::new(e),
    })?;

    Ok(RecruitRequest {
        id: row.try_get("id")?,
        recruiter_id: row.try_get("recruiter_id")?,
        candidate_id: row.try_get("candidate_id")?,
        candidate_name: row.try_get("candidate_name")?,
        phone: row.try_get("phone")?,
        passport: row.try_get("passport")?,
        status,
        created_at: row.try_get("created_at")?,
        approved_by: row.try_get("approved_by")?,
        approved_at: row.try_get("approved_at")?,
        rejected_by: row.try_get("rejected_by")?,
        rejected_at: row.try_get("rejected_at")?,
        reject_reason: row.try_get("reject_reason")?,
        blacklist_flag: row.try_get("blacklist_flag")?,
        blacklist_reason: row.try_get("blacklist_reason")?,
        approval_channel_id: row.try_get("approval_channel_id")?,
        approval_message_id: row.try_get("approval_message_id")?,
        first_race: row.try_get("first_race")?,
        first_farm: row.try_get("first_farm")?,
        first_dismantle: row.try_get("first_dismantle")?,
        kit_delivered: row.try_get("kit_delivered")?,
        kit_delivered_by: row.try_get("kit_delivered_by")?,
        kit_delivered_at: row.try_get("kit_delivered_at")?,
    })
}

fn insert_recruit_query(request: &RecruitRequest) -> Query<'_> {
    sqlx::query(concat!(
        "INSERT INTO recruits(",
        recruit_columns!(),
        ") VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);"
    ))
    .bind(&request.id)
    .bind(&request.recruiter_id)
    .bind(&request.candidate_id)
    .bind(&request.candidate_name)
    .bind(&request.phone)
    .bind(&request.passport)
    .bind(request.status.as_str())
    .bind(request.created_at)
    .bind(&request.approved_by)
    .bind(request.approved_at)
    .bind(&request.rejected_by)
    .bind(request.rejected_at)
    .bind(&request.reject_reason)
    .bind(request.blacklist_flag)
    .bind(&request.blacklist_reason)
    .bind(&request.approval_channel_id)
    .bind(&request.approval_message_id)
    .bind(&request.first_race)
    .bind(&request.first_farm)
    .bind(&request.first_dismantle)
    .bind(request.kit_delivered)
    .bind(&request.kit_delivered_by)
    .bind(request.kit_delivered_at)
}

/// Turns a unique constraint violation on insert into [`StoreError::DuplicateId`].
fn refuse_duplicate(error: sqlx::Error, id: &str) -> StoreError {
    match error {
        sqlx::Error::Database(e) if e.is_unique_violation() => {
            StoreError::DuplicateId(id.to_string())
        }
        other => StoreError::Database(other),
    }
}

/// Record store backed by a SQLite database.
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    /// Connects to the database at `url`, creating it and its tables if needed.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(32)
            .connect_with(
                SqliteConnectOptions::from_str(url)?
                    .create_if_missing(true)
                    .pragma("cache_size", "-32768")
                    .busy_timeout(std::time::Duration::from_secs(600)),
            )
            .await?;

        // BLACKLISTS:
        // id (opaque string key)
        // passport_id, display_name, reason, author_id (strings)
        // origin_guild_id, origin_channel_id, origin_message_id (where it was posted)
        // created_at (date+time in UTC)
        // removed (0 for no, 1 for yes)
        // removed_by, removed_at, remove_reason (set together on removal)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS blacklists (
                id TEXT PRIMARY KEY NOT NULL,
                passport_id TEXT NOT NULL,
                display_name TEXT NOT NULL,
                reason TEXT NOT NULL,
                author_id TEXT NOT NULL,
                origin_guild_id TEXT NOT NULL,
                origin_channel_id TEXT NOT NULL,
                origin_message_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                removed INTEGER NOT NULL DEFAULT 0,
                removed_by TEXT NULL,
                removed_at TEXT NULL,
                remove_reason TEXT NULL
            ) STRICT;",
        ))
        .await?;

        // RECRUITS:
        // id (opaque string key)
        // recruiter_id, candidate_id, candidate_name, phone, passport (strings)
        // status ('pending', 'approved' or 'rejected')
        // created_at, approved_at, rejected_at, kit_delivered_at (date+time in UTC)
        // blacklist_flag, kit_delivered (0 for no, 1 for yes)
        pool.execute(sqlx::query(
            "CREATE TABLE IF NOT EXISTS recruits (
                id TEXT PRIMARY KEY NOT NULL,
                recruiter_id TEXT NOT NULL,
                candidate_id TEXT NOT NULL,
                candidate_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                passport TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                approved_by TEXT NULL,
                approved_at TEXT NULL,
                rejected_by TEXT NULL,
                rejected_at TEXT NULL,
                reject_reason TEXT NULL,
                blacklist_flag INTEGER NOT NULL DEFAULT 0,
                blacklist_reason TEXT NULL,
                approval_channel_id TEXT NULL,
                approval_message_id TEXT NULL,
                first_race TEXT NULL,
                first_farm TEXT NULL,
                first_dismantle TEXT NULL,
                kit_delivered INTEGER NOT NULL DEFAULT 0,
                kit_delivered_by TEXT NULL,
                kit_delivered_at TEXT NULL
            ) STRICT;",
        ))
        .await?;

        // Transparent database migration.
        // Each fails harmlessly if the column already exists.
        for column in [
            "first_race TEXT NULL",
            "first_farm TEXT NULL",
            "first_dismantle TEXT NULL",
            "kit_delivered INTEGER NOT NULL DEFAULT 0",
            "kit_delivered_by TEXT NULL",
            "kit_delivered_at TEXT NULL",
        ] {
            let _ = pool
                .execute(sqlx::query(&format!(
                    "ALTER TABLE recruits ADD COLUMN {column};"
                )))
                .await;
        }

        let _ = sqlx::query("CREATE INDEX recruits_recruiter_status ON recruits(recruiter_id, status);")
            .execute(&pool)
            .await;
        let _ = sqlx::query("CREATE INDEX blacklists_passport ON blacklists(passport_id);")
            .execute(&pool)
            .await;

        Ok(SqliteStore { pool })
    }

    /// Figures out why a conditional update touched nothing.
    async fn blacklist_miss(&self, id: &str) -> Result<Transition<BlacklistEntry>, StoreError> {
        Ok(match self.get_blacklist(id).await? {
            Some(current) => Transition::InvalidTransition(current),
            None => Transition::NotFound,
        })
    }

    /// Figures out why a conditional update touched nothing.
    async fn recruit_miss(&self, id: &str) -> Result<Transition<RecruitRequest>, StoreError> {
        Ok(match self.get_recruit(id).await? {
            Some(current) => Transition::InvalidTransition(current),
            None => Transition::NotFound,
        })
    }

    /// Inserts `count` synthetic approved records for the recruiter, all or none.
    async fn add_points(&self, adjustment: &RankingAdjustment, count: u64) -> Result<u64, StoreError> {
        let mut transaction = self.pool.begin().await?;

        for _ in 0..count {
            let mut record = RecruitRequest::new(
                generate_id(),
                NewRecruit {
                    id: None,
                    recruiter_id: adjustment.recruiter_id.clone(),
                    candidate_id: String::from(MANUAL_ADJUSTMENT_CANDIDATE),
                    candidate_name: String::from(MANUAL_ADJUSTMENT_NAME),
                    phone: String::new(),
                    passport: String::new(),
                    approval_channel_id: None,
                    approval_message_id: None,
                },
                BlacklistSnapshot::default(),
                adjustment.at,
            );
            record.apply(&RecruitPatch::Approve {
                by: adjustment.adjusted_by.clone(),
                at: adjustment.at,
                first: FirstActivities::default(),
            });

            insert_recruit_query(&record)
                .execute(&mut *transaction)
                .await
                .map_err(|e| refuse_duplicate(e, &record.id))?;
        }

        transaction.commit().await?;
        Ok(count)
    }

    /// Rejects up to `count` approved records of the recruiter, oldest synthetic
    /// ones first, then oldest genuine ones.
    async fn remove_points(
        &self,
        adjustment: &RankingAdjustment,
        count: u64,
    ) -> Result<u64, StoreError> {
        let limit = i64::try_from(count).unwrap_or(i64::MAX);

        let result = sqlx::query(
            "UPDATE recruits
            SET status='rejected', rejected_by=?, rejected_at=?, reject_reason=?
            WHERE id IN (
                SELECT id FROM recruits
                WHERE recruiter_id=? AND status='approved'
                ORDER BY (candidate_id=?) DESC, created_at ASC, id ASC
                LIMIT ?
            );",
        )
        .bind(&adjustment.adjusted_by)
        .bind(adjustment.at)
        .bind(MANUAL_ADJUSTMENT_REVERSAL)
        .bind(&adjustment.recruiter_id)
        .bind(MANUAL_ADJUSTMENT_CANDIDATE)
        .bind(limit)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "SQLite"
    }

    async fn insert_blacklist(&self, entry: &BlacklistEntry) -> Result<(), StoreError> {
        sqlx::query(concat!(
            "INSERT INTO blacklists(",
            blacklist_columns!(),
            ") VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);"
        ))
        .bind(&entry.id)
        .bind(&entry.passport_id)
        .bind(&entry.display_name)
        .bind(&entry.reason)
        .bind(&entry.author_id)
        .bind(&entry.origin_guild_id)
        .bind(&entry.origin_channel_id)
        .bind(&entry.origin_message_id)
        .bind(entry.created_at)
        .bind(entry.removed)
        .bind(&entry.removed_by)
        .bind(entry.removed_at)
        .bind(&entry.remove_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| refuse_duplicate(e, &entry.id))?;
        Ok(())
    }

    async fn get_blacklist(&self, id: &str) -> Result<Option<BlacklistEntry>, StoreError> {
        Ok(sqlx::query(concat!(
            "SELECT ",
            blacklist_columns!(),
            " FROM blacklists WHERE id=?;"
        ))
        .bind(id)
        .try_map(|row: SqliteRow| blacklist_from_row(&row))
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_blacklist(
        &self,
        filter: &BlacklistFilter,
    ) -> Result<Vec<BlacklistEntry>, StoreError> {
        Ok(sqlx::query(concat!(
            "SELECT ",
            blacklist_columns!(),
            " FROM blacklists
            WHERE (?1 OR removed=0) AND (?2 IS NULL OR passport_id=?2)
            ORDER BY created_at DESC, id DESC;"
        ))
        .bind(filter.include_removed)
        .bind(&filter.passport_id)
        .try_map(|row: SqliteRow| blacklist_from_row(&row))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_blacklist(
        &self,
        id: &str,
        patch: &BlacklistPatch,
    ) -> Result<Transition<BlacklistEntry>, StoreError> {
        let query = match patch {
            BlacklistPatch::Remove { by, at, reason } => sqlx::query(concat!(
                "UPDATE blacklists
                SET removed=1, removed_by=?, removed_at=?, remove_reason=?
                WHERE id=? AND removed=0
                RETURNING ",
                blacklist_columns!(),
                ";"
            ))
            .bind(by)
            .bind(*at)
            .bind(reason)
            .bind(id),
        };

        let updated = query
            .try_map(|row: SqliteRow| blacklist_from_row(&row))
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(entry) => Ok(Transition::Applied(entry)),
            None => self.blacklist_miss(id).await,
        }
    }

    async fn insert_recruit(&self, request: &RecruitRequest) -> Result<(), StoreError> {
        insert_recruit_query(request)
            .execute(&self.pool)
            .await
            .map_err(|e| refuse_duplicate(e, &request.id))?;
        Ok(())
    }

    async fn get_recruit(&self, id: &str) -> Result<Option<RecruitRequest>, StoreError> {
        Ok(sqlx::query(concat!(
            "SELECT ",
            recruit_columns!(),
            " FROM recruits WHERE id=?;"
        ))
        .bind(id)
        .try_map(|row: SqliteRow| recruit_from_row(&row))
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_recruits(
        &self,
        filter: &RecruitFilter,
    ) -> Result<Vec<RecruitRequest>, StoreError> {
        Ok(sqlx::query(concat!(
            "SELECT ",
            recruit_columns!(),
            " FROM recruits
            WHERE (?1 IS NULL OR recruiter_id=?1) AND (?2 IS NULL OR status=?2)
            ORDER BY created_at ASC, id ASC;"
        ))
        .bind(&filter.recruiter_id)
        .bind(filter.status.map(RecruitStatus::as_str))
        .try_map(|row: SqliteRow| recruit_from_row(&row))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_recruit(
        &self,
        id: &str,
        patch: &RecruitPatch,
    ) -> Result<Transition<RecruitRequest>, StoreError> {
        let query = match patch {
            RecruitPatch::Approve { by, at, first } => sqlx::query(concat!(
                "UPDATE recruits
                SET status='approved', approved_by=?, approved_at=?,
                    first_race=?, first_farm=?, first_dismantle=?
                WHERE id=? AND status='pending'
                RETURNING ",
                recruit_columns!(),
                ";"
            ))
            .bind(by)
            .bind(*at)
            .bind(&first.race)
            .bind(&first.farm)
            .bind(&first.dismantle)
            .bind(id),
            RecruitPatch::Reject { by, at, reason } => sqlx::query(concat!(
                "UPDATE recruits
                SET status='rejected', rejected_by=?, rejected_at=?, reject_reason=?
                WHERE id=? AND status='pending'
                RETURNING ",
                recruit_columns!(),
                ";"
            ))
            .bind(by)
            .bind(*at)
            .bind(reason)
            .bind(id),
            RecruitPatch::DeliverKit { by, at } => sqlx::query(concat!(
                "UPDATE recruits
                SET kit_delivered=1, kit_delivered_by=?, kit_delivered_at=?
                WHERE id=? AND status='approved' AND kit_delivered=0
                RETURNING ",
                recruit_columns!(),
                ";"
            ))
            .bind(by)
            .bind(*at)
            .bind(id),
            RecruitPatch::AttachApprovalPost {
                channel_id,
                message_id,
            } => sqlx::query(concat!(
                "UPDATE recruits
                SET approval_channel_id=?, approval_message_id=?
                WHERE id=?
                RETURNING ",
                recruit_columns!(),
                ";"
            ))
            .bind(channel_id)
            .bind(message_id)
            .bind(id),
        };

        let updated = query
            .try_map(|row: SqliteRow| recruit_from_row(&row))
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(request) => Ok(Transition::Applied(request)),
            None => self.recruit_miss(id).await,
        }
    }

    async fn approved_counts(&self) -> Result<Vec<RankingEntry>, StoreError> {
        Ok(sqlx::query(
            "SELECT recruiter_id, COUNT(*) AS total
            FROM recruits
            WHERE status='approved'
            GROUP BY recruiter_id;",
        )
        .try_map(|row: SqliteRow| {
            Ok(RankingEntry {
                recruiter_id: row.try_get("recruiter_id")?,
                total: u64::try_from(row.try_get::<i64, _>("total")?).unwrap_or(0),
            })
        })
        .fetch_all(&self.pool)
        .await?)
    }

    async fn adjust_ranking(&self, adjustment: &RankingAdjustment) -> Result<u64, StoreError> {
        let count = adjustment.delta.unsigned_abs();
        if adjustment.delta > 0 {
            self.add_points(adjustment, count).await
        } else {
            self.remove_points(adjustment, count).await
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::store::suite;

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("test.sqlite").display());
        let store = SqliteStore::connect(&url).await.unwrap();
        (dir, store)
    }

    fn adjustment(recruiter: &str, delta: i64) -> RankingAdjustment {
        RankingAdjustment {
            recruiter_id: recruiter.to_string(),
            delta,
            adjusted_by: String::from("admin"),
            at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    async fn total_of(store: &SqliteStore, recruiter: &str) -> u64 {
        store
            .approved_counts()
            .await
            .unwrap()
            .into_iter()
            .find(|e| e.recruiter_id == recruiter)
            .map_or(0, |e| e.total)
    }

    #[tokio::test]
    async fn blacklist_round_trip() {
        let (_dir, store) = store().await;
        suite::blacklist_round_trip(&store).await;
    }

    #[tokio::test]
    async fn blacklist_listing() {
        let (_dir, store) = store().await;
        suite::blacklist_listing(&store).await;
    }

    #[tokio::test]
    async fn recruit_round_trip() {
        let (_dir, store) = store().await;
        suite::recruit_round_trip(&store).await;
    }

    #[tokio::test]
    async fn recruit_transitions_are_single_shot() {
        let (_dir, store) = store().await;
        suite::recruit_transitions_are_single_shot(&store).await;
    }

    #[tokio::test]
    async fn racing_approvals_only_one_wins() {
        let (_dir, store) = store().await;
        suite::racing_approvals_only_one_wins(Arc::new(store)).await;
    }

    #[tokio::test]
    async fn duplicate_ids_are_refused() {
        let (_dir, store) = store().await;
        suite::duplicate_ids_are_refused(&store).await;
    }

    #[tokio::test]
    async fn filtering_and_counting() {
        let (_dir, store) = store().await;
        suite::filtering_and_counting(&store).await;
    }

    #[tokio::test]
    async fn reopening_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("test.sqlite").display());

        let store = SqliteStore::connect(&url).await.unwrap();
        store
            .insert_recruit(&suite::recruit("r1", "A", 0))
            .await
            .unwrap();
        store.pool.close().await;

        // Tables, indexes and migrations must all tolerate already existing.
        let store = SqliteStore::connect(&url).await.unwrap();
        assert_eq!(
            store.get_recruit("r1").await.unwrap(),
            Some(suite::recruit("r1", "A", 0))
        );
    }

    #[tokio::test]
    async fn adding_points_inserts_synthetic_approvals() {
        let (_dir, store) = store().await;

        assert_eq!(store.adjust_ranking(&adjustment("R", 3)).await.unwrap(), 3);
        assert_eq!(total_of(&store, "R").await, 3);

        let synthetic = store
            .list_recruits(&RecruitFilter {
                recruiter_id: Some(String::from("R")),
                status: None,
            })
            .await
            .unwrap();
        assert_eq!(synthetic.len(), 3);
        for record in synthetic {
            assert_eq!(record.candidate_id, MANUAL_ADJUSTMENT_CANDIDATE);
            assert_eq!(record.status, RecruitStatus::Approved);
            assert_eq!(record.candidate_name, MANUAL_ADJUSTMENT_NAME);
            assert_eq!(record.phone, "");
            assert_eq!(record.passport, "");
            assert_eq!(record.approved_by.as_deref(), Some("admin"));
        }
    }

    #[tokio::test]
    async fn removing_points_prefers_synthetic_then_oldest() {
        let (_dir, store) = store().await;

        // Two genuine approvals, the older one first.
        for (id, minutes) in [("old", 0), ("new", 10)] {
            store
                .insert_recruit(&suite::recruit(id, "R", minutes))
                .await
                .unwrap();
            store
                .update_recruit(
                    id,
                    &RecruitPatch::Approve {
                        by: String::from("m"),
                        at: Utc::now(),
                        first: FirstActivities::default(),
                    },
                )
                .await
                .unwrap();
        }
        store.adjust_ranking(&adjustment("R", 3)).await.unwrap();
        assert_eq!(total_of(&store, "R").await, 5);

        assert_eq!(store.adjust_ranking(&adjustment("R", -2)).await.unwrap(), 2);
        assert_eq!(total_of(&store, "R").await, 3);
        for id in ["old", "new"] {
            let genuine = store.get_recruit(id).await.unwrap().unwrap();
            assert_eq!(genuine.status, RecruitStatus::Approved);
        }

        // One synthetic left, then the oldest genuine one goes.
        assert_eq!(store.adjust_ranking(&adjustment("R", -2)).await.unwrap(), 2);
        assert_eq!(total_of(&store, "R").await, 1);
        let old = store.get_recruit("old").await.unwrap().unwrap();
        assert_eq!(old.status, RecruitStatus::Rejected);
        assert_eq!(old.reject_reason.as_deref(), Some(MANUAL_ADJUSTMENT_REVERSAL));
        assert_eq!(old.rejected_by.as_deref(), Some("admin"));
        let new = store.get_recruit("new").await.unwrap().unwrap();
        assert_eq!(new.status, RecruitStatus::Approved);

        // Asking for more than exists reverses what there is.
        assert_eq!(store.adjust_ranking(&adjustment("R", -5)).await.unwrap(), 1);
        assert_eq!(total_of(&store, "R").await, 0);
        assert_eq!(store.adjust_ranking(&adjustment("R", -1)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn removing_points_leaves_other_recruiters_alone() {
        let (_dir, store) = store().await;
        store.adjust_ranking(&adjustment("R", 2)).await.unwrap();
        store.adjust_ranking(&adjustment("S", 2)).await.unwrap();

        store.adjust_ranking(&adjustment("R", -2)).await.unwrap();
        assert_eq!(total_of(&store, "R").await, 0);
        assert_eq!(total_of(&store, "S").await, 2);
    }
}
