//! SQLite store for governance state.
//!
//! A single-connection pool keeps writes serialized at the database level to
//! match the single-writer event loop above it. The schema is created at
//! open, so a fresh database file (or `:memory:` in tests) is immediately
//! usable. Status transitions are guarded updates (`WHERE status = 0`), which
//! is what makes close and expiry idempotent under timer replay.

use crate::governance::ballot::BallotKind;
use crate::governance::election::{Effect, Election, ElectionStatus, Suffrage};
use crate::governance::membership::MemberInfo;
use crate::governance::UnixTime;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Result of recording a suffrage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOutcome {
    Accepted,
    Changed,
    /// Same polarity as the existing row; nothing written.
    Duplicate,
}

/// Result of the transactional close write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseWrite {
    Closed { effect_id: Option<i64> },
    /// Another close already won; the caller treats this as a replay no-op.
    AlreadyClosed,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS identities (
    name TEXT PRIMARY KEY,
    first_seen INTEGER NOT NULL,
    last_seen INTEGER NOT NULL,
    lines INTEGER NOT NULL,
    flags TEXT NOT NULL DEFAULT ''
);
CREATE TABLE IF NOT EXISTS elections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    opened_at INTEGER NOT NULL,
    close_at INTEGER NOT NULL,
    status INTEGER NOT NULL DEFAULT 0,
    opened_by TEXT NOT NULL,
    target TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_elections_lookup ON elections (kind, target, status);
CREATE TABLE IF NOT EXISTS suffrages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    election_id INTEGER NOT NULL REFERENCES elections (id),
    voter TEXT NOT NULL,
    yea INTEGER NOT NULL,
    UNIQUE (election_id, voter)
);
CREATE TABLE IF NOT EXISTS effects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    election_id INTEGER NOT NULL REFERENCES elections (id),
    kind TEXT NOT NULL,
    target TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);
"#;

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) a database file.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        Self::with_options(options).await
    }

    /// In-memory database, for tests.
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::with_options(options).await
    }

    async fn with_options(options: SqliteConnectOptions) -> Result<Self, StoreError> {
        // One connection: the event loop is the only writer, and a lone
        // connection also keeps an in-memory database alive for tests.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    // ---- identities ----

    pub async fn upsert_identity(&self, name: &str, info: &MemberInfo) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO identities (name, first_seen, last_seen, lines, flags) \
             VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (name) DO UPDATE SET last_seen = ?3, lines = ?4, flags = ?5",
        )
        .bind(name)
        .bind(info.first_seen)
        .bind(info.last_seen)
        .bind(info.lines as i64)
        .bind(&info.flags)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_identities(&self) -> Result<Vec<(String, MemberInfo)>, StoreError> {
        let rows = sqlx::query("SELECT name, first_seen, last_seen, lines, flags FROM identities")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get::<String, _>("name")?,
                    MemberInfo {
                        first_seen: row.try_get("first_seen")?,
                        last_seen: row.try_get("last_seen")?,
                        lines: row.try_get::<i64, _>("lines")? as u64,
                        flags: row.try_get("flags")?,
                    },
                ))
            })
            .collect()
    }

    // ---- elections ----

    pub async fn insert_election(
        &self,
        kind: BallotKind,
        opened_at: UnixTime,
        close_at: UnixTime,
        opened_by: &str,
        target: &str,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO elections (kind, opened_at, close_at, status, opened_by, target) \
             VALUES (?1, ?2, ?3, 0, ?4, ?5)",
        )
        .bind(kind.name())
        .bind(opened_at)
        .bind(close_at)
        .bind(opened_by)
        .bind(target)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn election(&self, id: i64) -> Result<Option<Election>, StoreError> {
        let row = sqlx::query(
            "SELECT id, kind, opened_at, close_at, status, opened_by, target \
             FROM elections WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| decode_election(&row)).transpose()
    }

    /// Id of the open election for (kind, target), if any.
    pub async fn find_open(&self, kind: BallotKind, target: &str) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query(
            "SELECT id FROM elections WHERE kind = ?1 AND target = ?2 AND status = 0 LIMIT 1",
        )
        .bind(kind.name())
        .bind(target)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| Ok(row.try_get("id")?)).transpose()
    }

    /// Every open election, in creation order. Recovery relies on the order.
    pub async fn open_elections(&self) -> Result<Vec<Election>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, kind, opened_at, close_at, status, opened_by, target \
             FROM elections WHERE status = 0 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_election).collect()
    }

    /// Newest open elections, for `vote list`.
    pub async fn list_open(&self, limit: u32) -> Result<Vec<Election>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, kind, opened_at, close_at, status, opened_by, target \
             FROM elections WHERE status = 0 ORDER BY id DESC LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_election).collect()
    }

    /// Newest elections of one kind, any status, for `vote list --type`.
    pub async fn list_by_kind(&self, kind: BallotKind, limit: u32) -> Result<Vec<Election>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, kind, opened_at, close_at, status, opened_by, target \
             FROM elections WHERE kind = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(kind.name())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_election).collect()
    }

    /// Most recent failed-majority close for (kind, target), for cooldown.
    pub async fn latest_failed_majority(
        &self,
        kind: BallotKind,
        target: &str,
    ) -> Result<Option<(i64, UnixTime)>, StoreError> {
        let row = sqlx::query(
            "SELECT id, close_at FROM elections \
             WHERE kind = ?1 AND target = ?2 AND status = ?3 \
             ORDER BY close_at DESC LIMIT 1",
        )
        .bind(kind.name())
        .bind(target)
        .bind(ElectionStatus::FailedMajority.code())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| Ok((row.try_get("id")?, row.try_get("close_at")?)))
            .transpose()
    }

    /// Close an election and, when it passed with a temporary effect, create
    /// the Effect row in the same transaction. The guarded update makes a
    /// second close a no-op.
    pub async fn close_election(
        &self,
        id: i64,
        status: ElectionStatus,
        effect: Option<(BallotKind, &str, UnixTime)>,
    ) -> Result<CloseWrite, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query("UPDATE elections SET status = ?2 WHERE id = ?1 AND status = 0")
            .bind(id)
            .bind(status.code())
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CloseWrite::AlreadyClosed);
        }
        let effect_id = match effect {
            Some((kind, target, expires_at)) => {
                let inserted = sqlx::query(
                    "INSERT INTO effects (election_id, kind, target, expires_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(id)
                .bind(kind.name())
                .bind(target)
                .bind(expires_at)
                .execute(&mut *tx)
                .await?;
                Some(inserted.last_insert_rowid())
            }
            None => None,
        };
        tx.commit().await?;
        Ok(CloseWrite::Closed { effect_id })
    }

    /// Open to Vetoed, guarded like a close.
    pub async fn veto_election(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE elections SET status = ?2 WHERE id = ?1 AND status = 0")
            .bind(id)
            .bind(ElectionStatus::Vetoed.code())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    // ---- suffrages ----

    pub async fn cast(
        &self,
        election_id: i64,
        voter: &str,
        yea: bool,
    ) -> Result<CastOutcome, StoreError> {
        let existing = sqlx::query("SELECT yea FROM suffrages WHERE election_id = ?1 AND voter = ?2")
            .bind(election_id)
            .bind(voter)
            .fetch_optional(&self.pool)
            .await?;
        match existing {
            Some(row) => {
                let previous: bool = row.try_get("yea")?;
                if previous == yea {
                    return Ok(CastOutcome::Duplicate);
                }
                sqlx::query("UPDATE suffrages SET yea = ?3 WHERE election_id = ?1 AND voter = ?2")
                    .bind(election_id)
                    .bind(voter)
                    .bind(yea)
                    .execute(&self.pool)
                    .await?;
                Ok(CastOutcome::Changed)
            }
            None => {
                sqlx::query("INSERT INTO suffrages (election_id, voter, yea) VALUES (?1, ?2, ?3)")
                    .bind(election_id)
                    .bind(voter)
                    .bind(yea)
                    .execute(&self.pool)
                    .await?;
                Ok(CastOutcome::Accepted)
            }
        }
    }

    /// (yeas, nays) for one election.
    pub async fn counts(&self, election_id: i64) -> Result<(u32, u32), StoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(yea), 0) AS yeas, COUNT(*) AS total \
             FROM suffrages WHERE election_id = ?1",
        )
        .bind(election_id)
        .fetch_one(&self.pool)
        .await?;
        let yeas: i64 = row.try_get("yeas")?;
        let total: i64 = row.try_get("total")?;
        Ok((yeas as u32, (total - yeas) as u32))
    }

    pub async fn voter_position(
        &self,
        election_id: i64,
        voter: &str,
    ) -> Result<Option<bool>, StoreError> {
        let row = sqlx::query("SELECT yea FROM suffrages WHERE election_id = ?1 AND voter = ?2")
            .bind(election_id)
            .bind(voter)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| Ok(row.try_get("yea")?)).transpose()
    }

    /// Every suffrage on one election, in cast order.
    pub async fn roster(&self, election_id: i64) -> Result<Vec<Suffrage>, StoreError> {
        let rows = sqlx::query(
            "SELECT voter, yea FROM suffrages WHERE election_id = ?1 ORDER BY id",
        )
        .bind(election_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(Suffrage {
                    election_id,
                    voter: row.try_get("voter")?,
                    yea: row.try_get("yea")?,
                })
            })
            .collect()
    }

    // ---- effects ----

    pub async fn effect(&self, id: i64) -> Result<Option<Effect>, StoreError> {
        let row = sqlx::query(
            "SELECT id, election_id, kind, target, expires_at FROM effects WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| decode_effect(&row)).transpose()
    }

    /// Live effect for (kind, target), if any.
    pub async fn find_effect(
        &self,
        kind: BallotKind,
        target: &str,
    ) -> Result<Option<Effect>, StoreError> {
        let row = sqlx::query(
            "SELECT id, election_id, kind, target, expires_at FROM effects \
             WHERE kind = ?1 AND target = ?2 LIMIT 1",
        )
        .bind(kind.name())
        .bind(target)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| decode_effect(&row)).transpose()
    }

    /// Every live effect, in creation order.
    pub async fn effects(&self) -> Result<Vec<Effect>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, election_id, kind, target, expires_at FROM effects ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(decode_effect).collect()
    }

    /// Returns false when the row was already gone (timer replay).
    pub async fn delete_effect(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM effects WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn decode_kind(name: &str) -> Result<BallotKind, StoreError> {
    BallotKind::parse(name).ok_or_else(|| StoreError::Corrupt(format!("unknown ballot kind: {name}")))
}

fn decode_election(row: &sqlx::sqlite::SqliteRow) -> Result<Election, StoreError> {
    let kind: String = row.try_get("kind")?;
    let status: i64 = row.try_get("status")?;
    Ok(Election {
        id: row.try_get("id")?,
        kind: decode_kind(&kind)?,
        opened_at: row.try_get("opened_at")?,
        close_at: row.try_get("close_at")?,
        status: ElectionStatus::from_code(status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown election status: {status}")))?,
        opened_by: row.try_get("opened_by")?,
        target: row.try_get("target")?,
    })
}

fn decode_effect(row: &sqlx::sqlite::SqliteRow) -> Result<Effect, StoreError> {
    let kind: String = row.try_get("kind")?;
    Ok(Effect {
        id: row.try_get("id")?,
        election_id: row.try_get("election_id")?,
        kind: decode_kind(&kind)?,
        target: row.try_get("target")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn election_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .insert_election(BallotKind::Ban, 100, 3_700, "alice", "mallory")
            .await
            .unwrap();
        let election = store.election(id).await.unwrap().unwrap();
        assert_eq!(election.kind, BallotKind::Ban);
        assert_eq!(election.status, ElectionStatus::Open);
        assert_eq!(election.target, "mallory");
        assert_eq!(store.find_open(BallotKind::Ban, "mallory").await.unwrap(), Some(id));
        assert_eq!(store.find_open(BallotKind::Ban, "other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cast_deduplicates_and_flips() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .insert_election(BallotKind::Ban, 0, 100, "alice", "mallory")
            .await
            .unwrap();
        assert_eq!(store.cast(id, "bob", true).await.unwrap(), CastOutcome::Accepted);
        assert_eq!(store.cast(id, "bob", true).await.unwrap(), CastOutcome::Duplicate);
        assert_eq!(store.cast(id, "bob", false).await.unwrap(), CastOutcome::Changed);
        // still one row
        assert_eq!(store.roster(id).await.unwrap().len(), 1);
        assert_eq!(store.counts(id).await.unwrap(), (0, 1));
    }

    #[tokio::test]
    async fn close_is_guarded_and_transactional() {
        let store = Store::open_in_memory().await.unwrap();
        let id = store
            .insert_election(BallotKind::Ban, 0, 100, "alice", "mallory")
            .await
            .unwrap();
        let write = store
            .close_election(id, ElectionStatus::Passed, Some((BallotKind::Ban, "mallory", 900)))
            .await
            .unwrap();
        let effect_id = match write {
            CloseWrite::Closed { effect_id } => effect_id.unwrap(),
            CloseWrite::AlreadyClosed => panic!("first close must win"),
        };
        assert_eq!(
            store.close_election(id, ElectionStatus::FailedQuorum, None).await.unwrap(),
            CloseWrite::AlreadyClosed
        );
        let effect = store.effect(effect_id).await.unwrap().unwrap();
        assert_eq!(effect.election_id, id);
        assert_eq!(effect.expires_at, 900);
        assert!(store.delete_effect(effect_id).await.unwrap());
        assert!(!store.delete_effect(effect_id).await.unwrap());
    }

    #[tokio::test]
    async fn cooldown_lookup_sees_only_failed_majority() {
        let store = Store::open_in_memory().await.unwrap();
        let a = store
            .insert_election(BallotKind::Ban, 0, 100, "alice", "mallory")
            .await
            .unwrap();
        store
            .close_election(a, ElectionStatus::FailedQuorum, None)
            .await
            .unwrap();
        assert_eq!(
            store.latest_failed_majority(BallotKind::Ban, "mallory").await.unwrap(),
            None
        );
        let b = store
            .insert_election(BallotKind::Ban, 200, 300, "alice", "mallory")
            .await
            .unwrap();
        store
            .close_election(b, ElectionStatus::FailedMajority, None)
            .await
            .unwrap();
        assert_eq!(
            store.latest_failed_majority(BallotKind::Ban, "mallory").await.unwrap(),
            Some((b, 300))
        );
    }

    #[tokio::test]
    async fn identities_round_trip() {
        let store = Store::open_in_memory().await.unwrap();
        let info = MemberInfo {
            first_seen: 1,
            last_seen: 2,
            lines: 42,
            flags: "V".to_string(),
        };
        store.upsert_identity("alice", &info).await.unwrap();
        let updated = MemberInfo { lines: 47, ..info.clone() };
        store.upsert_identity("alice", &updated).await.unwrap();
        let rows = store.load_identities().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "alice");
        assert_eq!(rows[0].1.lines, 47);
        assert_eq!(rows[0].1.flags, "V");
    }
}
