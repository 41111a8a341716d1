//! Match persistence

use matching_common::models::{clamp_score, MatchStatus, MatchType, UserInteraction, UserMatch};
use matching_common::{time, uuid_utils, Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::db::interactions::insert_interaction;

const MATCH_COLUMNS: &str =
    "guid, user_id, matched_user_id, score, match_type, status, created_at, last_interaction_at, notes";

/// Aggregate view of one user's matches
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchStats {
    pub total: i64,
    pub by_status: BTreeMap<MatchStatus, i64>,
    /// Mean score over all matches, 0 when there are none
    pub average_score: f64,
}

/// user_matches table access
#[derive(Debug, Clone)]
pub struct MatchRepository {
    pool: SqlitePool,
}

impl MatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a pending match, or refresh the score of the existing pair
    ///
    /// One statement guarded by the (user_id, matched_user_id) unique
    /// constraint; status, type and timestamps of an existing row are kept.
    pub async fn upsert(
        &self,
        user_id: Uuid,
        matched_user_id: Uuid,
        score: f32,
        match_type: MatchType,
    ) -> Result<UserMatch> {
        let candidate = UserMatch::new(user_id, matched_user_id, score, match_type);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO user_matches (
                guid, user_id, matched_user_id, score, match_type, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, matched_user_id) DO UPDATE SET
                score = excluded.score
            RETURNING {}
            "#,
            MATCH_COLUMNS
        ))
        .bind(candidate.id.to_string())
        .bind(user_id.to_string())
        .bind(matched_user_id.to_string())
        .bind(candidate.score)
        .bind(match_type.as_str())
        .bind(candidate.status.as_str())
        .bind(time::to_millis(candidate.created_at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::from_write(e, "match"))?;

        match_from_row(&row)
    }

    /// Plain insert; a second row for the same pair is a `Conflict`
    pub async fn insert(&self, user_match: &UserMatch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_matches (
                guid, user_id, matched_user_id, score, match_type, status,
                created_at, last_interaction_at, notes
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_match.id.to_string())
        .bind(user_match.user_id.to_string())
        .bind(user_match.matched_user_id.to_string())
        .bind(clamp_score(user_match.score))
        .bind(user_match.match_type.as_str())
        .bind(user_match.status.as_str())
        .bind(time::to_millis(user_match.created_at))
        .bind(user_match.last_interaction_at.map(time::to_millis))
        .bind(&user_match.notes)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_write(e, "match"))?;

        Ok(())
    }

    /// Write status, last interaction and notes if the stored status is still `expected`
    ///
    /// The status check and the optional `feedback` interaction commit in one
    /// transaction. Returns false, writing nothing, when another writer moved
    /// the match first. The score is left alone: it belongs to [`Self::upsert`].
    pub async fn update_status(
        &self,
        user_match: &UserMatch,
        expected: MatchStatus,
        feedback: Option<&UserInteraction>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE user_matches
            SET status = ?, last_interaction_at = ?, notes = ?
            WHERE guid = ? AND status = ?
            "#,
        )
        .bind(user_match.status.as_str())
        .bind(user_match.last_interaction_at.map(time::to_millis))
        .bind(&user_match.notes)
        .bind(user_match.id.to_string())
        .bind(expected.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        if let Some(interaction) = feedback {
            insert_interaction(&mut tx, interaction).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<UserMatch>> {
        let row = sqlx::query(&format!("SELECT {} FROM user_matches WHERE guid = ?", MATCH_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    pub async fn get_by_pair(&self, user_id: Uuid, matched_user_id: Uuid) -> Result<Option<UserMatch>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_matches WHERE user_id = ? AND matched_user_id = ?",
            MATCH_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(matched_user_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(match_from_row).transpose()
    }

    pub async fn exists_by_pair(&self, user_id: Uuid, matched_user_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM user_matches WHERE user_id = ? AND matched_user_id = ?)",
        )
        .bind(user_id.to_string())
        .bind(matched_user_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// All matches of a user, best first
    pub async fn by_user(&self, user_id: Uuid) -> Result<Vec<UserMatch>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_matches WHERE user_id = ? ORDER BY score DESC, created_at DESC",
            MATCH_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    pub async fn by_user_and_status(&self, user_id: Uuid, status: MatchStatus) -> Result<Vec<UserMatch>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_matches WHERE user_id = ? AND status = ? ORDER BY score DESC, created_at DESC",
            MATCH_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    /// Pending matches, highest score first, at most `count`
    pub async fn pending(&self, user_id: Uuid, count: usize) -> Result<Vec<UserMatch>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM user_matches
            WHERE user_id = ? AND status = 'pending'
            ORDER BY score DESC, created_at DESC
            LIMIT ?
            "#,
            MATCH_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    /// Matches scoring at least `min_score`, highest first, at most `count`
    pub async fn high_score(&self, user_id: Uuid, min_score: f32, count: usize) -> Result<Vec<UserMatch>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM user_matches
            WHERE user_id = ? AND score >= ?
            ORDER BY score DESC, created_at DESC
            LIMIT ?
            "#,
            MATCH_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(min_score)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<MatchStats> {
        let rows: Vec<(String, i64, f64)> = sqlx::query_as(
            "SELECT status, COUNT(*), SUM(score) FROM user_matches WHERE user_id = ? GROUP BY status",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut stats = MatchStats::default();
        let mut score_sum = 0.0;
        for (status, count, sum) in rows {
            stats.by_status.insert(status.parse()?, count);
            stats.total += count;
            score_sum += sum;
        }
        if stats.total > 0 {
            stats.average_score = score_sum / stats.total as f64;
        }
        Ok(stats)
    }
}

fn match_from_row(row: &SqliteRow) -> Result<UserMatch> {
    let guid: String = row.get("guid");
    let user_id: String = row.get("user_id");
    let matched: String = row.get("matched_user_id");
    let match_type: String = row.get("match_type");
    let status: String = row.get("status");
    let last_interaction_at: Option<i64> = row.get("last_interaction_at");

    Ok(UserMatch {
        id: uuid_utils::parse(&guid)?,
        user_id: uuid_utils::parse(&user_id)?,
        matched_user_id: uuid_utils::parse(&matched)?,
        score: row.get("score"),
        match_type: match_type.parse()?,
        status: status.parse()?,
        created_at: time::from_millis(row.get("created_at")),
        last_interaction_at: last_interaction_at.map(time::from_millis),
        notes: row.get("notes"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use matching_common::db::init::init_memory_database;
    use matching_common::models::InteractionType;

    async fn repo() -> MatchRepository {
        MatchRepository::new(init_memory_database().await.expect("in-memory database"))
    }

    #[tokio::test]
    async fn test_upsert_twice_keeps_one_row() {
        let repo = repo().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let first = repo.upsert(a, b, 0.4, MatchType::TagBased).await.unwrap();
        let second = repo.upsert(a, b, 0.7, MatchType::Hybrid).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.score, 0.7);
        assert_eq!(second.match_type, MatchType::TagBased, "only the score is refreshed");
        assert_eq!(second.status, MatchStatus::Pending);
        assert_eq!(repo.by_user(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_clamps_score() {
        let repo = repo().await;
        let m = repo.upsert(Uuid::new_v4(), Uuid::new_v4(), 4.2, MatchType::Random).await.unwrap();
        assert_eq!(m.score, 1.0);
    }

    #[tokio::test]
    async fn test_upsert_keeps_terminal_status() {
        let repo = repo().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut m = repo.upsert(a, b, 0.5, MatchType::Hybrid).await.unwrap();
        m.transition(MatchStatus::Rejected).unwrap();
        assert!(repo.update_status(&m, MatchStatus::Pending, None).await.unwrap());

        let again = repo.upsert(a, b, 0.9, MatchType::Hybrid).await.unwrap();
        assert_eq!(again.status, MatchStatus::Rejected);
        assert!(again.last_interaction_at.is_some());
    }

    #[tokio::test]
    async fn test_plain_insert_of_duplicate_pair_conflicts() {
        let repo = repo().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        repo.insert(&UserMatch::new(a, b, 0.3, MatchType::LocationBased)).await.unwrap();

        let err = repo.insert(&UserMatch::new(a, b, 0.6, MatchType::LocationBased)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(repo.exists_by_pair(a, b).await.unwrap());
        assert!(!repo.exists_by_pair(b, a).await.unwrap(), "pairs are ordered");
    }

    #[tokio::test]
    async fn test_pending_high_score_and_stats() {
        let repo = repo().await;
        let a = Uuid::new_v4();
        for score in [0.2, 0.9, 0.6] {
            repo.upsert(a, Uuid::new_v4(), score, MatchType::Hybrid).await.unwrap();
        }
        let mut accepted = repo.upsert(a, Uuid::new_v4(), 0.8, MatchType::Hybrid).await.unwrap();
        accepted.transition(MatchStatus::Accepted).unwrap();
        assert!(repo.update_status(&accepted, MatchStatus::Pending, None).await.unwrap());

        let pending = repo.pending(a, 2).await.unwrap();
        let scores: Vec<f32> = pending.iter().map(|m| m.score).collect();
        assert_eq!(scores, vec![0.9, 0.6]);

        let high = repo.high_score(a, 0.6, 10).await.unwrap();
        assert_eq!(high.len(), 3);

        let stats = repo.stats(a).await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_status[&MatchStatus::Pending], 3);
        assert_eq!(stats.by_status[&MatchStatus::Accepted], 1);
        assert!((stats.average_score - 0.625).abs() < 1e-6);

        let by_status = repo.by_user_and_status(a, MatchStatus::Accepted).await.unwrap();
        assert_eq!(by_status.len(), 1);
    }

    #[tokio::test]
    async fn test_status_write_is_conditional_and_keeps_score() {
        let pool = init_memory_database().await.expect("in-memory database");
        let repo = MatchRepository::new(pool.clone());
        let interactions = crate::db::InteractionRepository::new(pool);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let loaded = repo.upsert(a, b, 0.2, MatchType::Hybrid).await.unwrap();
        // Score refreshed after the row was read
        repo.upsert(a, b, 0.9, MatchType::Hybrid).await.unwrap();

        let mut accepted = loaded.clone();
        accepted.transition(MatchStatus::Accepted).unwrap();
        let like = UserInteraction::new(a, b, InteractionType::Like, 5.0);
        assert!(repo.update_status(&accepted, MatchStatus::Pending, Some(&like)).await.unwrap());

        let stored = repo.get(loaded.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Accepted);
        assert_eq!(stored.score, 0.9, "status write must not touch the score");

        // A writer still holding the pending copy loses and writes nothing
        let mut rejected = loaded.clone();
        rejected.transition(MatchStatus::Rejected).unwrap();
        let stale_like = UserInteraction::new(a, b, InteractionType::Like, 5.0);
        assert!(!repo.update_status(&rejected, MatchStatus::Pending, Some(&stale_like)).await.unwrap());

        assert_eq!(repo.get(loaded.id).await.unwrap().unwrap().status, MatchStatus::Accepted);
        assert_eq!(interactions.by_pair(a, b).await.unwrap().len(), 1);
    }
}
