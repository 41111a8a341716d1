//! Interaction ledger persistence
//!
//! Rows are append-only; the rating column is the only field ever rewritten.

use chrono::{DateTime, Utc};
use matching_common::models::{clamp_rating, InteractionType, UserInteraction};
use matching_common::{time, uuid_utils, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use uuid::Uuid;

const INTERACTION_COLUMNS: &str =
    "guid, user_id, target_user_id, interaction_type, rating, created_at, context, metadata";

/// Mean positive rating per target
pub type RatingMap = HashMap<Uuid, f64>;

/// user_interactions table access
#[derive(Debug, Clone)]
pub struct InteractionRepository {
    pool: SqlitePool,
}

impl InteractionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, interaction: &UserInteraction) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_interaction(&mut conn, interaction).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<UserInteraction>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_interactions WHERE guid = ?",
            INTERACTION_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(interaction_from_row).transpose()
    }

    /// Rewrite the rating of one row; returns false if the row does not exist
    pub async fn update_rating(&self, id: Uuid, rating: f32) -> Result<bool> {
        let result = sqlx::query("UPDATE user_interactions SET rating = ? WHERE guid = ?")
            .bind(clamp_rating(rating))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All interactions initiated by a user, newest first
    pub async fn by_user(&self, user_id: Uuid) -> Result<Vec<UserInteraction>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_interactions WHERE user_id = ? ORDER BY created_at DESC",
            INTERACTION_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(interaction_from_row).collect()
    }

    pub async fn by_user_and_type(
        &self,
        user_id: Uuid,
        interaction_type: InteractionType,
    ) -> Result<Vec<UserInteraction>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_interactions WHERE user_id = ? AND interaction_type = ? ORDER BY created_at DESC",
            INTERACTION_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(interaction_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(interaction_from_row).collect()
    }

    pub async fn by_pair(&self, user_id: Uuid, target_user_id: Uuid) -> Result<Vec<UserInteraction>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_interactions WHERE user_id = ? AND target_user_id = ? ORDER BY created_at DESC",
            INTERACTION_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(target_user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(interaction_from_row).collect()
    }

    /// Interactions of a user at or after `since`, newest first, at most `count`
    pub async fn recent_since(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<UserInteraction>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM user_interactions
            WHERE user_id = ? AND created_at >= ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
            INTERACTION_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(time::to_millis(since))
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(interaction_from_row).collect()
    }

    /// Mean of a user's positive ratings, per target
    pub async fn ratings_by_user(&self, user_id: Uuid) -> Result<RatingMap> {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            r#"
            SELECT target_user_id, AVG(rating)
            FROM user_interactions
            WHERE user_id = ? AND rating > 0
            GROUP BY target_user_id
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(target, mean)| Ok((uuid_utils::parse(&target)?, mean)))
            .collect()
    }

    /// Users holding at least one positive rating
    pub async fn users_with_ratings(&self) -> Result<BTreeSet<Uuid>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT user_id FROM user_interactions WHERE rating > 0")
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(|id| uuid_utils::parse(id)).collect()
    }

    /// Every user's rating map in one round trip
    pub async fn all_ratings(&self) -> Result<HashMap<Uuid, RatingMap>> {
        let rows: Vec<(String, String, f64)> = sqlx::query_as(
            r#"
            SELECT user_id, target_user_id, AVG(rating)
            FROM user_interactions
            WHERE rating > 0
            GROUP BY user_id, target_user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut all: HashMap<Uuid, RatingMap> = HashMap::new();
        for (user, target, mean) in rows {
            all.entry(uuid_utils::parse(&user)?)
                .or_default()
                .insert(uuid_utils::parse(&target)?, mean);
        }
        Ok(all)
    }

    /// Interaction count per type for one user
    pub async fn counts_by_type(&self, user_id: Uuid) -> Result<BTreeMap<InteractionType, i64>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT interaction_type, COUNT(*) FROM user_interactions WHERE user_id = ? GROUP BY interaction_type",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(label, count)| Ok((label.parse::<InteractionType>()?, count)))
            .collect()
    }
}

/// Insert one interaction row on an open connection or transaction
pub(crate) async fn insert_interaction(conn: &mut SqliteConnection, interaction: &UserInteraction) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_interactions (
            guid, user_id, target_user_id, interaction_type, rating,
            created_at, context, metadata
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(interaction.id.to_string())
    .bind(interaction.user_id.to_string())
    .bind(interaction.target_user_id.to_string())
    .bind(interaction.interaction_type.as_str())
    .bind(clamp_rating(interaction.rating))
    .bind(time::to_millis(interaction.created_at))
    .bind(&interaction.context)
    .bind(&interaction.metadata)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn interaction_from_row(row: &SqliteRow) -> Result<UserInteraction> {
    let guid: String = row.get("guid");
    let user_id: String = row.get("user_id");
    let target: String = row.get("target_user_id");
    let interaction_type: String = row.get("interaction_type");

    Ok(UserInteraction {
        id: uuid_utils::parse(&guid)?,
        user_id: uuid_utils::parse(&user_id)?,
        target_user_id: uuid_utils::parse(&target)?,
        interaction_type: interaction_type.parse()?,
        rating: row.get("rating"),
        created_at: time::from_millis(row.get("created_at")),
        context: row.get("context"),
        metadata: row.get("metadata"),
    })
}
