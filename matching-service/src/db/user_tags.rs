//! User-to-tag affinity persistence
//!
//! Attach and detach keep `tags.usage_count` in step with active relations,
//! so both run inside one transaction.

use matching_common::models::{clamp_weight, UserTag};
use matching_common::{time, uuid_utils, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

const USER_TAG_COLUMNS: &str = "guid, user_id, tag_id, weight, created_at, updated_at, is_active";

/// What an attach call did to the relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// New relation; tag usage incremented
    Created,
    /// Inactive relation revived; tag usage incremented
    Reactivated,
    /// Active relation re-weighted; usage unchanged
    Updated,
}

/// Weight pair for one tag shared between the subject and another user
#[derive(Debug, Clone, PartialEq)]
pub struct SharedTag {
    pub tag_id: Uuid,
    pub other_user_id: Uuid,
    pub own_weight: f32,
    pub other_weight: f32,
}

/// user_tags table access
#[derive(Debug, Clone)]
pub struct UserTagRepository {
    pool: SqlitePool,
}

impl UserTagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every relation of a user, active or not
    pub async fn by_user(&self, user_id: Uuid) -> Result<Vec<UserTag>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_tags WHERE user_id = ? ORDER BY weight DESC, created_at ASC",
            USER_TAG_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_tag_from_row).collect()
    }

    /// Active relations of a user, strongest first
    pub async fn active_by_user(&self, user_id: Uuid) -> Result<Vec<UserTag>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_tags WHERE user_id = ? AND is_active = 1 ORDER BY weight DESC, created_at ASC",
            USER_TAG_COLUMNS
        ))
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_tag_from_row).collect()
    }

    /// Active holders of a tag
    pub async fn by_tag(&self, tag_id: Uuid) -> Result<Vec<UserTag>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_tags WHERE tag_id = ? AND is_active = 1",
            USER_TAG_COLUMNS
        ))
        .bind(tag_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_tag_from_row).collect()
    }

    pub async fn get(&self, user_id: Uuid, tag_id: Uuid) -> Result<Option<UserTag>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_tags WHERE user_id = ? AND tag_id = ?",
            USER_TAG_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(tag_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(user_tag_from_row).transpose()
    }

    /// For each active tag of `user_id`, every other active holder and both weights
    pub async fn shared_tags(&self, user_id: Uuid) -> Result<Vec<SharedTag>> {
        let rows = sqlx::query(
            r#"
            SELECT mine.tag_id, theirs.user_id AS other_user_id,
                   mine.weight AS own_weight, theirs.weight AS other_weight
            FROM user_tags mine
            JOIN user_tags theirs
              ON theirs.tag_id = mine.tag_id
             AND theirs.user_id != mine.user_id
             AND theirs.is_active = 1
            WHERE mine.user_id = ? AND mine.is_active = 1
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let tag_id: String = row.get("tag_id");
                let other: String = row.get("other_user_id");
                Ok(SharedTag {
                    tag_id: uuid_utils::parse(&tag_id)?,
                    other_user_id: uuid_utils::parse(&other)?,
                    own_weight: row.get("own_weight"),
                    other_weight: row.get("other_weight"),
                })
            })
            .collect()
    }

    /// Insert a raw relation row (no usage bookkeeping)
    pub async fn insert(&self, user_tag: &UserTag) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_relation(&mut tx, user_tag).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Persist weight and active flag of an existing relation
    pub async fn update(&self, user_tag: &UserTag) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE user_tags SET weight = ?, is_active = ?, updated_at = ? WHERE guid = ?",
        )
        .bind(clamp_weight(user_tag.weight))
        .bind(user_tag.is_active)
        .bind(time::to_millis(user_tag.updated_at))
        .bind(user_tag.id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete a relation row (no usage bookkeeping)
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_tags WHERE guid = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Attach `tag_id` to `user_id` with `weight`, maintaining tag usage
    ///
    /// Unknown tag ids are rejected before anything is written.
    pub async fn attach(&self, user_id: Uuid, tag_id: Uuid, weight: f32) -> Result<(UserTag, AttachOutcome)> {
        let mut tx = self.pool.begin().await?;

        let tag_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tags WHERE guid = ?)")
            .bind(tag_id.to_string())
            .fetch_one(&mut *tx)
            .await?;
        if !tag_exists {
            return Err(Error::validation("tag_id", format!("tag {} does not exist", tag_id)));
        }

        let existing = sqlx::query(&format!(
            "SELECT {} FROM user_tags WHERE user_id = ? AND tag_id = ?",
            USER_TAG_COLUMNS
        ))
        .bind(user_id.to_string())
        .bind(tag_id.to_string())
        .fetch_optional(&mut *tx)
        .await?;

        let (user_tag, outcome) = match existing.as_ref().map(user_tag_from_row).transpose()? {
            None => {
                let user_tag = UserTag::new(user_id, tag_id, weight);
                insert_relation(&mut tx, &user_tag).await?;
                increment_usage(&mut tx, tag_id).await?;
                (user_tag, AttachOutcome::Created)
            }
            Some(mut user_tag) if user_tag.is_active => {
                user_tag.update_weight(weight);
                write_relation_state(&mut tx, &user_tag).await?;
                (user_tag, AttachOutcome::Updated)
            }
            Some(mut user_tag) => {
                user_tag.update_weight(weight);
                user_tag.activate();
                write_relation_state(&mut tx, &user_tag).await?;
                increment_usage(&mut tx, tag_id).await?;
                (user_tag, AttachOutcome::Reactivated)
            }
        };

        tx.commit().await?;
        Ok((user_tag, outcome))
    }

    /// Deactivate the relation and decrement tag usage
    ///
    /// Returns false (and writes nothing) when no active relation exists.
    pub async fn detach(&self, user_id: Uuid, tag_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE user_tags SET is_active = 0, updated_at = ? WHERE user_id = ? AND tag_id = ? AND is_active = 1",
        )
        .bind(time::to_millis(time::now()))
        .bind(user_id.to_string())
        .bind(tag_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE tags SET usage_count = MAX(usage_count - 1, 0) WHERE guid = ?")
            .bind(tag_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Re-weight an active relation; `None` when there is none
    pub async fn update_weight(&self, user_id: Uuid, tag_id: Uuid, weight: f32) -> Result<Option<UserTag>> {
        let Some(mut user_tag) = self.get(user_id, tag_id).await? else {
            return Ok(None);
        };
        if !user_tag.is_active {
            return Ok(None);
        }

        user_tag.update_weight(weight);
        self.update(&user_tag).await?;
        Ok(Some(user_tag))
    }
}

async fn insert_relation(tx: &mut Transaction<'_, Sqlite>, user_tag: &UserTag) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_tags (guid, user_id, tag_id, weight, created_at, updated_at, is_active)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_tag.id.to_string())
    .bind(user_tag.user_id.to_string())
    .bind(user_tag.tag_id.to_string())
    .bind(clamp_weight(user_tag.weight))
    .bind(time::to_millis(user_tag.created_at))
    .bind(time::to_millis(user_tag.updated_at))
    .bind(user_tag.is_active)
    .execute(&mut **tx)
    .await
    .map_err(|e| Error::from_write(e, "user tag"))?;

    Ok(())
}

async fn write_relation_state(tx: &mut Transaction<'_, Sqlite>, user_tag: &UserTag) -> Result<()> {
    sqlx::query("UPDATE user_tags SET weight = ?, is_active = ?, updated_at = ? WHERE guid = ?")
        .bind(clamp_weight(user_tag.weight))
        .bind(user_tag.is_active)
        .bind(time::to_millis(user_tag.updated_at))
        .bind(user_tag.id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn increment_usage(tx: &mut Transaction<'_, Sqlite>, tag_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE tags SET usage_count = usage_count + 1, last_used_at = ? WHERE guid = ?")
        .bind(time::to_millis(time::now()))
        .bind(tag_id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn user_tag_from_row(row: &SqliteRow) -> Result<UserTag> {
    let guid: String = row.get("guid");
    let user_id: String = row.get("user_id");
    let tag_id: String = row.get("tag_id");

    Ok(UserTag {
        id: uuid_utils::parse(&guid)?,
        user_id: uuid_utils::parse(&user_id)?,
        tag_id: uuid_utils::parse(&tag_id)?,
        weight: row.get("weight"),
        created_at: time::from_millis(row.get("created_at")),
        updated_at: time::from_millis(row.get("updated_at")),
        is_active: row.get("is_active"),
    })
}
