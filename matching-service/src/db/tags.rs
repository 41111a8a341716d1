//! Tag catalog persistence

use matching_common::models::{Tag, TagCategory};
use matching_common::{time, uuid_utils, Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const TAG_COLUMNS: &str =
    "guid, name, description, category, usage_count, created_at, last_used_at, is_active";

/// Tag table access
#[derive(Debug, Clone)]
pub struct TagRepository {
    pool: SqlitePool,
}

impl TagRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new tag; a duplicate name surfaces as `Conflict`
    pub async fn insert(&self, tag: &Tag) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tags (
                guid, name, description, category, usage_count,
                created_at, last_used_at, is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(tag.id.to_string())
        .bind(&tag.name)
        .bind(&tag.description)
        .bind(tag.category.as_str())
        .bind(tag.usage_count)
        .bind(time::to_millis(tag.created_at))
        .bind(tag.last_used_at.map(time::to_millis))
        .bind(tag.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_write(e, "tag"))?;

        Ok(())
    }

    /// Overwrite name, description, category and active flag
    ///
    /// Usage bookkeeping is owned by the attach/detach path and is not
    /// touched here. Returns false if the tag does not exist.
    pub async fn update(&self, tag: &Tag) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tags
            SET name = ?, description = ?, category = ?, is_active = ?
            WHERE guid = ?
            "#,
        )
        .bind(&tag.name)
        .bind(&tag.description)
        .bind(tag.category.as_str())
        .bind(tag.is_active)
        .bind(tag.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_write(e, "tag"))?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Tag>> {
        let row = sqlx::query(&format!("SELECT {} FROM tags WHERE guid = ?", TAG_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(tag_from_row).transpose()
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let row = sqlx::query(&format!("SELECT {} FROM tags WHERE name = ?", TAG_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(tag_from_row).transpose()
    }

    pub async fn exists_by_name(&self, name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tags WHERE name = ?)")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Active tags, most used first
    pub async fn list_active(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tags WHERE is_active = 1 ORDER BY usage_count DESC, name ASC",
            TAG_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(tag_from_row).collect()
    }

    /// Active tags of one category, most used first
    pub async fn by_category(&self, category: TagCategory) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tags WHERE is_active = 1 AND category = ? ORDER BY usage_count DESC, name ASC",
            TAG_COLUMNS
        ))
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(tag_from_row).collect()
    }

    /// Case-insensitive substring search over name and description
    pub async fn search(&self, keyword: &str, count: usize) -> Result<Vec<Tag>> {
        let pattern = format!("%{}%", escape_like(&keyword.to_lowercase()));
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM tags
            WHERE is_active = 1
              AND (LOWER(name) LIKE ? ESCAPE '\' OR LOWER(description) LIKE ? ESCAPE '\')
            ORDER BY usage_count DESC, name ASC
            LIMIT ?
            "#,
            TAG_COLUMNS
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(tag_from_row).collect()
    }

    /// Active tags by usage, most recently used first among equals
    pub async fn popular(&self, count: usize) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM tags
            WHERE is_active = 1
            ORDER BY usage_count DESC, last_used_at DESC
            LIMIT ?
            "#,
            TAG_COLUMNS
        ))
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(tag_from_row).collect()
    }

    /// Count active relations still pointing at a tag
    pub async fn active_reference_count(&self, id: Uuid) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM user_tags WHERE tag_id = ? AND is_active = 1")
                .bind(id.to_string())
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Delete a tag together with its inactive relations
    ///
    /// Returns false if the tag does not exist. Callers check for active
    /// relations first.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_tags WHERE tag_id = ? AND is_active = 0")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM tags WHERE guid = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

pub(crate) fn tag_from_row(row: &SqliteRow) -> Result<Tag> {
    let guid: String = row.get("guid");
    let category: String = row.get("category");
    let last_used_at: Option<i64> = row.get("last_used_at");

    Ok(Tag {
        id: uuid_utils::parse(&guid)?,
        name: row.get("name"),
        description: row.get("description"),
        category: category.parse()?,
        usage_count: row.get("usage_count"),
        created_at: time::from_millis(row.get("created_at")),
        last_used_at: last_used_at.map(time::from_millis),
        is_active: row.get("is_active"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use matching_common::db::init::init_memory_database;

    async fn repo() -> TagRepository {
        TagRepository::new(init_memory_database().await.expect("in-memory database"))
    }

    #[tokio::test]
    async fn test_insert_and_load_tag() {
        let repo = repo().await;
        let tag = Tag::new("Rock Climbing", "bouldering and ropes", TagCategory::Sports);
        repo.insert(&tag).await.unwrap();

        let loaded = repo.get(tag.id).await.unwrap().expect("tag should exist");
        assert_eq!(loaded.name, "Rock Climbing");
        assert_eq!(loaded.category, TagCategory::Sports);
        assert_eq!(loaded.usage_count, 0);
        assert!(loaded.last_used_at.is_none());
        assert!(loaded.is_active);

        let by_name = repo.get_by_name("Rock Climbing").await.unwrap();
        assert_eq!(by_name.map(|t| t.id), Some(tag.id));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_conflict() {
        let repo = repo().await;
        repo.insert(&Tag::new("chess", "", TagCategory::Gaming)).await.unwrap();

        let err = repo.insert(&Tag::new("chess", "again", TagCategory::Gaming)).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_ranked() {
        let repo = repo().await;
        let mut jazz = Tag::new("Jazz", "smoky clubs", TagCategory::Music);
        jazz.usage_count = 2;
        let mut piano = Tag::new("Piano", "classical and jazz piano", TagCategory::Music);
        piano.usage_count = 9;
        let hiking = Tag::new("Hiking", "", TagCategory::Sports);
        for tag in [&jazz, &piano, &hiking] {
            repo.insert(tag).await.unwrap();
        }

        let found = repo.search("JAZZ", 10).await.unwrap();
        let names: Vec<_> = found.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Piano", "Jazz"]);

        assert_eq!(repo.search("jazz", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_treats_wildcards_literally() {
        let repo = repo().await;
        repo.insert(&Tag::new("100% cotton", "", TagCategory::Fashion)).await.unwrap();
        repo.insert(&Tag::new("cotton", "", TagCategory::Fashion)).await.unwrap();

        let found = repo.search("0%", 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "100% cotton");
    }

    #[tokio::test]
    async fn test_popular_excludes_inactive() {
        let repo = repo().await;
        let mut busy = Tag::new("busy", "", TagCategory::Other);
        busy.usage_count = 5;
        let mut retired = Tag::new("retired", "", TagCategory::Other);
        retired.usage_count = 50;
        retired.is_active = false;
        repo.insert(&busy).await.unwrap();
        repo.insert(&retired).await.unwrap();

        let popular = repo.popular(10).await.unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].name, "busy");
    }

    #[tokio::test]
    async fn test_delete_unknown_tag_returns_false() {
        let repo = repo().await;
        assert!(!repo.delete(Uuid::new_v4()).await.unwrap());
    }
}
