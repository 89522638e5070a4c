//! SQLite [`HitStore`] on the schema created by `appraise_common::db`

use super::{validate_new_result, HitStore};
use crate::error::{Error, Result};
use crate::hit::Hit;
use crate::judgment::{NewResult, ResultRecord};
use crate::segment::SegmentRecord;
use crate::task_type::TaskType;
use appraise_common::time::{millis_to_duration, now};
use appraise_common::LanguagePair;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_hit(&self, row: SqliteRow) -> Result<Hit> {
        let hit_id: String = row.try_get("hit_id")?;
        let language_pair: LanguagePair = row.try_get::<String, _>("language_pair")?.parse()?;
        let task_type: TaskType = row
            .try_get::<String, _>("task_type")?
            .parse()
            .map_err(|e: String| appraise_common::Error::Internal(e))?;

        let mut hit = Hit::new(
            hit_id.clone(),
            row.try_get("block_id")?,
            language_pair,
            task_type,
            row.try_get::<String, _>("hit_xml")?,
        );
        hit.active = row.try_get("active")?;
        hit.source_file = row.try_get("source_file")?;
        if hit.source_file.is_some() {
            // `filename` in the fallback attributes needs the source file
            hit.reload_dynamic_fields();
        }

        let users: Vec<String> =
            sqlx::query_scalar("SELECT user_id FROM hit_users WHERE hit_id = ? ORDER BY user_id")
                .bind(&hit_id)
                .fetch_all(&self.pool)
                .await?;
        hit.users = users.into_iter().collect();

        let segments: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, item_xml FROM segments WHERE hit_id = ? ORDER BY id")
                .bind(&hit_id)
                .fetch_all(&self.pool)
                .await?;
        hit.segments = segments
            .into_iter()
            .map(|(id, item_xml)| SegmentRecord::from_item_xml(id, hit_id.clone(), item_xml))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(hit)
    }
}

const SELECT_HIT: &str = r#"
    SELECT hit_id, block_id, language_pair, task_type, hit_xml, source_file, active
    FROM hits
"#;

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

async fn insert_one(conn: &mut SqliteConnection, hit: &mut Hit) -> Result<()> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO hits (hit_id, block_id, language_pair, task_type, hit_xml, source_file, active)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&hit.id)
    .bind(hit.block_id)
    .bind(hit.language_pair.code())
    .bind(hit.task_type.slug())
    .bind(&hit.hit_xml)
    .bind(&hit.source_file)
    .bind(hit.active)
    .execute(&mut *conn)
    .await;

    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Err(Error::DuplicateHitId(hit.id.clone())),
        Err(e) => return Err(e.into()),
    }

    for user in &hit.users {
        sqlx::query("INSERT INTO hit_users (hit_id, user_id) VALUES (?, ?)")
            .bind(&hit.id)
            .bind(user)
            .execute(&mut *conn)
            .await?;
    }

    for segment in &mut hit.segments {
        let done = sqlx::query("INSERT INTO segments (hit_id, item_xml) VALUES (?, ?)")
            .bind(&hit.id)
            .bind(&segment.item_xml)
            .execute(&mut *conn)
            .await?;
        segment.id = done.last_insert_rowid();
        segment.hit_id = hit.id.clone();
    }
    Ok(())
}

fn result_from_row(row: &SqliteRow) -> Result<ResultRecord> {
    let duration_ms: Option<i64> = row.try_get("duration_ms")?;
    Ok(ResultRecord {
        id: row.try_get("id")?,
        segment_id: row.try_get("segment_id")?,
        hit_id: row.try_get("hit_id")?,
        user: row.try_get("user_id")?,
        duration: duration_ms.map(|ms| millis_to_duration(ms.max(0) as u64)),
        raw_result: row.try_get("raw_result")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl HitStore for SqliteStore {
    async fn hit_id_exists(&self, hit_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hits WHERE hit_id = ?")
            .bind(hit_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn insert_hits(&self, mut hits: Vec<Hit>) -> Result<Vec<Hit>> {
        let mut tx = self.pool.begin().await?;
        for hit in &mut hits {
            if let Err(e) = insert_one(&mut tx, hit).await {
                tx.rollback().await?;
                return Err(e);
            }
        }
        tx.commit().await?;

        for hit in &hits {
            info!(
                "Stored HIT {} ({} segments, block {})",
                hit.id,
                hit.segments.len(),
                hit.block_id
            );
        }
        Ok(hits)
    }

    async fn get_hit(&self, hit_id: &str) -> Result<Option<Hit>> {
        let row = sqlx::query(&format!("{} WHERE hit_id = ?", SELECT_HIT))
            .bind(hit_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_hit(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_hits(&self) -> Result<Vec<Hit>> {
        let rows = sqlx::query(&format!("{} ORDER BY block_id, language_pair, hit_id", SELECT_HIT))
            .fetch_all(&self.pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in rows {
            hits.push(self.load_hit(row).await?);
        }
        Ok(hits)
    }

    async fn update_hit(&self, hit: &Hit) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE hits SET active = ? WHERE hit_id = ?")
            .bind(hit.active)
            .bind(&hit.id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(format!("HIT {}", hit.id)));
        }

        sqlx::query("DELETE FROM hit_users WHERE hit_id = ?")
            .bind(&hit.id)
            .execute(&mut *tx)
            .await?;
        for user in &hit.users {
            sqlx::query("INSERT INTO hit_users (hit_id, user_id) VALUES (?, ?)")
                .bind(&hit.id)
                .bind(user)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_hit(&self, hit_id: &str) -> Result<bool> {
        // segments, results and hit_users go with it (ON DELETE CASCADE)
        let deleted = sqlx::query("DELETE FROM hits WHERE hit_id = ?")
            .bind(hit_id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn source_file_references(&self, key: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM hits WHERE source_file = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn insert_result(&self, result: NewResult) -> Result<ResultRecord> {
        validate_new_result(&result)?;

        let hit_id: Option<String> = sqlx::query_scalar("SELECT hit_id FROM segments WHERE id = ?")
            .bind(result.segment_id)
            .fetch_optional(&self.pool)
            .await?;
        let hit_id = hit_id.ok_or_else(|| Error::NotFound(format!("segment {}", result.segment_id)))?;

        let created_at = now();
        let duration_ms = result.duration.map(|d| d.as_millis() as i64);
        let done = sqlx::query(
            r#"
            INSERT INTO results (segment_id, user_id, duration_ms, raw_result, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.segment_id)
        .bind(&result.user)
        .bind(duration_ms)
        .bind(&result.raw_result)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        Ok(ResultRecord {
            id: done.last_insert_rowid(),
            segment_id: result.segment_id,
            hit_id,
            user: result.user,
            duration: duration_ms.map(|ms| millis_to_duration(ms as u64)),
            raw_result: result.raw_result,
            created_at,
        })
    }

    async fn results_for_hit(&self, hit_id: &str) -> Result<Vec<ResultRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.segment_id, s.hit_id, r.user_id, r.duration_ms, r.raw_result, r.created_at
            FROM results r
            JOIN segments s ON s.id = r.segment_id
            WHERE s.hit_id = ?
            ORDER BY r.id
            "#,
        )
        .bind(hit_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(result_from_row).collect()
    }
}
