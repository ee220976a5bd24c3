// SQLite JobStore Implementation

use async_trait::async_trait;
use enrich_core::domain::{JobPatch, JobRecord, ProcessingStage};
use enrich_core::error::{AppError, Result};
use enrich_core::port::{JobStore, TimeProvider};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "2067" | "1555" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "275" => AppError::Database(format!(
                        "Check constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Insert a new record (seeding and tests; the pipeline never creates records)
    pub async fn insert(&self, record: &JobRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, external_ref, title, company, url,
                processing_stage, outdated, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.external_ref)
        .bind(&record.title)
        .bind(&record.company)
        .bind(&record.url)
        .bind(record.processing_stage.as_str())
        .bind(record.outdated)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn list(&self, page_size: u32, page: u32) -> Result<Vec<JobRecord>> {
        let offset = i64::from(page_size) * i64::from(page);

        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            ORDER BY created_at ASC, id ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_record).collect()
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_record).transpose()
    }

    async fn get_by_alternate_key(&self, key: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE external_ref = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_record).transpose()
    }

    async fn update(&self, id: &str, patch: &JobPatch) -> Result<Option<JobRecord>> {
        // Read-apply-write in one transaction so the stage rules are checked
        // against the row actually being written
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        let mut record = match row {
            Some(row) => row.into_record()?,
            None => return Ok(None),
        };

        if patch.is_empty() {
            return Ok(Some(record));
        }

        record.apply_patch(patch, self.time_provider.now_millis())?;

        sqlx::query(
            r#"
            UPDATE jobs
            SET title = ?, processing_stage = ?, outdated = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.title)
        .bind(record.processing_stage.as_str())
        .bind(record.outdated)
        .bind(record.updated_at)
        .bind(&record.id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        debug!(job_id = %record.id, stage = %record.processing_stage, outdated = record.outdated, "Job record updated");
        Ok(Some(record))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    external_ref: Option<String>,
    title: String,
    company: Option<String>,
    url: Option<String>,
    processing_stage: String,
    outdated: bool,
    created_at: i64,
    updated_at: i64,
}

impl JobRow {
    fn into_record(self) -> Result<JobRecord> {
        let processing_stage = ProcessingStage::from_str(&self.processing_stage)?;

        Ok(JobRecord {
            id: self.id,
            external_ref: self.external_ref,
            title: self.title,
            company: self.company,
            url: self.url,
            processing_stage,
            outdated: self.outdated,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
