// Schema migrations
//
// Each script records its own row in `schema_version`; scripts newer than the
// recorded version are executed whole inside one transaction.

use enrich_core::error::{AppError, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

const MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "jobs table",
    include_str!("../migrations/001_initial_schema.sql"),
)];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current = current_version(pool).await?;
    debug!(current_version = current, "Checking schema");

    let mut applied = 0;
    for (version, name, sql) in MIGRATIONS.iter().filter(|(v, _, _)| *v > current) {
        info!(version = *version, name = *name, "Applying migration");
        let mut tx = pool.begin().await.map_err(migration_error)?;
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(migration_error)?;
        tx.commit().await.map_err(migration_error)?;
        applied += 1;
    }

    info!(applied = applied, "Schema up to date");
    Ok(())
}

/// Highest applied version, 0 on a fresh database
async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let tracked: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
    )
    .fetch_one(pool)
    .await
    .map_err(migration_error)?;
    if !tracked {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(migration_error)?;
    Ok(version.unwrap_or(0))
}

fn migration_error(err: sqlx::Error) -> AppError {
    AppError::Database(format!("migration failed: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        assert_eq!(current_version(&pool).await.unwrap(), 1);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[tokio::test]
    async fn test_stage_check_constraint() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();

        let result = sqlx::query(
            "INSERT INTO jobs (id, processing_stage, created_at, updated_at) VALUES ('x', 'bogus', 0, 0)",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
