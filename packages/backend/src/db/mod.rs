use std::str::FromStr;
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use thiserror::Error;

const SCHEMA: &str = include_str!("../../sql/schema.sql");
const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum DbInitError {
    #[error("DATABASE_URL is not set")]
    MissingUrl,
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct PingStatus {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Open the pool and bring the schema up to date.
pub async fn connect(url: &str, max_connections: u32) -> Result<SqlitePool, DbInitError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DbInitError::MissingUrl);
    }

    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    // Each connection to an in-memory database is a separate database.
    let in_memory = url.contains(":memory:") || url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections.max(1))
    };

    let pool = pool_options
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await?;

    apply_schema(&pool).await?;
    tracing::info!(in_memory, "database ready");
    Ok(pool)
}

pub async fn apply_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = split_sql_statements(SCHEMA);
    for stmt in &statements {
        sqlx::query(stmt).execute(pool).await?;
    }
    tracing::debug!(statements = statements.len(), "schema applied");
    Ok(())
}

pub async fn ping(pool: &SqlitePool) -> PingStatus {
    let started = Instant::now();
    match tokio::time::timeout(PING_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => PingStatus {
            healthy: true,
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        },
        Ok(Err(err)) => PingStatus {
            healthy: false,
            latency_ms: None,
            error: Some(err.to_string()),
        },
        Err(_) => PingStatus {
            healthy: false,
            latency_ms: None,
            error: Some("timeout".to_string()),
        },
    }
}

/// Split a script on `;`, ignoring quoted semicolons and `--` comment lines.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;

    for line in sql.lines() {
        if !in_single_quote && line.trim_start().starts_with("--") {
            continue;
        }
        for ch in line.chars() {
            match ch {
                '\'' => in_single_quote = !in_single_quote,
                ';' if !in_single_quote => {
                    let stmt = current.trim();
                    if !stmt.is_empty() {
                        statements.push(stmt.to_string());
                    }
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }
        current.push('\n');
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_skips_comments_and_quoted_semicolons() {
        let sql = "-- header;\nCREATE TABLE a (x TEXT DEFAULT ';');\n\nCREATE TABLE b (y INTEGER);\n";
        let statements = split_sql_statements(sql);
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE a (x TEXT DEFAULT ';')".to_string(),
                "CREATE TABLE b (y INTEGER)".to_string(),
            ]
        );
    }

    #[test]
    fn test_schema_has_all_tables() {
        let statements = split_sql_statements(SCHEMA);
        for table in [
            "concepts",
            "concept_prerequisites",
            "concept_mastery",
            "learning_plans",
            "assessments",
            "assessment_questions",
            "assessment_responses",
            "learning_profiles",
        ] {
            let needle = format!("CREATE TABLE IF NOT EXISTS {table} (");
            assert!(statements.iter().any(|s| s.starts_with(&needle)), "missing {table}");
        }
    }

    #[tokio::test]
    async fn test_connect_in_memory_is_idempotent() {
        let pool = connect("sqlite::memory:", 4).await.unwrap();
        apply_schema(&pool).await.unwrap();
        assert!(ping(&pool).await.healthy);
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_url() {
        assert!(matches!(connect("  ", 1).await, Err(DbInitError::MissingUrl)));
    }
}
