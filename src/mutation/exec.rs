//! Runs a compiled [`super::MutationStatement`] sequence inside one explicit
//! transaction (spec.md §4.9, §5: "mutations are the one place this engine
//! opens a transaction itself; reads rely on the database's own snapshot
//! isolation instead").

use crate::db::Pool;
use crate::dialect::Dialect;
use crate::error::EngineError;
use crate::query_tree::FilterValue;

use crate::executor::bind::{bind_mysql, bind_postgres, bind_sqlite};

use super::MutationStatement;

/// Runs every statement in `statements` against `pool` inside one
/// transaction, rolling back on the first failure. Returns the
/// last-inserted-identity value for the final statement, when the engine
/// can report one (insert/upsert); `None` for update/delete.
pub async fn run_mutation(pool: &Pool, statements: &[MutationStatement], dialect: &dyn Dialect) -> Result<Option<FilterValue>, EngineError> {
    match pool {
        Pool::Sqlite(p) => run_sqlx_sqlite(p, statements, dialect).await,
        Pool::Postgres(p) => run_sqlx_postgres(p, statements, dialect).await,
        Pool::MySql(p) => run_sqlx_mysql(p, statements, dialect).await,
        #[cfg(feature = "mssql")]
        Pool::Mssql(p) => run_mssql(p, statements, dialect).await,
    }
}

fn exec_failed(sql: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::ExecutionFailed {
        statement: sql.to_string(),
        param_names: Vec::new(),
        source: anyhow::anyhow!(e.to_string()),
    }
}

async fn run_sqlx_sqlite(pool: &sqlx::SqlitePool, statements: &[MutationStatement], dialect: &dyn Dialect) -> Result<Option<FilterValue>, EngineError> {
    let mut tx = pool.begin().await.map_err(|e| exec_failed("BEGIN", e))?;
    for stmt in statements {
        let mut q = sqlx::query(&stmt.sql);
        for v in &stmt.params {
            q = bind_sqlite(q, v);
        }
        q.execute(&mut *tx).await.map_err(|e| exec_failed(&stmt.sql, e))?;
    }
    let last_id: Option<(i64,)> = sqlx::query_as(&format!("SELECT {}", dialect.last_inserted_identity()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| exec_failed("last_insert_rowid", e))?;
    tx.commit().await.map_err(|e| exec_failed("COMMIT", e))?;
    Ok(last_id.map(|(id,)| FilterValue::Int(id)))
}

async fn run_sqlx_postgres(pool: &sqlx::PgPool, statements: &[MutationStatement], _dialect: &dyn Dialect) -> Result<Option<FilterValue>, EngineError> {
    let mut tx = pool.begin().await.map_err(|e| exec_failed("BEGIN", e))?;
    let mut last_id = None;
    for stmt in statements {
        let mut q = sqlx::query(&stmt.sql);
        for v in &stmt.params {
            q = bind_postgres(q, v);
        }
        let result = q.execute(&mut *tx).await.map_err(|e| exec_failed(&stmt.sql, e))?;
        last_id = Some(result.rows_affected());
    }
    tx.commit().await.map_err(|e| exec_failed("COMMIT", e))?;
    // PostgreSQL has no session-global "last identity" like MSSQL/SQLite;
    // callers that need the new row's key should include a `RETURNING`
    // clause upstream. We surface rows_affected as a best-effort signal.
    Ok(last_id.map(|n| FilterValue::Int(n as i64)))
}

async fn run_sqlx_mysql(pool: &sqlx::MySqlPool, statements: &[MutationStatement], dialect: &dyn Dialect) -> Result<Option<FilterValue>, EngineError> {
    let mut tx = pool.begin().await.map_err(|e| exec_failed("BEGIN", e))?;
    for stmt in statements {
        let mut q = sqlx::query(&stmt.sql);
        for v in &stmt.params {
            q = bind_mysql(q, v);
        }
        q.execute(&mut *tx).await.map_err(|e| exec_failed(&stmt.sql, e))?;
    }
    let last_id: Option<(i64,)> = sqlx::query_as(&format!("SELECT {}", dialect.last_inserted_identity()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| exec_failed("LAST_INSERT_ID", e))?;
    tx.commit().await.map_err(|e| exec_failed("COMMIT", e))?;
    Ok(last_id.map(|(id,)| FilterValue::Int(id)))
}

#[cfg(feature = "mssql")]
async fn run_mssql(pool: &crate::db::MssqlPool, statements: &[MutationStatement], dialect: &dyn Dialect) -> Result<Option<FilterValue>, EngineError> {
    use crate::executor::bind::bind_mssql;

    let mut client = pool.acquire().await.map_err(|e| exec_failed("acquire", e))?;
    client.simple_query("BEGIN TRANSACTION").await.map_err(|e| exec_failed("BEGIN TRANSACTION", e))?;

    for stmt in statements {
        let mut q = tiberius::Query::new(stmt.sql.clone());
        for v in &stmt.params {
            bind_mssql(&mut q, v);
        }
        if let Err(e) = q.execute(&mut *client).await {
            let _ = client.simple_query("ROLLBACK TRANSACTION").await;
            return Err(exec_failed(&stmt.sql, e));
        }
    }

    let row = client
        .simple_query(format!("SELECT {}", dialect.last_inserted_identity()))
        .await
        .map_err(|e| exec_failed("SCOPE_IDENTITY", e))?
        .into_row()
        .await
        .map_err(|e| exec_failed("SCOPE_IDENTITY", e))?;

    client.simple_query("COMMIT TRANSACTION").await.map_err(|e| exec_failed("COMMIT TRANSACTION", e))?;

    Ok(row.and_then(|r| r.get::<i64, _>(0)).map(FilterValue::Int))
}
