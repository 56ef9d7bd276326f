//! Connection pooling across the four supported engines (ambient, spec.md §5).
//!
//! `sqlx` provides pooling for sqlite/postgres/mysql natively. `tiberius` has
//! no built-in pool, so the `mssql` feature wraps a small fixed-size pool of
//! clients behind a semaphore — the same "borrow for the duration of the
//! request, return on completion or failure" contract spec.md §5 requires.

#[cfg(feature = "mssql")]
mod mssql_pool;

#[cfg(feature = "mssql")]
pub use mssql_pool::{MssqlClient, MssqlPool};

use std::time::Duration;

use backoff::future::retry;
use backoff::ExponentialBackoff;

use crate::dialect::Engine;
use crate::error::EngineError;

/// A borrowed connection, tagged by engine so the executor can dispatch on it.
#[derive(Clone)]
pub enum Pool {
    Sqlite(sqlx::SqlitePool),
    Postgres(sqlx::PgPool),
    MySql(sqlx::MySqlPool),
    #[cfg(feature = "mssql")]
    Mssql(MssqlPool),
}

impl Pool {
    pub fn engine(&self) -> Engine {
        match self {
            Pool::Sqlite(_) => Engine::Sqlite,
            Pool::Postgres(_) => Engine::Postgres,
            Pool::MySql(_) => Engine::MySql,
            #[cfg(feature = "mssql")]
            Pool::Mssql(_) => Engine::Mssql,
        }
    }
}

/// Connect with retry/backoff so a slow-to-start database doesn't fail the
/// first request; mirrors the teacher's pool-construction-on-boot pattern.
pub async fn connect(connection_string: &str, engine: Engine) -> Result<Pool, EngineError> {
    let backoff = ExponentialBackoff {
        max_elapsed_time: Some(Duration::from_secs(30)),
        ..Default::default()
    };

    retry(backoff, || async {
        connect_once(connection_string, engine)
            .await
            .map_err(|e| backoff::Error::transient(e))
    })
    .await
    .map_err(|e| EngineError::ConnectionFailed(e.into()))
}

async fn connect_once(connection_string: &str, engine: Engine) -> Result<Pool, anyhow::Error> {
    Ok(match engine {
        Engine::Sqlite => Pool::Sqlite(
            sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(10)
                .connect(connection_string)
                .await?,
        ),
        Engine::Postgres => Pool::Postgres(
            sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(connection_string)
                .await?,
        ),
        Engine::MySql => Pool::MySql(
            sqlx::mysql::MySqlPoolOptions::new()
                .max_connections(10)
                .connect(connection_string)
                .await?,
        ),
        #[cfg(feature = "mssql")]
        Engine::Mssql => Pool::Mssql(MssqlPool::connect(connection_string, 10).await?),
        #[cfg(not(feature = "mssql"))]
        Engine::Mssql => anyhow::bail!("mssql support requires building with --features mssql"),
    })
}
