//! Schema bootstrap: make sure `<database>.forty2` exists before inserting.
//!
//! A missing database is the one failure handled here. It is created over a
//! server-only connection and the bootstrap is retried exactly once.
use anyhow::{Context, Result};
use sqlx::mysql::MySqlDatabaseError;
use sqlx::Executor;
use std::future::Future;
use tracing::{info, warn};

use crate::util::db::{quote_ident, validate_database_name, ConnectSettings, Db, Target};

pub const TABLE: &str = "forty2";

/// Maximum length of `forty2_col`.
pub const VALUE_MAX_LEN: usize = 64;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS forty2 \
     ( row_id      INTEGER      PRIMARY KEY AUTO_INCREMENT \
     , forty2_col  VARCHAR(64)  DEFAULT NULL \
     )";

/// MySQL ER_BAD_DB_ERROR: "Unknown database '%s'".
pub const ER_BAD_DB_ERROR: u16 = 1049;

/// A ready connection plus whether the database had to be created for it.
pub struct Bootstrap {
    pub db: Db,
    pub created_database: bool,
}

impl Bootstrap {
    pub fn message(&self, settings: &ConnectSettings) -> Option<String> {
        self.created_database
            .then(|| format!("Created database {}", settings.database))
    }
}

/// Connect to the configured database and ensure the table exists, creating
/// the database first if the server reports it unknown.
pub async fn ensure_schema(settings: &ConnectSettings) -> Result<Bootstrap> {
    let (db, created_database) = bootstrap_with(
        || connect_with_table(settings),
        || create_database(settings),
        is_unknown_database,
    )
    .await?;
    Ok(Bootstrap {
        db,
        created_database,
    })
}

/// The retry rule: one `connect`; if it fails and `missing` says the database
/// is absent, one `create` and one final `connect`. Returns whether `create` ran.
async fn bootstrap_with<T, C, CFut, M, MFut, P>(
    mut connect: C,
    mut create: M,
    missing: P,
) -> Result<(T, bool)>
where
    C: FnMut() -> CFut,
    CFut: Future<Output = Result<T>>,
    M: FnMut() -> MFut,
    MFut: Future<Output = Result<()>>,
    P: Fn(&anyhow::Error) -> bool,
{
    match connect().await {
        Ok(conn) => Ok((conn, false)),
        Err(err) if missing(&err) => {
            create().await?;
            // Second pass: any failure now is final.
            let conn = connect()
                .await
                .context("bootstrap retry after creating database failed")?;
            Ok((conn, true))
        }
        Err(err) => Err(err),
    }
}

/// Open a connection on the target database and run the table DDL on it.
pub async fn connect_with_table(settings: &ConnectSettings) -> Result<Db> {
    let mut db = Db::connect(settings, Target::Database).await?;
    db.conn
        .execute(CREATE_TABLE_SQL)
        .await
        .with_context(|| format!("creating table {}.{TABLE}", settings.database))?;
    Ok(db)
}

async fn create_database(settings: &ConnectSettings) -> Result<()> {
    validate_database_name(&settings.database)?;
    warn!(database = %settings.database, "database missing; creating it");
    let mut server = Db::connect(settings, Target::Server).await?;
    let sql = format!("CREATE DATABASE {}", quote_ident(&settings.database));
    server
        .conn
        .execute(sql.as_str())
        .await
        .with_context(|| format!("creating database {}", settings.database))?;
    info!(database = %settings.database, "created database");
    server.close().await;
    Ok(())
}

/// True when any `sqlx::Error` in the chain is MySQL error 1049.
pub fn is_unknown_database(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .any(|e| match e {
            sqlx::Error::Database(db_err) => db_err
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(|m| m.number())
                .is_some_and(is_unknown_database_number),
            _ => false,
        })
}

pub fn is_unknown_database_number(number: u16) -> bool {
    number == ER_BAD_DB_ERROR
}
