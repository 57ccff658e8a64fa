//! Recover an auto-increment id without `LAST_INSERT_ID()`.
//!
//! The row is first inserted with a unique guard string, the connection is
//! dropped and reopened, and the id is found again by searching for the guard.
//! Only then is the guard replaced by the real value.
use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::Connection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::schema::{connect_with_table, VALUE_MAX_LEN};
use crate::util::db::{ConnectSettings, Db};

const GUARD_TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// What the round trip observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    /// `LAST_INSERT_ID()` on the reconnected session; usually 0.
    pub bad_last_insert_id: u64,
    /// `LAST_INSERT_ID()` on the inserting session.
    pub last_insert_id: u64,
    /// Id found by searching for the guard.
    pub manual_last_insert_id: u64,
    pub value_added: String,
}

impl InsertReport {
    pub fn agrees(&self) -> bool {
        self.manual_last_insert_id == self.last_insert_id
    }
}

/// `<server timestamp>#<uuid>`; at most 59 characters.
pub fn make_guard(server_now: NaiveDateTime) -> String {
    format!(
        "{}#{}",
        server_now.format(GUARD_TS_FORMAT),
        Uuid::new_v4().simple()
    )
}

pub fn check_value(value: &str) -> Result<()> {
    let len = value.chars().count();
    if len > VALUE_MAX_LEN {
        bail!("value is {len} characters; forty2_col holds at most {VALUE_MAX_LEN}");
    }
    Ok(())
}

/// Insert `value`, reconnect, and recover the row id by its guard.
///
/// Consumes the inserting connection and hands back the reconnected one.
#[instrument(skip(db, settings, value), fields(database = %settings.database))]
pub async fn last_insert_id(
    mut db: Db,
    settings: &ConnectSettings,
    value: &str,
) -> Result<(InsertReport, Db)> {
    check_value(value)?;

    let server_now: NaiveDateTime = sqlx::query_scalar("SELECT NOW(6)")
        .fetch_one(&mut db.conn)
        .await
        .context("reading server time")?;
    let guard = make_guard(server_now);

    let mut tx = db.conn.begin().await?;
    sqlx::query("INSERT INTO forty2 (forty2_col) VALUES (?)")
        .bind(&guard)
        .execute(&mut *tx)
        .await
        .context("inserting guard row")?;
    tx.commit().await?;

    let last_insert_id = select_last_insert_id(&mut db).await?;
    info!(last_insert_id, "inserted guard row");

    db.close().await;
    let mut db = connect_with_table(settings)
        .await
        .context("reconnecting after insert")?;

    let bad_last_insert_id = select_last_insert_id(&mut db).await?;

    let found: Option<u64> =
        sqlx::query_scalar("SELECT CAST(row_id AS UNSIGNED) FROM forty2 WHERE forty2_col = ?")
            .bind(&guard)
            .fetch_optional(&mut db.conn)
            .await
            .context("searching for guard row")?;
    let Some(manual_last_insert_id) = found else {
        bail!("no row in forty2 carries guard '{guard}'");
    };

    let mut tx = db.conn.begin().await?;
    let updated = sqlx::query("UPDATE forty2 SET forty2_col = ? WHERE row_id = ?")
        .bind(value)
        .bind(manual_last_insert_id)
        .execute(&mut *tx)
        .await
        .context("replacing guard with value")?
        .rows_affected();
    if updated == 0 {
        bail!("row {manual_last_insert_id} vanished before its guard was replaced");
    }
    tx.commit().await?;

    let report = InsertReport {
        bad_last_insert_id,
        last_insert_id,
        manual_last_insert_id,
        value_added: value.to_string(),
    };
    if !report.agrees() {
        warn!(
            last_insert_id,
            manual_last_insert_id, "guard lookup disagrees with LAST_INSERT_ID()"
        );
    }
    Ok((report, db))
}

async fn select_last_insert_id(db: &mut Db) -> Result<u64> {
    sqlx::query_scalar("SELECT CAST(LAST_INSERT_ID() AS UNSIGNED)")
        .fetch_one(&mut db.conn)
        .await
        .context("SELECT LAST_INSERT_ID()")
}
