//! # Row Locks
//!
//! SQLite has no `SELECT ... FOR UPDATE`. A no-op `UPDATE` on the target row
//! makes the transaction a writer, which takes the database write lock until
//! commit or rollback. Every other writer waits (busy timeout) behind it, so
//! the lock is strictly stronger than a row lock.
//!
//! ```text
//! Tx A: BEGIN ─► lock_row(products, 7) ─► fold ─► append ─► COMMIT
//!                     │ write lock held ─────────────────────┘
//! Tx B: BEGIN ─► lock_row(products, 7) ... waits ... ─► sees A's stock
//! ```
//!
//! `lock_row` must be the first statement of the transaction that touches
//! the data it protects: a read before it would pin an older WAL snapshot.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqliteConnection};
use tracing::trace;

use crate::error::{DbError, DbResult};
use crate::table::Table;

/// Locks an active row and returns it.
///
/// ## Returns
/// * `Ok(T)` - The row, as seen by the lock holder
/// * `Err(DbError::NotFound)` - Missing or soft-deleted
pub async fn lock_row<T>(conn: &mut SqliteConnection, table: Table, id: i64) -> DbResult<T>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    trace!(table = %table, id, "Locking row");

    let sql = format!(
        "UPDATE {} SET updated_at = updated_at WHERE id = ? AND deleted_at IS NULL",
        table.name()
    );
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(DbError::not_found(table.entity(), id));
    }

    let sql = format!("SELECT * FROM {} WHERE id = ?", table.name());
    let row = sqlx::query_as::<_, T>(&sql).bind(id).fetch_one(&mut *conn).await?;
    Ok(row)
}


/// Makes the transaction a writer before its first read.
///
/// For transactions that must look rows up (restore-on-conflict, batch
/// imports) before they know which row to lock. The statement matches no
/// rows but still takes the write lock.
pub async fn claim_write_lock(conn: &mut SqliteConnection) -> DbResult<()> {
    sqlx::query("UPDATE sync_log SET last_sync_timestamp = last_sync_timestamp WHERE 0")
        .execute(&mut *conn)
        .await?;
    Ok(())
}
