//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS`, so applying
//! the schema on every startup is safe.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS npar_resource (
    address         TEXT PRIMARY KEY NOT NULL,
    hostname        TEXT,
    model           TEXT NOT NULL,
    vcpus           INTEGER NOT NULL CHECK(vcpus >= 0),
    vcpus_used      INTEGER NOT NULL CHECK(vcpus_used >= 0 AND vcpus_used <= vcpus),
    memory          INTEGER NOT NULL CHECK(memory >= 0),
    memory_used     INTEGER NOT NULL CHECK(memory_used >= 0 AND memory_used <= memory),
    disk            INTEGER NOT NULL CHECK(disk >= 0),
    disk_used       INTEGER NOT NULL CHECK(disk_used >= 0 AND disk_used <= disk),
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS placement_hint (
    workload_id     TEXT PRIMARY KEY NOT NULL,
    partition       TEXT NOT NULL,
    node_address    TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_placement_partition ON placement_hint(partition);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
