//! Database schema migrations for SQLite.
//!
//! Versioned migrations: each one transforms the schema from version N to
//! N+1 and is recorded in `schema_migrations`.

use rusqlite::Connection;
use souma_core::Timestamp;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent: safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, Timestamp::now().as_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {version}"
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE persona (
            id TEXT PRIMARY KEY,              -- 32 lowercase hex chars
            username TEXT,
            email TEXT,
            sign_private BLOB NOT NULL,       -- empty for foreign personas
            sign_public BLOB NOT NULL,
            crypt_private BLOB NOT NULL,      -- empty for foreign personas
            crypt_public BLOB NOT NULL,
            modified INTEGER NOT NULL,        -- Unix ms
            profile_id TEXT,
            index_id TEXT,
            myelin_offset INTEGER             -- created time of last vesicle received
        );

        -- Directed contact edges, ordered per owner
        CREATE TABLE contacts (
            left_id TEXT NOT NULL,
            right_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (left_id, right_id)
        );

        CREATE TABLE souma (
            id TEXT PRIMARY KEY,
            sign_private BLOB NOT NULL,
            sign_public BLOB NOT NULL,
            crypt_private BLOB NOT NULL,
            crypt_public BLOB NOT NULL,
            starmap_id TEXT
        );

        CREATE TABLE star (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            created INTEGER NOT NULL,
            modified INTEGER NOT NULL,
            state INTEGER NOT NULL DEFAULT 0,
            creator_id TEXT NOT NULL          -- may reference an unknown persona
        );

        -- Star -> planet attachments
        CREATE TABLE satellites (
            star_id TEXT NOT NULL,
            planet_id TEXT NOT NULL,
            PRIMARY KEY (star_id, planet_id)
        );

        CREATE TABLE planet (
            id TEXT PRIMARY KEY,
            title TEXT,
            kind TEXT NOT NULL,               -- 'picture' | 'link'
            payload TEXT NOT NULL,            -- filename or url, by kind
            created INTEGER NOT NULL,
            modified INTEGER NOT NULL,
            state INTEGER NOT NULL DEFAULT 0,
            source TEXT
        );

        CREATE TABLE oneup (
            id TEXT PRIMARY KEY,
            created INTEGER NOT NULL,
            modified INTEGER NOT NULL,
            state INTEGER NOT NULL DEFAULT 0, -- -1 disabled, 0 active
            creator_id TEXT NOT NULL,
            star_id TEXT NOT NULL,

            UNIQUE(creator_id, star_id)
        );

        CREATE TABLE starmap (
            id TEXT PRIMARY KEY,
            modified INTEGER NOT NULL,
            author_id TEXT
        );

        CREATE TABLE starmap_index (
            starmap_id TEXT NOT NULL,
            star_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (starmap_id, star_id)
        );

        CREATE TABLE vesicle (
            id TEXT PRIMARY KEY,
            created INTEGER NOT NULL,
            author_id TEXT NOT NULL,
            source_id TEXT,
            payload TEXT NOT NULL,            -- exported JSON
            signature BLOB NOT NULL           -- 64 bytes, Ed25519
        );

        CREATE INDEX idx_star_creator ON star(creator_id, created);
        CREATE INDEX idx_satellites_planet ON satellites(planet_id);
        CREATE INDEX idx_oneup_star_state ON oneup(star_id, state);
        CREATE INDEX idx_starmap_index_star ON starmap_index(star_id);
        CREATE INDEX idx_vesicle_author ON vesicle(author_id, created);
        "#,
    )?;

    Ok(())
}
