//! Schema migrations, applied on open.
//!
//! A migration's version is its position in `MIGRATIONS`, starting at 1, and
//! the applied version lives in `PRAGMA user_version`. New steps are appended;
//! existing files are never edited.

use super::{DbError, DbResult};
use rusqlite::Connection;
use std::cmp::Ordering;
use tracing::{debug, info};

const MIGRATIONS: &[(&str, &str)] = &[
    ("init", include_str!("0001_init.sql")),
    ("allowed_emails", include_str!("0002_allowed_emails.sql")),
    ("reasoning_settings", include_str!("0003_reasoning_settings.sql")),
    ("cached_image_path", include_str!("0004_cached_image_path.sql")),
];

pub fn schema_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Brings the schema up to [`schema_version`] in a single transaction.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let applied: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let target = schema_version();
    match applied.cmp(&target) {
        Ordering::Greater => {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version: applied,
                latest_supported: target,
            })
        }
        Ordering::Equal => return Ok(()),
        Ordering::Less => {}
    }

    let tx = conn.transaction()?;
    for (version, (name, sql)) in (1u32..).zip(MIGRATIONS).skip(applied as usize) {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        debug!(version, name, "Migration applied");
    }
    tx.commit()?;

    info!(from = applied, to = target, "Database schema upgraded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, schema_version};
    use crate::database::DbError;
    use rusqlite::Connection;

    fn user_version(conn: &Connection) -> u32 {
        conn.query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn upgrades_once_and_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        assert_eq!(user_version(&conn), schema_version());

        apply_migrations(&mut conn).unwrap();
        let columns: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('pages')")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(columns.iter().any(|name| name == "cached_image_path"));
    }

    #[test]
    fn refuses_a_schema_from_a_newer_build() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
        assert!(matches!(
            apply_migrations(&mut conn),
            Err(DbError::UnsupportedSchemaVersion { db_version: 99, .. })
        ));
    }
}
