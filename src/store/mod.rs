pub mod markers;
pub mod settings;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA_VERSION: i64 = 1;

const REQUIRED_TABLES: &[&str] = &["settings", "verification_markers"];

/// Persistent key-value store for the bridge's credential and config values,
/// plus the per-(user, contact) verification markers.
///
/// Last write wins; callers do not coordinate beyond the connection mutex.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn new(path: &str) -> Result<Self> {
        let db_path = Path::new(path);
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir).with_context(|| {
                format!("failed to create database directory {}", dir.display())
            })?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700));
            }
        }

        let conn =
            Connection::open(path).with_context(|| format!("failed to open database at {path}"))?;

        // Credentials live in this file; keep it owner-only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            for suffix in &["", "-wal", "-shm"] {
                let file_path = format!("{path}{suffix}");
                let _ =
                    std::fs::set_permissions(&file_path, std::fs::Permissions::from_mode(0o600));
            }
        }

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.configure_pragmas()?;
        store.initialize_schema()?;

        Ok(store)
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.configure_pragmas()?;
        store.initialize_schema()?;

        Ok(store)
    }

    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(
                "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
            )
            .context("failed to configure database pragmas")?;

        debug!("database pragmas configured");
        Ok(())
    }

    fn get_schema_version(&self) -> Result<i64> {
        let version: i64 = self
            .conn
            .lock()
            .unwrap()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .context("failed to read schema version")?;
        Ok(version)
    }

    fn set_schema_version(&self, version: i64) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .pragma_update(None, "user_version", version)
            .context("failed to set schema version")?;
        Ok(())
    }

    fn initialize_schema(&self) -> Result<()> {
        let current_version = self.get_schema_version()?;

        if current_version == 0 {
            self.create_tables()?;
            self.set_schema_version(SCHEMA_VERSION)?;
            info!("created database schema v{SCHEMA_VERSION}");
            return Ok(());
        }

        if current_version > SCHEMA_VERSION {
            anyhow::bail!(
                "database schema v{current_version} is newer than supported v{SCHEMA_VERSION}"
            );
        }

        self.assert_required_tables()?;

        Ok(())
    }

    fn assert_required_tables(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .context("failed to prepare table check query")?;

        let missing: Vec<&str> = REQUIRED_TABLES
            .iter()
            .filter(|&&table| !stmt.exists(rusqlite::params![table]).unwrap_or(false))
            .copied()
            .collect();

        if !missing.is_empty() {
            anyhow::bail!(
                "settings database is missing required tables ({})",
                missing.join(", ")
            );
        }

        Ok(())
    }

    fn create_tables(&self) -> Result<()> {
        self.conn
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS verification_markers (
                user_id TEXT NOT NULL,
                contact_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(user_id, contact_id)
            );
            CREATE INDEX IF NOT EXISTS idx_verification_markers_user
                ON verification_markers(user_id);",
            )
            .context("failed to create tables")?;

        Ok(())
    }
}
