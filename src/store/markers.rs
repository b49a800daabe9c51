//! Per-(user, contact) verification markers.
//!
//! A marker is written once a visitor has been verified with the remote
//! service and is never updated afterwards; its presence lets later requests
//! skip the network call entirely.

use rusqlite::{params, Connection};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

pub fn is_verified(conn: &Connection, user_id: &str, contact_id: &str) -> bool {
    let mut stmt = match conn
        .prepare("SELECT 1 FROM verification_markers WHERE user_id = ?1 AND contact_id = ?2")
    {
        Ok(stmt) => stmt,
        Err(e) => {
            warn!(error = %e, "failed to prepare marker lookup");
            return false;
        }
    };
    stmt.exists(params![user_id, contact_id]).unwrap_or(false)
}

pub fn mark_verified(conn: &Connection, user_id: &str, contact_id: &str) {
    let result = conn.execute(
        "INSERT OR IGNORE INTO verification_markers (user_id, contact_id, created_at)
         VALUES (?1, ?2, ?3)",
        params![user_id, contact_id, now_millis()],
    );
    if let Err(e) = result {
        warn!(user_id, contact_id, error = %e, "failed to record verification marker");
    }
}
