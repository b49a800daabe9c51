//! Typed access to the bridge's persisted key-value settings.
//!
//! Keys mirror the remote service's naming so a value can always be traced
//! back to the account it belongs to.

use rusqlite::{params, Connection};
use tracing::warn;

/// Site-level bearer token authorizing remote API calls.
pub const TOKEN: &str = "chatway_token";
/// Remote account identifier; paired with [`TOKEN`], all-or-nothing.
pub const USER_IDENTIFIER: &str = "chatway_user_identifier";
/// Visitor-verification signing secret fetched from the remote settings.
pub const SECRET_KEY: &str = "chatway_secret_key";
/// Locally generated proxy secret provisioned to the remote service.
pub const PROXY_SECRET: &str = "chatway_secret_token";
/// Cached unread-notifications count, JSON `{count, fetched_at}`.
pub const UNREAD_CACHE: &str = "chatway_unread_count";

/// Every key the bridge owns; cleared wholesale on logout or re-auth.
pub const BRIDGE_KEYS: &[&str] = &[TOKEN, USER_IDENTIFIER, SECRET_KEY, PROXY_SECRET, UNREAD_CACHE];

pub fn get_setting(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row(
        "SELECT value FROM settings WHERE key = ?1",
        params![key],
        |row| row.get::<_, String>(0),
    )
    .ok()
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) {
    let result = conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    );
    if let Err(e) = result {
        warn!(key, error = %e, "failed to write setting");
    }
}

pub fn delete_setting(conn: &Connection, key: &str) {
    if let Err(e) = conn.execute("DELETE FROM settings WHERE key = ?1", params![key]) {
        warn!(key, error = %e, "failed to delete setting");
    }
}
