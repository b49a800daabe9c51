//! Cached unread-notifications count.
//!
//! The remote count is cached for five minutes so menu rendering does not
//! hit the network on every admin page load. Visiting the chat dashboard
//! invalidates the cache so the badge drops immediately.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::ApiClient;
use crate::store::{settings, Store};

const CACHE_TTL_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, Serialize, Deserialize)]
struct CachedCount {
    count: i64,
    fetched_at: i64,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// The unread count, from cache when fetched less than five minutes ago,
/// otherwise refreshed via the remote API.
pub fn unread_count(store: &Store, client: &ApiClient) -> i64 {
    let now = now_millis();
    if let Some(count) = cached_count(store, now) {
        return count;
    }
    fetch_and_cache(store, client, now)
}

/// Drop the cache and fetch a fresh count (dashboard visit, explicit
/// refresh).
pub fn refresh(store: &Store, client: &ApiClient) -> i64 {
    invalidate(store);
    fetch_and_cache(store, client, now_millis())
}

/// Remove the cached entry; the next [`unread_count`] call re-fetches.
pub fn invalidate(store: &Store) {
    let conn = store.conn();
    settings::delete_setting(&conn, settings::UNREAD_CACHE);
}

fn cached_count(store: &Store, now: i64) -> Option<i64> {
    let raw = {
        let conn = store.conn();
        settings::get_setting(&conn, settings::UNREAD_CACHE)?
    };
    let entry: CachedCount = serde_json::from_str(&raw).ok()?;
    if now - entry.fetched_at >= CACHE_TTL_MS {
        debug!(age_ms = now - entry.fetched_at, "unread count cache expired");
        return None;
    }
    Some(entry.count)
}

fn fetch_and_cache(store: &Store, client: &ApiClient, now: i64) -> i64 {
    let count = client.unread_count();
    let entry = CachedCount {
        count,
        fetched_at: now,
    };
    if let Ok(json) = serde_json::to_string(&entry) {
        let conn = store.conn();
        settings::set_setting(&conn, settings::UNREAD_CACHE, &json);
    }
    count
}
