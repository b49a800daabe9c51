//! Credential lifecycle: the remote dashboard hands the host a
//! `(user_identifier, token)` pair on connect, and logout clears every value
//! the bridge owns.

use tracing::debug;

use crate::store::{settings, Store};

/// Store a fresh credential pair, replacing everything from any previous
/// account. All-or-nothing: if either value is empty nothing is stored and
/// the store is left cleared.
pub fn save(store: &Store, user_identifier: &str, token: &str) -> bool {
    clear(store);

    if user_identifier.is_empty() || token.is_empty() {
        debug!("rejected credential save with empty identifier or token");
        return false;
    }

    let conn = store.conn();
    settings::set_setting(&conn, settings::USER_IDENTIFIER, user_identifier);
    settings::set_setting(&conn, settings::TOKEN, token);
    true
}

/// Remove every bridge-owned key (logout semantics). Secrets and cached
/// counts go with the credentials; a new account must not inherit them.
pub fn clear(store: &Store) {
    let conn = store.conn();
    for key in settings::BRIDGE_KEYS {
        settings::delete_setting(&conn, key);
    }
}

/// Both the token and the user identifier are present and non-empty.
pub fn has_credentials(store: &Store) -> bool {
    let conn = store.conn();
    let token = settings::get_setting(&conn, settings::TOKEN).unwrap_or_default();
    let identifier = settings::get_setting(&conn, settings::USER_IDENTIFIER).unwrap_or_default();
    !token.is_empty() && !identifier.is_empty()
}
