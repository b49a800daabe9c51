//! Visitor verification flow.
//!
//! Opportunistically proves to the remote chat service that the site's
//! logged-in user owns the current chat contact, at most once per
//! (user, contact) pair. The host passes the session signals in and applies
//! the returned cookie directive; nothing here touches request state.

pub mod canonical;

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use crate::api::ApiClient;
use crate::store::{markers, settings, Store};

type HmacSha256 = Hmac<Sha256>;

/// TTL for the verified-marker cookie: one year.
pub const VERIFIED_COOKIE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Cookie carrying the chat contact id, scoped by the stored user identifier.
pub fn contact_id_cookie_name(user_identifier: &str) -> String {
    format!("ch_cw_contact_id_{user_identifier}")
}

/// Cookie carrying the per-session contact auth token.
pub fn contact_token_cookie_name(user_identifier: &str) -> String {
    format!("ch_cw_token_{user_identifier}")
}

/// Cookie marking this session as already verified.
pub fn verified_cookie_name(user_identifier: &str) -> String {
    format!("ch_cw_user_status_{user_identifier}")
}

/// Session signals the host read from its cookie/query layer.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    pub contact_id_cookie: Option<String>,
    pub contact_id_param: Option<String>,
    pub contact_token: Option<String>,
    pub verified_cookie_present: bool,
}

impl SessionContext {
    /// The contact id for this session; the cookie takes precedence over the
    /// query parameter.
    pub fn contact_id(&self) -> Option<&str> {
        self.contact_id_cookie
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.contact_id_param.as_deref().filter(|s| !s.is_empty()))
    }
}

/// The logged-in user as known to the hosting site.
#[derive(Debug, Clone, Default)]
pub struct VisitorProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Payload signed and sent to the remote service.
#[derive(Debug, Clone, Serialize)]
pub struct VisitorInfo {
    pub email: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// What the host should do after the flow ran.
#[derive(Debug, Default)]
pub struct VerificationOutcome {
    /// Raw remote response, present when a verification call was made.
    pub response: Option<Value>,
    /// Set the 1-year verified cookie for this session.
    pub set_verified_cookie: bool,
}

/// HMAC-SHA256 (lowercase hex) over the canonical JSON form of the visitor
/// info, keyed with the shared secret.
pub fn visitor_hmac(secret_key: &str, visitor: &VisitorInfo) -> String {
    let value = serde_json::to_value(visitor).expect("visitor info serializes to JSON");
    let payload = canonical::canonical_stringify(&value);

    let mut mac =
        HmacSha256::new_from_slice(secret_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Run the verification flow for one inbound request.
///
/// Preconditions short-circuit in order: a logged-in user, a stored user
/// identifier, a contact id, a contact token, and no verified cookie yet.
/// A previously recorded (user, contact) marker re-issues the cookie
/// directive without any network call; otherwise the visitor payload is
/// signed and sent, and success records the marker.
pub fn verify_visitor(
    store: &Store,
    client: &ApiClient,
    profile: &VisitorProfile,
    session: &SessionContext,
) -> VerificationOutcome {
    if profile.user_id.is_empty() {
        return VerificationOutcome::default();
    }

    let user_identifier = {
        let conn = store.conn();
        settings::get_setting(&conn, settings::USER_IDENTIFIER).unwrap_or_default()
    };
    if user_identifier.is_empty() {
        return VerificationOutcome::default();
    }

    let Some(contact_id) = session.contact_id().map(str::to_owned) else {
        return VerificationOutcome::default();
    };
    let Some(contact_token) = session
        .contact_token
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
    else {
        return VerificationOutcome::default();
    };
    if session.verified_cookie_present {
        return VerificationOutcome::default();
    }

    let already_verified = {
        let conn = store.conn();
        markers::is_verified(&conn, &profile.user_id, &contact_id)
    };
    if already_verified {
        debug!(user_id = %profile.user_id, contact_id = %contact_id, "marker present, skipping remote call");
        return VerificationOutcome {
            response: None,
            set_verified_cookie: true,
        };
    }

    let Some(email) = profile
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    else {
        return VerificationOutcome::default();
    };

    let Some(secret_key) = client.fetch_secret_key() else {
        return VerificationOutcome::default();
    };

    let info = VisitorInfo {
        email: email.to_string(),
        id: profile.user_id.clone(),
        name: full_name(profile),
        avatar: profile
            .avatar_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
    };

    let hmac = visitor_hmac(&secret_key, &info);
    let data = serde_json::to_value(&info).expect("visitor info serializes to JSON");
    let response = client.send_visitor_verification(&hmac, &contact_id, &data, &contact_token);

    let verified = response
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        == Some("Success");

    if verified {
        let conn = store.conn();
        markers::mark_verified(&conn, &profile.user_id, &contact_id);
    }

    VerificationOutcome {
        response,
        set_verified_cookie: verified,
    }
}

fn full_name(profile: &VisitorProfile) -> Option<String> {
    let first = profile.first_name.as_deref().unwrap_or("");
    let last = profile.last_name.as_deref().unwrap_or("");
    let full = format!("{first} {last}");
    let full = full.trim();
    if full.is_empty() {
        None
    } else {
        Some(full.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::api::transport::stub::StubTransport;
    use crate::credentials;

    fn test_setup(stub: Arc<StubTransport>) -> (Arc<Store>, ApiClient) {
        let store = Arc::new(Store::new_in_memory().unwrap());
        let client = ApiClient::with_transport(
            stub,
            "https://chatway.test/api",
            "https://example.org",
            store.clone(),
        );
        (store, client)
    }

    fn connected_store_with_secret(store: &Store) {
        assert!(credentials::save(store, "ident-1", "tok-1"));
        let conn = store.conn();
        settings::set_setting(&conn, settings::SECRET_KEY, "k");
    }

    fn session() -> SessionContext {
        SessionContext {
            contact_id_cookie: Some("c-9".into()),
            contact_id_param: None,
            contact_token: Some("contact-tok".into()),
            verified_cookie_present: false,
        }
    }

    fn profile() -> VisitorProfile {
        VisitorProfile {
            user_id: "5".into(),
            email: Some("a@b.com".into()),
            first_name: None,
            last_name: None,
            avatar_url: None,
        }
    }

    #[test]
    fn hmac_matches_reference_vector() {
        // Canonical form: {"email":"a@b.com","id":"5"}
        let info = VisitorInfo {
            email: "a@b.com".into(),
            id: "5".into(),
            name: None,
            avatar: None,
        };
        assert_eq!(
            visitor_hmac("k", &info),
            "90c6b41cb19c9b0133d520969ec49fbfa94e17d5fe2970a12bd52667fb72a22c"
        );
    }

    #[test]
    fn hmac_covers_optional_fields_in_sorted_order() {
        // Canonical form sorts avatar before email:
        // {"avatar":"https://example.com/a.png","email":"a@b.com","id":"5","name":"Ann Lee"}
        let info = VisitorInfo {
            email: "a@b.com".into(),
            id: "5".into(),
            name: Some("Ann Lee".into()),
            avatar: Some("https://example.com/a.png".into()),
        };
        assert_eq!(
            visitor_hmac("secret", &info),
            "8e1a820ddc40282e3811c9790acd0f4603963a545d4e86e1a10c0a611c802e9d"
        );
    }

    #[test]
    fn contact_id_cookie_takes_precedence() {
        let ctx = SessionContext {
            contact_id_cookie: Some("from-cookie".into()),
            contact_id_param: Some("from-param".into()),
            ..Default::default()
        };
        assert_eq!(ctx.contact_id(), Some("from-cookie"));

        let ctx = SessionContext {
            contact_id_cookie: Some(String::new()),
            contact_id_param: Some("from-param".into()),
            ..Default::default()
        };
        assert_eq!(ctx.contact_id(), Some("from-param"));
    }

    #[test]
    fn cookie_names_are_scoped_by_identifier() {
        assert_eq!(contact_id_cookie_name("id1"), "ch_cw_contact_id_id1");
        assert_eq!(contact_token_cookie_name("id1"), "ch_cw_token_id1");
        assert_eq!(verified_cookie_name("id1"), "ch_cw_user_status_id1");
    }

    #[test]
    fn successful_verification_sets_marker_and_cookie() {
        let stub = StubTransport::new();
        let (store, client) = test_setup(stub.clone());
        connected_store_with_secret(&store);

        stub.push_status(200, r#"{"message":"Success"}"#);
        let outcome = verify_visitor(&store, &client, &profile(), &session());

        assert!(outcome.set_verified_cookie);
        assert_eq!(
            outcome.response.unwrap()["message"].as_str(),
            Some("Success")
        );
        assert_eq!(stub.request_count(), 1);

        let requests = stub.requests();
        assert_eq!(
            requests[0].url,
            "https://chatway.test/api/chat-contacts/c-9/mark-as-verified"
        );
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(
            body["visitor"]["hmac"].as_str(),
            Some("90c6b41cb19c9b0133d520969ec49fbfa94e17d5fe2970a12bd52667fb72a22c")
        );
        assert_eq!(body["visitor"]["data"]["email"].as_str(), Some("a@b.com"));

        let conn = store.conn();
        assert!(markers::is_verified(&conn, "5", "c-9"));
    }

    #[test]
    fn second_invocation_short_circuits_on_marker() {
        let stub = StubTransport::new();
        let (store, client) = test_setup(stub.clone());
        connected_store_with_secret(&store);

        stub.push_status(200, r#"{"message":"Success"}"#);
        assert!(verify_visitor(&store, &client, &profile(), &session()).set_verified_cookie);
        assert_eq!(stub.request_count(), 1);

        // Same user/contact again (e.g. cookie was lost): marker answers.
        let outcome = verify_visitor(&store, &client, &profile(), &session());
        assert!(outcome.set_verified_cookie);
        assert_eq!(outcome.response, None);
        assert_eq!(stub.request_count(), 1);
    }

    #[test]
    fn verified_cookie_short_circuits_before_everything() {
        let stub = StubTransport::new();
        let (store, client) = test_setup(stub.clone());
        connected_store_with_secret(&store);

        let mut ctx = session();
        ctx.verified_cookie_present = true;
        let outcome = verify_visitor(&store, &client, &profile(), &ctx);

        assert!(!outcome.set_verified_cookie);
        assert_eq!(outcome.response, None);
        assert_eq!(stub.request_count(), 0);
    }

    #[test]
    fn missing_preconditions_abort_without_network() {
        let stub = StubTransport::new();
        let (store, client) = test_setup(stub.clone());
        connected_store_with_secret(&store);

        // No logged-in user
        let mut p = profile();
        p.user_id = String::new();
        assert!(!verify_visitor(&store, &client, &p, &session()).set_verified_cookie);

        // No contact token
        let mut ctx = session();
        ctx.contact_token = None;
        assert!(!verify_visitor(&store, &client, &profile(), &ctx).set_verified_cookie);

        // No contact id at all
        let ctx = SessionContext {
            contact_token: Some("contact-tok".into()),
            ..Default::default()
        };
        assert!(!verify_visitor(&store, &client, &profile(), &ctx).set_verified_cookie);

        // No email
        let mut p = profile();
        p.email = None;
        assert!(!verify_visitor(&store, &client, &p, &session()).set_verified_cookie);

        assert_eq!(stub.request_count(), 0);
    }

    #[test]
    fn missing_user_identifier_aborts() {
        let stub = StubTransport::new();
        let (store, client) = test_setup(stub.clone());
        // Store left empty: no identifier, no credentials.

        let outcome = verify_visitor(&store, &client, &profile(), &session());
        assert!(!outcome.set_verified_cookie);
        assert_eq!(stub.request_count(), 0);
    }

    #[test]
    fn missing_secret_key_aborts_after_failed_fetch() {
        let stub = StubTransport::new();
        let (store, client) = test_setup(stub.clone());
        assert!(credentials::save(&store, "ident-1", "tok-1"));

        // fetch_secret_key hits the settings endpoint and fails.
        stub.push_status(500, "");
        let outcome = verify_visitor(&store, &client, &profile(), &session());

        assert!(!outcome.set_verified_cookie);
        assert_eq!(outcome.response, None);
        assert_eq!(stub.request_count(), 1);
        let conn = store.conn();
        assert!(!markers::is_verified(&conn, "5", "c-9"));
    }

    #[test]
    fn unsuccessful_remote_answer_returns_response_without_marker() {
        let stub = StubTransport::new();
        let (store, client) = test_setup(stub.clone());
        connected_store_with_secret(&store);

        stub.push_status(200, r#"{"message":"Contact not found"}"#);
        let outcome = verify_visitor(&store, &client, &profile(), &session());

        assert!(!outcome.set_verified_cookie);
        assert_eq!(
            outcome.response.unwrap()["message"].as_str(),
            Some("Contact not found")
        );
        let conn = store.conn();
        assert!(!markers::is_verified(&conn, "5", "c-9"));
    }

    #[test]
    fn name_is_joined_and_trimmed() {
        let p = VisitorProfile {
            first_name: Some("Ann".into()),
            last_name: None,
            ..profile()
        };
        assert_eq!(full_name(&p).as_deref(), Some("Ann"));

        let p = VisitorProfile {
            first_name: Some("Ann".into()),
            last_name: Some("Lee".into()),
            ..profile()
        };
        assert_eq!(full_name(&p).as_deref(), Some("Ann Lee"));

        assert_eq!(full_name(&profile()), None);
    }
}
