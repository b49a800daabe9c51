//! HTTP client for the remote Chatway API.
//!
//! Single point of contact with the remote service. Every call is one
//! synchronous request/response exchange; every network, status, or parsing
//! failure degrades to the operation's safe default (`Invalid`, `false`,
//! `None`, `0`) and is logged, never propagated.

pub mod transport;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Configuration;
use crate::store::{settings, Store};
use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

/// Result of the connectivity/token check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Valid,
    Invalid,
    ServerDown,
}

/// Lifecycle event reported to the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    Install,
    Uninstall,
}

impl PluginStatus {
    fn as_str(self) -> &'static str {
        match self {
            PluginStatus::Install => "install",
            PluginStatus::Uninstall => "uninstall",
        }
    }
}

pub struct ApiClient {
    transport: Arc<dyn Transport>,
    base_url: String,
    site_url: String,
    store: Arc<Store>,
}

impl ApiClient {
    pub fn new(config: &Configuration, store: Arc<Store>) -> anyhow::Result<Self> {
        Ok(Self::with_transport(
            Arc::new(ReqwestTransport::new()?),
            &config.api_url,
            &config.site_url,
            store,
        ))
    }

    pub fn with_transport(
        transport: Arc<dyn Transport>,
        base_url: &str,
        site_url: &str,
        store: Arc<Store>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            site_url: site_url.to_string(),
            store,
        }
    }

    /// Check whether the stored token is accepted by the remote service.
    ///
    /// 200 means valid, 521 means the service itself is down; anything else,
    /// including transport failure, counts as invalid. No retries.
    pub fn token_status(&self) -> TokenStatus {
        let token = self.setting(settings::TOKEN).unwrap_or_default();
        match self.request(
            Method::Get,
            "/market-apps/connected?channel=wordpress",
            &token,
            None,
        ) {
            Ok(resp) if resp.status == 200 => TokenStatus::Valid,
            Ok(resp) if resp.status == 521 => TokenStatus::ServerDown,
            Ok(resp) => {
                debug!(status = resp.status, "token rejected by remote");
                TokenStatus::Invalid
            }
            Err(e) => {
                warn!(error = %e, "token check failed");
                TokenStatus::Invalid
            }
        }
    }

    /// Report an install/uninstall lifecycle event. True only on HTTP 200;
    /// without stored credentials no request is made.
    pub fn update_plugin_status(&self, status: PluginStatus) -> bool {
        let Some((token, _)) = self.credentials() else {
            return false;
        };

        let path = format!("/wordpress/{}", status.as_str());
        match self.request(Method::Post, &path, &token, None) {
            Ok(resp) if resp.status == 200 => true,
            Ok(resp) => {
                debug!(status = resp.status, event = status.as_str(), "lifecycle report rejected");
                false
            }
            Err(e) => {
                warn!(error = %e, event = status.as_str(), "lifecycle report failed");
                false
            }
        }
    }

    /// Return the provisioned proxy secret, generating and provisioning one
    /// if absent.
    ///
    /// The secret is a fresh UUID v4, POSTed to the remote together with the
    /// site URL, and persisted only when the remote answers 200 with
    /// `message == "Success"`. A failed attempt persists nothing; the next
    /// call generates a new random value.
    pub fn ensure_secret_key(&self) -> Option<String> {
        if let Some(existing) = self.setting(settings::PROXY_SECRET) {
            if !existing.is_empty() {
                return Some(existing);
            }
        }

        let secret = Uuid::new_v4().to_string();
        let token = self.setting(settings::TOKEN).unwrap_or_default();
        let body = serde_json::json!({
            "site_url": self.site_url,
            "secret_key": secret,
        });

        match self.request(Method::Post, "/wordpress-proxy-api-secret", &token, Some(body)) {
            Ok(resp) if resp.status == 200 && message_is_success(&resp.body) => {
                let conn = self.store.conn();
                settings::set_setting(&conn, settings::PROXY_SECRET, &secret);
                Some(secret)
            }
            Ok(resp) => {
                debug!(status = resp.status, "secret key provisioning rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "secret key provisioning failed");
                None
            }
        }
    }

    /// Fetch the visitor-verification signing secret, caching it until the
    /// credentials are cleared. Requires stored credentials.
    pub fn fetch_secret_key(&self) -> Option<String> {
        let Some((token, _)) = self.credentials() else {
            return None;
        };

        if let Some(cached) = self.setting(settings::SECRET_KEY) {
            if !cached.is_empty() {
                return Some(cached);
            }
        }

        let resp = match self.request(
            Method::Get,
            "/visitor-identity-verification/settings",
            &token,
            None,
        ) {
            Ok(resp) if resp.status == 200 => resp,
            Ok(resp) => {
                debug!(status = resp.status, "secret key fetch rejected");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "secret key fetch failed");
                return None;
            }
        };

        let secret = parse_json(&resp.body)?
            .get("secret_key")
            .and_then(Value::as_str)
            .map(str::to_owned)?;

        let conn = self.store.conn();
        settings::set_setting(&conn, settings::SECRET_KEY, &secret);
        Some(secret)
    }

    /// Send a signed visitor payload to mark a chat contact as verified.
    ///
    /// Authenticates with the per-session `contact_token`, not the stored
    /// site token. Returns the parsed response body on HTTP 200.
    pub fn send_visitor_verification(
        &self,
        hmac: &str,
        contact_id: &str,
        visitor: &Value,
        contact_token: &str,
    ) -> Option<Value> {
        let identifier = self.setting(settings::USER_IDENTIFIER).unwrap_or_default();
        if identifier.is_empty() {
            return None;
        }

        let path = format!("/chat-contacts/{contact_id}/mark-as-verified");
        let body = serde_json::json!({
            "visitor": {
                "hmac": hmac,
                "data": visitor,
            }
        });

        match self.request(Method::Post, &path, contact_token, Some(body)) {
            Ok(resp) if resp.status == 200 => parse_json(&resp.body),
            Ok(resp) => {
                debug!(status = resp.status, contact_id, "visitor verification rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, contact_id, "visitor verification failed");
                None
            }
        }
    }

    /// Current unread-notifications count, or 0 on any failure. Requires
    /// stored credentials. Callers wanting the 5-minute cache go through
    /// [`crate::unread`].
    pub fn unread_count(&self) -> i64 {
        let Some((token, _)) = self.credentials() else {
            return 0;
        };

        match self.request(Method::Get, "/unread-notifications", &token, None) {
            Ok(resp) if resp.status == 200 => parse_json(&resp.body)
                .and_then(|v| v.get("total_unread_count").and_then(Value::as_i64))
                .unwrap_or(0),
            Ok(resp) => {
                debug!(status = resp.status, "unread count fetch rejected");
                0
            }
            Err(e) => {
                warn!(error = %e, "unread count fetch failed");
                0
            }
        }
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        bearer: &str,
        body: Option<Value>,
    ) -> anyhow::Result<HttpResponse> {
        self.transport.execute(&HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            bearer,
            body,
        })
    }

    fn setting(&self, key: &str) -> Option<String> {
        let conn = self.store.conn();
        settings::get_setting(&conn, key)
    }

    /// Token and user identifier, iff both are non-empty.
    fn credentials(&self) -> Option<(String, String)> {
        let token = self.setting(settings::TOKEN)?;
        let identifier = self.setting(settings::USER_IDENTIFIER)?;
        if token.is_empty() || identifier.is_empty() {
            return None;
        }
        Some((token, identifier))
    }
}

fn parse_json(body: &str) -> Option<Value> {
    serde_json::from_str(body).ok()
}

fn message_is_success(body: &str) -> bool {
    parse_json(body)
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_owned))
        .as_deref()
        == Some("Success")
}
