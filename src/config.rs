use std::path::PathBuf;

/// Default base URL of the remote Chatway API.
pub const DEFAULT_API_URL: &str = "https://chatway.app/api";

/// Global configuration for the bridge.
///
/// Centralizes the remote API URL, the hosting site's URL, and the path of
/// the settings database.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub api_url: String,
    pub site_url: String,
    pub home_dir: PathBuf,
    pub db_path: PathBuf,
}

impl Configuration {
    /// Create configuration from environment variables and defaults.
    ///
    /// `CHATWAY_API_URL` overrides the remote base URL, `CHATWAY_SITE_URL`
    /// is the public URL of the hosting site (sent with secret-key
    /// provisioning), and `CHATWAY_HOME` overrides the data directory
    /// (default `~/.chatway`).
    pub fn create() -> anyhow::Result<Self> {
        let api_url =
            std::env::var("CHATWAY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let site_url = std::env::var("CHATWAY_SITE_URL").unwrap_or_default();

        let home_dir = if let Ok(home) = std::env::var("CHATWAY_HOME") {
            // Expand ~ to home directory
            if let Some(rest) = home.strip_prefix("~/") {
                if let Some(user_home) = dirs_next::home_dir() {
                    user_home.join(rest)
                } else {
                    PathBuf::from(home)
                }
            } else {
                PathBuf::from(home)
            }
        } else {
            let user_home = dirs_next::home_dir()
                .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
            user_home.join(".chatway")
        };

        std::fs::create_dir_all(&home_dir)?;
        let db_path = home_dir.join("chatway.db");

        Ok(Self {
            api_url,
            site_url,
            home_dir,
            db_path,
        })
    }
}
