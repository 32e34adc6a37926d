//! Admin authentication settings

use serde::Deserialize;

/// HTTP Basic credentials for `/admin/*` routes.
///
/// The gate only engages when both fields are set and the environment is
/// not "local".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Basic-auth username
    pub username: Option<String>,

    /// Basic-auth password
    pub password: Option<String>,
}

impl AdminConfig {
    /// True when credentials are fully configured
    pub fn is_configured(&self) -> bool {
        self.username.as_deref().is_some_and(|u| !u.is_empty())
            && self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}
