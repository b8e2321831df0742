//! Session data shapes, persisted and exchanged with the backend.

use serde::{Deserialize, Serialize};

/// The signed-in account as persisted and rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    /// Account identifier.
    pub id: String,
    /// Display name.
    pub nickname: String,
    /// Avatar URL, possibly empty.
    pub avatar: String,
    /// Authorization token; empty when anonymous.
    pub token: String,
}

impl SessionProfile {
    /// The signed-out profile.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            nickname: "Anonymous".to_string(),
            avatar: String::new(),
            token: String::new(),
        }
    }

    /// Whether the profile carries a credential.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self::anonymous()
    }
}

/// Backend reply to login and registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountPayload {
    /// Account identifier.
    pub id: String,
    /// Display name; the account endpoints call it `username`.
    #[serde(rename = "username")]
    pub nickname: String,
    /// Avatar URL.
    #[serde(default)]
    pub avatar: String,
    /// Fresh authorization token.
    pub token: String,
}

/// Backend reply to the profile call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfilePayload {
    /// Display name.
    pub nickname: String,
    /// Per-user configuration.
    #[serde(default)]
    pub settings: UserSettings,
}

/// Per-user configuration edited on the settings page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Site connection settings.
    #[serde(default)]
    pub site: SiteSettings,
    /// Download path settings.
    #[serde(default)]
    pub paths: PathSettings,
    /// Third-party tracker tokens.
    #[serde(default)]
    pub tokens: TrackerTokens,
}

/// Site connection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSettings {
    /// Backend hostname.
    #[serde(default)]
    pub hostname: String,
    /// Site API token.
    #[serde(default)]
    pub token: String,
}

/// Download path settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSettings {
    /// Destination for plain file downloads.
    #[serde(default)]
    pub file: String,
    /// Destination for torrent downloads.
    #[serde(default)]
    pub torrent: String,
}

/// Third-party tracker tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerTokens {
    /// M-Team API token.
    #[serde(default)]
    pub mteam: String,
}
