use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::error::LauncherResult;

const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    Offline,
    Yggdrasil,
    Microsoft,
}

/// A signed-in (or offline) account, one variant per authentication scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Account {
    Offline {
        username: String,
    },
    Yggdrasil {
        access_token: String,
        username: String,
        profile_id: String,
        display_name: String,
    },
    Microsoft {
        access_token: String,
        profile_id: String,
        name: String,
    },
}

impl Account {
    /// Flatten into the fields a launch needs.
    pub fn session(&self) -> LaunchAccountProfile {
        match self {
            Account::Offline { username } => LaunchAccountProfile::offline(username),
            Account::Yggdrasil {
                access_token,
                username,
                profile_id,
                display_name,
            } => LaunchAccountProfile {
                mode: AccountMode::Yggdrasil,
                username: if display_name.trim().is_empty() {
                    username.clone()
                } else {
                    display_name.clone()
                },
                uuid: profile_id.clone(),
                access_token: access_token.clone(),
                user_type: "mojang".into(),
            },
            Account::Microsoft {
                access_token,
                profile_id,
                name,
            } => LaunchAccountProfile {
                mode: AccountMode::Microsoft,
                username: name.clone(),
                uuid: profile_id.clone(),
                access_token: access_token.clone(),
                user_type: "msa".into(),
            },
        }
        .sanitized()
    }
}

/// Session fields handed to the game process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchAccountProfile {
    pub mode: AccountMode,
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    pub user_type: String,
}

impl Default for LaunchAccountProfile {
    fn default() -> Self {
        Self::offline("Player")
    }
}

impl LaunchAccountProfile {
    pub fn offline(username: &str) -> Self {
        Self {
            mode: AccountMode::Offline,
            username: username.trim().to_string(),
            uuid: NIL_UUID.into(),
            access_token: String::new(),
            user_type: "legacy".into(),
        }
    }

    pub fn sanitized(mut self) -> Self {
        if self.username.trim().is_empty() {
            self.username = "Player".into();
        }
        if self.uuid.trim().is_empty() {
            self.uuid = NIL_UUID.into();
        }
        if self.access_token.trim().is_empty() {
            // The game rejects an empty token argument even offline.
            self.access_token = "0".into();
        }
        if self.user_type.trim().is_empty() {
            self.user_type = match self.mode {
                AccountMode::Offline => "legacy".into(),
                AccountMode::Yggdrasil => "mojang".into(),
                AccountMode::Microsoft => "msa".into(),
            };
        }
        self
    }
}

/// Java configuration from the current profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaSettings {
    pub java_path: PathBuf,
    pub jvm_args: Vec<String>,
    /// 0 leaves the heap size to the JVM.
    pub max_memory_mb: u32,
}

/// Source of the current profile's session and java settings.
///
/// A launch asks once for each and carries the results in its `LaunchSpec`.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> LauncherResult<LaunchAccountProfile>;

    async fn java_settings(&self) -> LauncherResult<JavaSettings>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_session_is_sanitized() {
        let session = Account::Offline { username: "  ".into() }.session();
        assert_eq!(session.username, "Player");
        assert_eq!(session.uuid, NIL_UUID);
        assert_eq!(session.access_token, "0");
        assert_eq!(session.user_type, "legacy");
    }

    #[test]
    fn yggdrasil_prefers_display_name() {
        let session = Account::Yggdrasil {
            access_token: "token".into(),
            username: "alex@example.com".into(),
            profile_id: "b7472ad16d074bb8336095262999a176".into(),
            display_name: "Alex".into(),
        }
        .session();
        assert_eq!(session.username, "Alex");
        assert_eq!(session.user_type, "mojang");
        assert_eq!(session.access_token, "token");
    }
}
