use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::version::VersionRequest;

pub const DEFAULT_JAVA_ARGS: &str = "-XX:+UnlockExperimentalVMOptions -XX:+UseG1GC \
-XX:G1NewSizePercent=20 -XX:G1ReservePercent=20 -XX:MaxGCPauseMillis=50 -XX:G1HeapRegionSize=32M";

pub const LATEST_RELEASE_PROFILE: &str = "b7472ad16d074bb8336095262999a176";
pub const LATEST_SNAPSHOT_PROFILE: &str = "439b6eb6c263108aebb8f85dfe31bc17";

/// How a profile picks its version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileType {
    LatestRelease,
    LatestSnapshot,
    Custom,
}

/// One entry of `launcher_profiles.json#profiles`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GameProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default = "epoch")]
    pub created: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub last_used: DateTime<Utc>,
    #[serde(default)]
    pub last_version_id: String,
    #[serde(rename = "type", default = "custom_profile")]
    pub profile_type: ProfileType,
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

fn custom_profile() -> ProfileType {
    ProfileType::Custom
}

impl GameProfile {
    fn latest(profile_type: ProfileType, icon: &str, last_version_id: &str) -> Self {
        Self {
            name: String::new(),
            icon: icon.into(),
            created: epoch(),
            last_used: epoch(),
            last_version_id: last_version_id.into(),
            profile_type,
        }
    }

    /// The version this profile launches. Latest-* profiles stay symbolic.
    pub fn version_request(&self) -> VersionRequest {
        match self.profile_type {
            ProfileType::LatestRelease => VersionRequest::LatestRelease,
            ProfileType::LatestSnapshot => VersionRequest::LatestSnapshot,
            ProfileType::Custom => self
                .last_version_id
                .parse()
                .unwrap_or(VersionRequest::LatestRelease),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedUser {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub profile: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileName {
    #[serde(default)]
    pub display_name: String,
}

/// A remembered login, keyed by account in `authenticationDatabase`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationEntry {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileName>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enable_snapshots: bool,
    pub locale: String,
    pub show_game_log: bool,
    pub sound_on: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_snapshots: false,
            locale: "en-us".into(),
            show_game_log: false,
            sound_on: true,
        }
    }
}

/// `launcher_profiles.json`, shared with other launchers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LaunchProfiles {
    pub profiles: BTreeMap<String, GameProfile>,
    pub selected_user: SelectedUser,
    pub authentication_database: BTreeMap<String, AuthenticationEntry>,
    pub client_token: String,
    pub settings: Settings,
}

impl Default for LaunchProfiles {
    fn default() -> Self {
        Self {
            profiles: BTreeMap::new(),
            selected_user: SelectedUser::default(),
            authentication_database: BTreeMap::new(),
            client_token: uuid::Uuid::new_v4().simple().to_string(),
            settings: Settings::default(),
        }
    }
}

impl LaunchProfiles {
    /// Fresh state with the latest-release and latest-snapshot profiles.
    pub fn with_default_profiles() -> Self {
        let mut profiles = Self::default();
        profiles.profiles.insert(
            LATEST_RELEASE_PROFILE.into(),
            GameProfile::latest(ProfileType::LatestRelease, "Grass", "latest-release"),
        );
        profiles.profiles.insert(
            LATEST_SNAPSHOT_PROFILE.into(),
            GameProfile::latest(ProfileType::LatestSnapshot, "Crafting_Table", "latest-snapshot"),
        );
        profiles
    }

    /// The most recently used profile.
    pub fn selected(&self) -> Option<(&str, &GameProfile)> {
        self.profiles
            .iter()
            .max_by_key(|(_, p)| p.last_used)
            .map(|(id, p)| (id.as_str(), p))
    }
}

/// Launcher-specific settings kept beside the shared profile file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtraConfig {
    pub java_path: String,
    /// Mirror preference shared with other launchers. Stored and toggled
    /// only; downloads always use the URLs in the descriptors.
    #[serde(rename = "bmclAPI")]
    pub bmcl_api: bool,
    /// MiB, 0 leaves the heap to the JVM.
    pub memory: u32,
    pub selected_user: String,
    pub login_type: String,
    pub java_args: String,
}

impl Default for ExtraConfig {
    fn default() -> Self {
        Self {
            java_path: String::new(),
            bmcl_api: true,
            memory: 0,
            selected_user: String::new(),
            login_type: String::new(),
            java_args: DEFAULT_JAVA_ARGS.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_types_use_kebab_case() {
        let json = serde_json::to_value(ProfileType::LatestSnapshot).unwrap();
        assert_eq!(json, "latest-snapshot");
    }

    #[test]
    fn default_profiles_resolve_symbolically() {
        let profiles = LaunchProfiles::with_default_profiles();
        assert_eq!(profiles.profiles.len(), 2);
        assert_eq!(
            profiles.profiles[LATEST_SNAPSHOT_PROFILE].version_request(),
            VersionRequest::LatestSnapshot
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: LaunchProfiles = serde_json::from_value(serde_json::json!({
            "profiles": {
                "p1": { "lastVersionId": "1.8.9", "type": "custom", "lastUsed": "2020-01-01T00:00:00Z" }
            },
            "settings": { "showGameLog": true }
        }))
        .unwrap();

        let (id, profile) = parsed.selected().unwrap();
        assert_eq!(id, "p1");
        assert_eq!(profile.version_request(), VersionRequest::Concrete("1.8.9".into()));
        assert!(parsed.settings.show_game_log);
        assert!(parsed.settings.sound_on);
    }

    #[test]
    fn extra_config_keeps_bmcl_key() {
        let value = serde_json::to_value(ExtraConfig::default()).unwrap();
        assert_eq!(value["bmclAPI"], true);
        assert_eq!(value["javaArgs"], DEFAULT_JAVA_ARGS);
    }
}
