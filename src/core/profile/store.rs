use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::model::{ExtraConfig, GameProfile, LaunchProfiles, SelectedUser};
use crate::core::auth::{Account, JavaSettings, LaunchAccountProfile, SessionProvider};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::java::resolve_java_path;
use crate::core::state::LauncherPaths;
use crate::core::store::{backup_corrupt, load_json, write_json_merged, JsonLoad};
use crate::core::version::VersionRequest;

pub const LOGIN_OFFLINE: &str = "offline";
pub const LOGIN_YGGDRASIL: &str = "yggdrasil";
pub const LOGIN_MICROSOFT: &str = "microsoft";

/// Launcher profiles plus the launcher's own settings, both persisted as JSON.
///
/// Saves re-read the file and merge on top, so keys written by other
/// launchers sharing `launcher_profiles.json` survive.
#[derive(Debug)]
pub struct ProfileStore {
    profile_path: PathBuf,
    extra_path: PathBuf,
    profiles: LaunchProfiles,
    extra: ExtraConfig,
}

impl ProfileStore {
    /// Load both files. Missing or unreadable files are replaced with defaults.
    pub async fn open(paths: &LauncherPaths) -> LauncherResult<Self> {
        let profile_path = paths.launch_profile_path();
        let extra_path = paths.extra_config_path();

        let (profiles, profiles_fresh) =
            load_or_reset(&profile_path, LaunchProfiles::with_default_profiles).await?;
        let (extra, extra_fresh) = load_or_reset(&extra_path, ExtraConfig::default).await?;

        let store = Self {
            profile_path,
            extra_path,
            profiles,
            extra,
        };
        if profiles_fresh {
            store.save_profiles().await?;
        }
        if extra_fresh {
            store.save_extra().await?;
        }

        info!(
            "Loaded {} launcher profiles from {:?}",
            store.profiles.profiles.len(),
            store.profile_path
        );
        Ok(store)
    }

    pub fn profiles(&self) -> &LaunchProfiles {
        &self.profiles
    }

    pub fn extra(&self) -> &ExtraConfig {
        &self.extra
    }

    pub async fn save_profiles(&self) -> LauncherResult<()> {
        write_merged(&self.profile_path, &self.profiles).await
    }

    pub async fn save_extra(&self) -> LauncherResult<()> {
        write_merged(&self.extra_path, &self.extra).await
    }

    // ── Mutators ──

    pub async fn set_java_path(&mut self, path: impl Into<String>) -> LauncherResult<()> {
        self.extra.java_path = path.into();
        self.save_extra().await
    }

    pub async fn set_java_args(&mut self, args: impl Into<String>) -> LauncherResult<()> {
        self.extra.java_args = args.into();
        self.save_extra().await
    }

    /// Set the heap size in MiB from its leading integer, so `"1024M"` is 1024.
    /// Anything without one, or negative, means 0.
    pub async fn set_memory(&mut self, mem: &str) -> LauncherResult<()> {
        self.extra.memory = leading_int(mem)
            .filter(|m| *m >= 0)
            .map(|m| u32::try_from(m).unwrap_or(u32::MAX))
            .unwrap_or(0);
        self.save_extra().await
    }

    /// Mark a profile as used now. The most recently used profile is the selected one.
    pub async fn touch_profile(&mut self, id: &str) -> LauncherResult<()> {
        let profile = self
            .profiles
            .profiles
            .get_mut(id)
            .ok_or_else(|| LauncherError::Other(format!("No such profile: {}", id)))?;
        profile.last_used = Utc::now();
        self.save_profiles().await
    }

    /// Select a profile and return the version it launches.
    pub async fn select_profile(&mut self, id: &str) -> LauncherResult<VersionRequest> {
        self.touch_profile(id).await?;
        self.selected_version_request()
    }

    /// Choose the account used for launches.
    ///
    /// Yggdrasil accounts are recorded in the shared profile file; every other
    /// login type keeps its selection in the extra config.
    pub async fn set_selected_user(
        &mut self,
        login_type: &str,
        account: &str,
        profile: Option<&str>,
    ) -> LauncherResult<()> {
        if login_type == LOGIN_YGGDRASIL {
            let entry = self
                .profiles
                .authentication_database
                .get(account)
                .ok_or_else(|| LauncherError::Other(format!("Unknown account: {}", account)))?;
            let profile = match profile {
                Some(p) => p.to_string(),
                None => entry.profiles.keys().next().cloned().unwrap_or_default(),
            };
            self.profiles.selected_user = SelectedUser {
                account: account.into(),
                profile,
            };
            self.save_profiles().await?;
        } else {
            self.extra.selected_user = account.into();
        }
        self.extra.login_type = login_type.into();
        self.save_extra().await
    }

    pub async fn toggle_snapshots(&mut self) -> LauncherResult<bool> {
        self.profiles.settings.enable_snapshots = !self.profiles.settings.enable_snapshots;
        self.save_profiles().await?;
        Ok(self.profiles.settings.enable_snapshots)
    }

    pub async fn toggle_bmcl_api(&mut self) -> LauncherResult<bool> {
        self.extra.bmcl_api = !self.extra.bmcl_api;
        self.save_extra().await?;
        Ok(self.extra.bmcl_api)
    }

    // ── Queries ──

    pub fn selected_profile(&self) -> Option<(&str, &GameProfile)> {
        self.profiles.selected()
    }

    pub fn selected_version_request(&self) -> LauncherResult<VersionRequest> {
        self.selected_profile()
            .map(|(_, p)| p.version_request())
            .ok_or_else(|| LauncherError::Resolution("no launcher profile is selected".into()))
    }

    /// The account chosen for launches, if any.
    ///
    /// A selection that no longer resolves is cleared and saved before the
    /// error is returned.
    pub async fn current_account(&mut self) -> LauncherResult<Option<Account>> {
        match self.lookup_account() {
            Ok(account) => Ok(account),
            Err(e) => {
                warn!("Clearing broken account selection: {}", e);
                self.extra.login_type.clear();
                self.extra.selected_user.clear();
                self.save_extra().await?;
                Err(e)
            }
        }
    }

    fn lookup_account(&self) -> LauncherResult<Option<Account>> {
        let login_type = self.extra.login_type.as_str();
        match login_type {
            "" => Ok(None),
            LOGIN_OFFLINE => Ok(Some(Account::Offline {
                username: self.extra.selected_user.clone(),
            })),
            LOGIN_YGGDRASIL => {
                let selected = &self.profiles.selected_user;
                let entry = self.auth_entry(&selected.account)?;
                let display_name = entry
                    .profiles
                    .get(&selected.profile)
                    .map(|p| p.display_name.clone())
                    .unwrap_or_default();
                Ok(Some(Account::Yggdrasil {
                    access_token: entry.access_token.clone(),
                    username: entry.username.clone(),
                    profile_id: selected.profile.clone(),
                    display_name,
                }))
            }
            LOGIN_MICROSOFT => {
                let entry = self.auth_entry(&self.extra.selected_user)?;
                let (profile_id, name) = entry
                    .profiles
                    .iter()
                    .next()
                    .map(|(id, p)| (id.clone(), p.display_name.clone()))
                    .ok_or_else(|| {
                        LauncherError::Other(format!(
                            "Account {} has no game profile",
                            self.extra.selected_user
                        ))
                    })?;
                Ok(Some(Account::Microsoft {
                    access_token: entry.access_token.clone(),
                    profile_id,
                    name,
                }))
            }
            other => Err(LauncherError::Other(format!("Unknown login type: {}", other))),
        }
    }

    fn auth_entry(&self, account: &str) -> LauncherResult<&super::model::AuthenticationEntry> {
        self.profiles
            .authentication_database
            .get(account)
            .ok_or_else(|| LauncherError::Other(format!("Unknown account: {}", account)))
    }

    pub fn java_settings(&self) -> JavaSettings {
        let configured = Some(self.extra.java_path.trim())
            .filter(|p| !p.is_empty())
            .map(Path::new);
        JavaSettings {
            java_path: resolve_java_path(configured),
            jvm_args: self
                .extra
                .java_args
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            max_memory_mb: self.extra.memory,
        }
    }
}

#[async_trait]
impl SessionProvider for RwLock<ProfileStore> {
    async fn current_session(&self) -> LauncherResult<LaunchAccountProfile> {
        let account = self.write().await.current_account().await?;
        Ok(account
            .map(|a| a.session())
            .unwrap_or_else(|| LaunchAccountProfile::default().sanitized()))
    }

    async fn java_settings(&self) -> LauncherResult<JavaSettings> {
        Ok(self.read().await.java_settings())
    }
}

/// Returns the parsed file, or a default plus `true` when it must be rewritten.
async fn load_or_reset<T, F>(path: &Path, default: F) -> LauncherResult<(T, bool)>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match load_json::<T>(path).await {
        JsonLoad::Loaded(value) => Ok((value, false)),
        JsonLoad::Missing => {
            info!("{:?} does not exist, writing defaults", path);
            Ok((default(), true))
        }
        JsonLoad::Corrupt(reason) => {
            warn!("Failed to load {:?}: {}", path, reason);
            backup_corrupt(path).await?;
            Ok((default(), true))
        }
    }
}

async fn write_merged<T: Serialize>(path: &Path, value: &T) -> LauncherResult<()> {
    write_json_merged(path, serde_json::to_value(value)?, &[]).await?;
    Ok(())
}

/// Optional sign followed by digits at the start of `raw`, ignoring leading whitespace.
fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let digits_from = usize::from(raw.starts_with(['-', '+']));
    let end = raw[digits_from..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(raw.len(), |i| i + digits_from);
    if end == digits_from {
        return None;
    }
    Some(raw[..end].parse::<i64>().unwrap_or(i64::MAX))
}
