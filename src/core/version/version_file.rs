// ─── Version File ───
// Parses an installed version descriptor and evaluates OS rules for libraries.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{MavenCoordinate, MOJANG_LIBRARIES};
use crate::core::state::LauncherPaths;

/// A fully parsed Mojang version JSON.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub version_type: Option<String>,
    pub main_class: String,
    #[serde(default)]
    pub inherits_from: Option<String>,
    /// Version whose client jar this descriptor runs on.
    #[serde(default)]
    pub jar: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexInfo>,
    #[serde(default)]
    pub arguments: Option<Arguments>,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default)]
    pub minecraft_arguments: Option<String>,
    #[serde(default)]
    pub java_version: Option<JavaVersionInfo>,
    /// Legacy asset index id (pre-1.7 descriptors).
    #[serde(default)]
    pub assets: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    pub major_version: u32,
}

#[derive(Debug, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<DownloadArtifact>,
    pub server: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<Argument>,
    #[serde(default)]
    pub jvm: Vec<Argument>,
}

/// An entry of `arguments.game` / `arguments.jvm`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Plain(String),
    Conditional {
        #[serde(default)]
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
    /// Shapes this launcher does not understand; they contribute nothing.
    Unknown(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    One(String),
    Many(Vec<String>),
}

impl Argument {
    fn push_values(&self, out: &mut Vec<String>) {
        match self {
            Argument::Plain(arg) => out.push(arg.clone()),
            Argument::Conditional { rules, value } if rules.is_empty() || rules_allow(rules) => {
                match value {
                    ArgumentValue::One(arg) => out.push(arg.clone()),
                    ArgumentValue::Many(args) => out.extend(args.iter().cloned()),
                }
            }
            _ => {}
        }
    }
}

fn collect_arguments(entries: &[Argument]) -> Vec<String> {
    let mut out = Vec::new();
    for entry in entries {
        entry.push_values(&mut out);
    }
    out
}

// ─── Library Entry ───

#[derive(Debug, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    /// Repository base for legacy entries without `downloads`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<Rule>>,
    #[serde(default)]
    pub natives: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryDownloads {
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default)]
    pub classifiers: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct LibDownloadArtifact {
    pub path: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

// ─── Rules ───

/// One `rules[]` entry. Libraries and conditional arguments share the format.
#[derive(Debug, Deserialize)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
    /// Launcher features such as demo mode. None are ever enabled here.
    #[serde(default)]
    pub features: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Default, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
}

impl Rule {
    fn matches_host(&self) -> bool {
        if self.features.is_some() {
            return false;
        }
        self.os.as_ref().map_or(true, |os| {
            os.name.as_deref().map_or(true, |n| n == current_os_name())
                && os.arch.as_deref().map_or(true, |a| a == current_arch_name())
        })
    }
}

/// The last rule matching this host decides. No match means excluded.
pub fn rules_allow(rules: &[Rule]) -> bool {
    rules
        .iter()
        .rev()
        .find(|rule| rule.matches_host())
        .map_or(false, |rule| rule.action == RuleAction::Allow)
}

impl LibraryEntry {
    pub fn is_allowed_for_current_os(&self) -> bool {
        self.rules.as_deref().map_or(true, rules_allow)
    }

    /// Natives classifier for this host, with `${arch}` expanded to 32/64.
    pub fn native_classifier_for_current_os(&self) -> Option<String> {
        let classifier = self.natives.as_ref()?.get(current_os_name())?.as_str()?;
        let bits = if cfg!(target_pointer_width = "64") { "64" } else { "32" };
        Some(classifier.replace("${arch}", bits))
    }
}

fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

fn current_arch_name() -> &'static str {
    if cfg!(target_arch = "x86") {
        "x86"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x86_64"
    }
}

impl VersionJson {
    /// Parse the locally installed descriptor of `version_id`, folding in
    /// every `inheritsFrom` ancestor.
    pub async fn load(paths: &LauncherPaths, version_id: &str) -> LauncherResult<Self> {
        let merged = Self::load_merged_value(paths, version_id).await?;
        Ok(serde_json::from_value(merged)?)
    }

    async fn load_merged_value(
        paths: &LauncherPaths,
        version_id: &str,
    ) -> LauncherResult<serde_json::Value> {
        let mut chain = Vec::new();
        let mut next = Some(version_id.to_string());

        while let Some(id) = next.take() {
            if chain.iter().any(|(seen, _)| seen == &id) {
                return Err(LauncherError::Resolution(format!(
                    "inheritsFrom cycle through {}",
                    id
                )));
            }
            let path = paths.version_json(&id);
            let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    LauncherError::Resolution(format!("version {} is not installed", id))
                } else {
                    LauncherError::io(&path, e)
                }
            })?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            next = value
                .get("inheritsFrom")
                .and_then(|v| v.as_str())
                .map(ToString::to_string);
            chain.push((id, value));
        }

        let mut iter = chain.into_iter().rev();
        let (_, mut merged) = iter
            .next()
            .ok_or_else(|| LauncherError::Resolution(version_id.to_string()))?;
        for (_, child) in iter {
            merged = Self::inherit(&child, &merged);
        }
        Ok(merged)
    }

    /// Id of the version directory holding the client jar.
    pub fn jar_version_id<'a>(&'a self, version_id: &'a str) -> &'a str {
        self.jar
            .as_deref()
            .or(self.inherits_from.as_deref())
            .unwrap_or(version_id)
    }

    /// Client jar download, if the descriptor has one.
    pub fn client_download(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref().and_then(|d| d.client.as_ref())
    }

    /// Every library file the current OS needs, natives included.
    pub fn library_artifacts(&self) -> Vec<LibraryArtifact> {
        let mut artifacts = Vec::new();

        for lib in &self.libraries {
            if !lib.is_allowed_for_current_os() {
                debug!("Skipping library (OS rule): {}", lib.name);
                continue;
            }

            let native_classifier = lib.native_classifier_for_current_os();

            match lib.downloads.as_ref() {
                Some(downloads) => {
                    if let Some(ref artifact) = downloads.artifact {
                        artifacts.push(LibraryArtifact {
                            name: lib.name.clone(),
                            path: artifact.path.clone(),
                            url: artifact.url.clone(),
                            sha1: Some(artifact.sha1.clone()),
                            size: Some(artifact.size),
                            native: false,
                        });
                    }

                    let native_info = native_classifier
                        .as_ref()
                        .and_then(|c| downloads.classifiers.as_ref()?.get(c));
                    if let Some(native_info) = native_info {
                        if let (Some(url), Some(path)) = (
                            native_info.get("url").and_then(|v| v.as_str()),
                            native_info.get("path").and_then(|v| v.as_str()),
                        ) {
                            artifacts.push(LibraryArtifact {
                                name: lib.name.clone(),
                                path: path.to_string(),
                                url: url.to_string(),
                                sha1: native_info
                                    .get("sha1")
                                    .and_then(|v| v.as_str())
                                    .map(ToString::to_string),
                                size: native_info.get("size").and_then(|v| v.as_u64()),
                                native: true,
                            });
                        }
                    }
                }
                None => {
                    // Legacy entry: maven coordinate plus an optional repository base.
                    match lib.name.parse::<MavenCoordinate>() {
                        Ok(coord) => {
                            let coord = match &native_classifier {
                                Some(classifier) => coord.with_classifier(classifier.as_str()),
                                None => coord,
                            };
                            let repo = lib.url.as_deref().unwrap_or(MOJANG_LIBRARIES);
                            artifacts.push(LibraryArtifact {
                                name: lib.name.clone(),
                                path: coord.relative_path(),
                                url: coord.url(repo),
                                sha1: None,
                                size: None,
                                native: native_classifier.is_some(),
                            });
                        }
                        Err(e) => warn!("Skipping library {}: {}", lib.name, e),
                    }
                }
            }
        }

        artifacts
    }

    /// Asset index id, falling back to the legacy `assets` field.
    pub fn asset_index_id(&self) -> String {
        self.asset_index
            .as_ref()
            .map(|ai| ai.id.clone())
            .or_else(|| self.assets.clone())
            .unwrap_or_else(|| "legacy".into())
    }

    /// Game arguments for this host. Pre-1.13 descriptors only carry the
    /// space-separated `minecraftArguments` string.
    pub fn game_args(&self) -> Vec<String> {
        if let Some(args) = &self.arguments {
            return collect_arguments(&args.game);
        }
        self.minecraft_arguments
            .as_deref()
            .map(|line| line.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn jvm_args(&self) -> Vec<String> {
        self.arguments
            .as_ref()
            .map(|args| collect_arguments(&args.jvm))
            .unwrap_or_default()
    }

    /// Overlay `child` on `parent`. Child keys replace the parent's, except
    /// `libraries` (child entries first) and `arguments` (parent lists first).
    pub fn inherit(child: &serde_json::Value, parent: &serde_json::Value) -> serde_json::Value {
        let mut merged = parent.clone();
        let (Some(target), Some(overlay)) = (merged.as_object_mut(), child.as_object()) else {
            return merged;
        };

        for (key, value) in overlay {
            let combined = match (key.as_str(), target.get(key)) {
                ("libraries", Some(serde_json::Value::Array(inherited))) => match value.as_array() {
                    Some(own) => serde_json::Value::Array(
                        own.iter().chain(inherited.iter()).cloned().collect(),
                    ),
                    None => value.clone(),
                },
                ("arguments", Some(inherited)) => merge_argument_lists(inherited, value),
                _ => value.clone(),
            };
            target.insert(key.clone(), combined);
        }

        merged
    }
}

/// One library file resolved against the current OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryArtifact {
    pub name: String,
    /// Path relative to the libraries directory, `/`-separated.
    pub path: String,
    pub url: String,
    pub sha1: Option<String>,
    pub size: Option<u64>,
    pub native: bool,
}

/// Parent argument lists followed by the child's, per `game` / `jvm` key.
fn merge_argument_lists(
    parent: &serde_json::Value,
    child: &serde_json::Value,
) -> serde_json::Value {
    let mut merged = parent.clone();
    let (Some(merged_obj), Some(child_obj)) = (merged.as_object_mut(), child.as_object()) else {
        return child.clone();
    };

    for (key, value) in child_obj {
        match (merged_obj.get_mut(key), value.as_array()) {
            (Some(serde_json::Value::Array(existing)), Some(extra)) => {
                existing.extend(extra.iter().cloned());
            }
            _ => {
                merged_obj.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}
