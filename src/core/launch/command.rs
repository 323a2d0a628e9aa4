// ─── Launch Command ───
// Turns a LaunchSpec and the installed descriptor into a java command line.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{debug, info};

use super::classpath::{build_classpath, classpath_separator, extract_natives, path_str};
use super::job::LaunchSpec;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherPaths;
use crate::core::version::VersionJson;

pub const LAUNCHER_NAME: &str = "PureLauncher";
pub const LAUNCHER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A fully resolved command, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
    pub natives_dir: PathBuf,
}

/// Read the descriptor of `spec.version_id`, extract its natives and build the
/// argument list.
pub async fn prepare_command(spec: &LaunchSpec) -> LauncherResult<LaunchCommand> {
    let paths = LauncherPaths::new(&spec.game_dir);
    let version = VersionJson::load(&paths, &spec.version_id).await?;
    let classpath = build_classpath(&paths, &version, &spec.version_id)?;
    let natives_dir = extract_natives(&paths, &version, &spec.version_id).await?;

    let vars = placeholders(spec, &paths, &version, &classpath, &natives_dir);
    let args = assemble_args(spec, &version, &classpath, &vars);

    Ok(LaunchCommand {
        program: spec.java_path.clone(),
        args,
        current_dir: spec.game_dir.clone(),
        natives_dir,
    })
}

fn placeholders(
    spec: &LaunchSpec,
    paths: &LauncherPaths,
    version: &VersionJson,
    classpath: &str,
    natives_dir: &Path,
) -> HashMap<&'static str, String> {
    let assets = path_str(&paths.assets_dir());
    let mut vars = HashMap::new();
    vars.insert("natives_directory", path_str(natives_dir));
    vars.insert("library_directory", path_str(&paths.libraries_dir()));
    vars.insert("classpath", classpath.to_string());
    vars.insert("classpath_separator", classpath_separator().to_string());
    vars.insert("game_directory", path_str(&spec.game_dir));
    vars.insert("version_name", spec.version_id.clone());
    vars.insert(
        "version_type",
        version.version_type.clone().unwrap_or_else(|| "release".into()),
    );
    vars.insert("launcher_name", LAUNCHER_NAME.to_string());
    vars.insert("launcher_version", LAUNCHER_VERSION.to_string());
    vars.insert("auth_player_name", spec.profile_name.clone());
    vars.insert("auth_uuid", spec.profile_id.clone());
    vars.insert("auth_access_token", spec.access_token.clone());
    vars.insert("auth_session", spec.access_token.clone());
    vars.insert("user_properties", spec.properties.clone());
    vars.insert("user_type", spec.user_type.clone());
    vars.insert("assets_root", assets.clone());
    vars.insert("game_assets", assets);
    vars.insert("assets_index_name", version.asset_index_id());
    vars
}

fn assemble_args(
    spec: &LaunchSpec,
    version: &VersionJson,
    classpath: &str,
    vars: &HashMap<&'static str, String>,
) -> Vec<String> {
    let mut args = Vec::new();
    if spec.max_memory_mb > 0 {
        args.push(format!("-Xmx{}M", spec.max_memory_mb));
    }
    args.extend(substitute_args(&spec.jvm_args, vars, true));

    let mut version_jvm = version.jvm_args();
    if version.arguments.is_none() {
        // Legacy descriptors carry no JVM arguments at all.
        version_jvm.push("-Djava.library.path=${natives_directory}".into());
    }
    args.extend(substitute_args(&version_jvm, vars, true));

    set_default_property(&mut args, "minecraft.launcher.brand", LAUNCHER_NAME);
    set_default_property(&mut args, "minecraft.launcher.version", LAUNCHER_VERSION);

    args.push("-cp".into());
    args.push(classpath.to_string());
    args.push(version.main_class.clone());

    let game = substitute_args(&version.game_args(), vars, false);
    args.extend(sanitize_numeric_window_args(game));
    args
}

/// Replace `${name}` tokens. Arguments left with an unknown placeholder are
/// dropped along with the option flag right before them.
fn substitute_args(
    raw_args: &[String],
    vars: &HashMap<&'static str, String>,
    strip_classpath: bool,
) -> Vec<String> {
    let mut resolved_args = Vec::new();
    let mut i = 0;

    while i < raw_args.len() {
        let arg = &raw_args[i];

        // The classpath is always injected once, right before the main class.
        if strip_classpath && matches!(arg.as_str(), "-cp" | "-classpath" | "--class-path") {
            i += 2;
            continue;
        }

        let resolved = substitute(arg, vars);
        if resolved.contains("${") {
            debug!("Dropping unresolved argument {:?}", arg);
            // A bare value takes its option with it; an option stands alone.
            if !arg.starts_with('-') {
                drop_dangling_option(&mut resolved_args);
            }
            i += 1;
            continue;
        }

        resolved_args.push(resolved);
        i += 1;
    }

    resolved_args
}

fn substitute(arg: &str, vars: &HashMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(arg.len());
    let mut rest = arg;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        match tail.find('}') {
            Some(end) => match vars.get(&tail[..end]) {
                Some(value) => {
                    out.push_str(value);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..start + 2 + end + 1]);
                    rest = &tail[end + 1..];
                }
            },
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn drop_dangling_option(args: &mut Vec<String>) {
    if args.last().is_some_and(|last| last.starts_with('-')) {
        let _ = args.pop();
    }
}

fn set_default_property(args: &mut Vec<String>, property: &str, value: &str) {
    let prefix = format!("-D{}=", property);
    if !args.iter().any(|arg| arg.starts_with(&prefix)) {
        args.push(format!("{}{}", prefix, value));
    }
}

fn sanitize_numeric_window_args(args: Vec<String>) -> Vec<String> {
    let mut sanitized = Vec::with_capacity(args.len());
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        if arg == "--width" || arg == "--height" {
            let Some(value) = args.get(i + 1) else {
                i += 1;
                continue;
            };

            if value.starts_with('-') || value.parse::<u32>().is_err() {
                i += 1;
                continue;
            }

            sanitized.push(arg.clone());
            sanitized.push(value.clone());
            i += 2;
            continue;
        }

        sanitized.push(arg.clone());
        i += 1;
    }

    sanitized
}

impl LaunchCommand {
    /// Build the process. Output is piped for relaying into the log.
    pub fn to_command(&self, detached: bool) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.current_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        configure_native_library_env(&mut cmd, &self.natives_dir);
        configure_platform_spawn(&mut cmd, detached);

        info!("Launching with Java: {:?}", self.program);
        debug!("Command (copy/paste): {}", self.for_logs());
        cmd
    }

    /// Shell-ish rendering with the access token masked.
    pub fn for_logs(&self) -> String {
        let mut parts = vec![shell_escape(&self.program.to_string_lossy())];
        let mut mask_next = false;
        for arg in &self.args {
            if mask_next {
                parts.push("***".into());
                mask_next = false;
                continue;
            }
            mask_next = arg == "--accessToken" || arg == "--session";
            parts.push(shell_escape(arg));
        }
        parts.join(" ")
    }
}

fn configure_native_library_env(cmd: &mut tokio::process::Command, natives_dir: &Path) {
    let native_path = path_str(natives_dir);

    if cfg!(target_os = "windows") {
        cmd.env("PATH", append_env_path("PATH", &native_path));
    } else if cfg!(target_os = "linux") {
        cmd.env("LD_LIBRARY_PATH", append_env_path("LD_LIBRARY_PATH", &native_path));
    } else if cfg!(target_os = "macos") {
        cmd.env("DYLD_LIBRARY_PATH", append_env_path("DYLD_LIBRARY_PATH", &native_path));
    }
}

#[allow(unused_variables)]
fn configure_platform_spawn(cmd: &mut tokio::process::Command, detached: bool) {
    #[cfg(unix)]
    if detached {
        cmd.process_group(0);
    }

    #[cfg(target_os = "windows")]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        if detached {
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP | DETACHED_PROCESS);
        }
        cmd.env_remove("WT_SESSION");
        cmd.env_remove("TERM");
        cmd.env_remove("ConEmuANSI");
    }
}

fn append_env_path(var_name: &str, value: &str) -> String {
    let separator = if cfg!(target_os = "windows") { ";" } else { ":" };
    match std::env::var(var_name) {
        Ok(existing) if !existing.trim().is_empty() => {
            format!("{}{}{}", value, separator, existing)
        }
        _ => value.to_string(),
    }
}

fn shell_escape(raw: &str) -> String {
    if raw.is_empty() {
        return "\"\"".to_string();
    }

    if raw.chars().all(|ch| {
        ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '/' | ':' | '\\' | '=')
    }) {
        return raw.to_string();
    }

    format!("\"{}\"", raw.replace('"', "\\\""))
}

/// Fail early with a clear message instead of a spawn error deep in the worker.
pub fn check_java(java_path: &Path) -> LauncherResult<()> {
    if java_path.components().count() > 1 && !java_path.exists() {
        return Err(LauncherError::Launch(format!(
            "java executable not found at {:?}",
            java_path
        )));
    }
    Ok(())
}
