//! Config file discovery and layered loading.
//!
//! `load()` runs:
//! 1. Parse embedded `defaults.toml`
//! 2. Merge the user layer (`~/.warden/config.toml` or `$WARDEN_HOME/config.toml`)
//! 3. Merge `{workspace}/.warden/config.toml` with restriction enforcement
//! 4. Apply `WARDEN_*` environment fallbacks for fields no file set
//! 5. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, deep_merge_tracking, enforce_restrictions, record_leaves};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
pub(crate) const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Directory name for user and workspace config.
const CONFIG_DIR: &str = ".warden";

/// Load configuration with layered precedence.
///
/// `workspace_root` enables the workspace layer. `home_override` is used as
/// the user config directory itself, bypassing `~/.warden` and `$WARDEN_HOME`.
///
/// # Errors
///
/// Returns an error if any config file is unreadable or malformed, an
/// environment variable is unusable, or the merged config fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let env = collect_env_vars();
    let user_dir = match home_override {
        Some(dir) => dir.to_path_buf(),
        None => user_config_dir(&env)?,
    };
    load_layers(
        Some(&user_dir.join("config.toml")),
        workspace_root,
        &env,
    )
}

/// Load the defaults plus one explicit file, then environment fallbacks.
///
/// # Errors
///
/// Returns an error if the file is missing, unreadable or malformed, or the
/// result fails validation.
pub fn load_file(path: &Path) -> ConfigResult<ResolvedConfig> {
    if !path.is_file() {
        return Err(ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such config file"),
        });
    }
    load_layers(Some(path), None, &collect_env_vars())
}

/// Shared layering with an explicit environment snapshot.
pub(crate) fn load_layers(
    user_path: Option<&Path>,
    workspace_root: Option<&Path>,
    env: &HashMap<String, String>,
) -> ConfigResult<ResolvedConfig> {
    let mut merged = parse_toml(DEFAULTS_TOML, "<embedded defaults>")?;
    let mut sources = FieldSources::new();
    let mut loaded_files = Vec::new();
    record_leaves(&merged, "", ConfigLayer::Defaults, &mut sources);

    if let Some(path) = user_path
        && let Some(overlay) = try_load_file(path)?
    {
        deep_merge_tracking(&mut merged, &overlay, "", ConfigLayer::User, &mut sources);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded user config");
    }

    if let Some(root) = workspace_root {
        let ws_path = root.join(CONFIG_DIR).join("config.toml");
        if let Some(overlay) = try_load_file(&ws_path)? {
            let baseline = merged.clone();
            deep_merge_tracking(&mut merged, &overlay, "", ConfigLayer::Workspace, &mut sources);
            enforce_restrictions(&mut merged, &baseline, &overlay);
            loaded_files.push(ws_path.display().to_string());
            info!(path = %ws_path.display(), "loaded workspace config");
        }
    }

    let applied = apply_env_fallbacks(&mut merged, &mut sources, env)?;
    if applied > 0 {
        debug!(count = applied, "applied environment variable fallbacks");
    }

    let config: Config = merged
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::ParseError {
            path: "<merged config>".to_owned(),
            source: e,
        })?;
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        field_sources: sources,
        loaded_files,
    })
}

fn parse_toml(content: &str, origin: &str) -> ConfigResult<toml::Value> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: origin.to_owned(),
        source: e,
    })
}

/// Read and parse a file, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }

    parse_toml(&content, &path.display().to_string()).map(Some)
}

/// `$WARDEN_HOME` if set, else `~/.warden`.
fn user_config_dir(env: &HashMap<String, String>) -> ConfigResult<PathBuf> {
    if let Some(home) = env.get("WARDEN_HOME").filter(|h| !h.trim().is_empty()) {
        return Ok(PathBuf::from(home));
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(CONFIG_DIR))
        .ok_or(ConfigError::NoHomeDir)
}
