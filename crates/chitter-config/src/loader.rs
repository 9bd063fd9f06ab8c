// SPDX-FileCopyrightText: 2026 Chitter Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins:
//! 1. Compiled defaults
//! 2. `/etc/chitter/chitter.toml`
//! 3. `~/.config/chitter/chitter.toml`
//! 4. `./chitter.toml`
//! 5. `CHITTER_*` environment variables

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChitterConfig;

/// Config sections addressable from the environment.
const ENV_SECTIONS: &[&str] = &["relay", "call", "metrics", "logging"];

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/chitter/chitter.toml";

/// Config file in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "chitter.toml";

/// The per-user config file, when a config directory exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("chitter").join(LOCAL_CONFIG_FILE))
}

/// Every file consulted by [`load_config`], lowest precedence first.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
    paths.extend(user_config_path());
    paths.push(PathBuf::from(LOCAL_CONFIG_FILE));
    paths
}

/// Build the full layered Figment without extracting it.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(ChitterConfig::default()));
    for path in search_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Load configuration from the standard hierarchy with env overrides.
pub fn load_config() -> Result<ChitterConfig, figment::Error> {
    build_figment().extract()
}

/// Load from one explicit file plus env overrides, skipping the hierarchy.
pub fn load_config_from_path(path: &Path) -> Result<ChitterConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChitterConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Load from an inline TOML string (defaults underneath, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ChitterConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChitterConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// `CHITTER_<SECTION>_<KEY>` maps to `<section>.<key>`.
///
/// Only the first underscore after a known section name is a separator, so
/// `CHITTER_RELAY_AUTH_SECRET` becomes `relay.auth_secret`.
fn env_provider() -> Env {
    Env::prefixed("CHITTER_").map(|key| {
        let key = key.as_str();
        for section in ENV_SECTIONS {
            if let Some(rest) = key
                .strip_prefix(section)
                .and_then(|r| r.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key.to_string().into()
    })
}
