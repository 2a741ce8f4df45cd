// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Log instance configuration: a JSON document enumerating the logs this
//! front-end serves. The registry built from it is immutable after startup.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for a single log instance.
#[derive(Debug, Deserialize)]
pub struct LogConfig {
    #[serde(rename = "LogID")]
    pub log_id: i64,
    /// URL path component the instance's endpoints are registered under.
    #[serde(rename = "Prefix")]
    pub prefix: String,
    #[serde(rename = "RootsPemFile")]
    pub roots_pem_file: PathBuf,
    #[serde(rename = "PrivateKeyFile")]
    pub private_key_file: PathBuf,
    #[serde(rename = "PrivateKeyPassword", default)]
    pub private_key_password: String,
}

/// Reads the log configuration file: a top-level JSON array of instances.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, or names
/// no instances.
pub fn load_config(path: &Path) -> anyhow::Result<Vec<LogConfig>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read log config {}", path.display()))?;
    let configs: Vec<LogConfig> =
        serde_json::from_str(&raw).context("invalid log config json")?;
    if configs.is_empty() {
        bail!("log config names no instances");
    }
    Ok(configs)
}
