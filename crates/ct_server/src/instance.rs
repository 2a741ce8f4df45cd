// Copyright (c) 2025 Cloudflare, Inc.
// Licensed under the BSD-3-Clause license found in the LICENSE file or at https://opensource.org/licenses/BSD-3-Clause

//! Per-log state and the instance registry. A [`LogInstance`] is immutable
//! after construction; each HTTP route is bound to exactly one instance.

use anyhow::{bail, Context};
use axum::Router;
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tracing::info;
use x509_util::CertPool;

use crate::backend::{LogBackend, RequestContext};
use crate::config::LogConfig;
use crate::handlers;
use crate::keys::{EcdsaKeyManager, KeyManager};
use crate::util::TimeSource;

/// Everything one log needs to serve requests. Shared read-only across the
/// handler tasks.
pub struct LogInstance {
    pub log_id: i64,
    pub prefix: String,
    pub roots: CertPool,
    pub key_manager: Arc<dyn KeyManager>,
    pub backend: Arc<dyn LogBackend>,
    /// How long backend work on behalf of one request may take.
    pub deadline: Duration,
    pub time_source: Arc<dyn TimeSource>,
}

impl LogInstance {
    /// Builds the context every backend call on behalf of one HTTP request
    /// must carry.
    pub fn request_context(&self) -> RequestContext {
        RequestContext {
            deadline: self.time_source.now() + self.deadline,
        }
    }

    /// Current time in milliseconds since the Unix epoch, per the instance's
    /// time source. `None` if the clock reads before the epoch.
    pub fn now_millis(&self) -> Option<u64> {
        let elapsed = self.time_source.now().duration_since(UNIX_EPOCH).ok()?;
        u64::try_from(elapsed.as_millis()).ok()
    }
}

/// Loads one instance from its configuration: accepted roots from PEM and
/// the signing key, failing startup on any problem.
pub fn setup_instance(
    config: &LogConfig,
    backend: Arc<dyn LogBackend>,
    deadline: Duration,
    time_source: Arc<dyn TimeSource>,
) -> anyhow::Result<Arc<LogInstance>> {
    if config.prefix.is_empty() {
        bail!("log {} has an empty prefix", config.log_id);
    }

    let pem = fs::read(&config.roots_pem_file).with_context(|| {
        format!(
            "failed to read roots for {} from {}",
            config.prefix,
            config.roots_pem_file.display()
        )
    })?;
    let mut roots = CertPool::new();
    if !roots.append_certs_from_pem(&pem) || roots.is_empty() {
        bail!(
            "failed to load accepted roots for {} from {}",
            config.prefix,
            config.roots_pem_file.display()
        );
    }

    let key_pem = fs::read_to_string(&config.private_key_file).with_context(|| {
        format!(
            "failed to read private key for {} from {}",
            config.prefix,
            config.private_key_file.display()
        )
    })?;
    let key_manager = EcdsaKeyManager::load_pem(&key_pem, &config.private_key_password)
        .with_context(|| format!("failed to load private key for {}", config.prefix))?;

    Ok(Arc::new(LogInstance {
        log_id: config.log_id,
        prefix: config.prefix.clone(),
        roots,
        key_manager: Arc::new(key_manager),
        backend,
        deadline,
        time_source,
    }))
}

/// Builds the full HTTP router: one set of `/ct/v1` endpoints per configured
/// log instance, registered under the instance prefix.
pub fn build_registry(
    configs: &[LogConfig],
    backend: Arc<dyn LogBackend>,
    deadline: Duration,
    time_source: Arc<dyn TimeSource>,
) -> anyhow::Result<Router> {
    let mut router = Router::new();
    let mut prefixes = HashSet::new();
    for config in configs {
        if !prefixes.insert(config.prefix.clone()) {
            bail!("duplicate log prefix {}", config.prefix);
        }
        let instance = setup_instance(config, backend.clone(), deadline, time_source.clone())?;
        info!(
            prefix = %instance.prefix,
            log_id = instance.log_id,
            roots = instance.roots.len(),
            "registered log instance"
        );
        router = router.merge(handlers::router(instance));
    }
    Ok(router)
}
