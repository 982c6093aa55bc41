// SPDX-License-Identifier: GPL-3.0-only

//! TOML configuration for discovery calls
//!
//! ```toml
//! [filter]
//! use_default_predicates = true
//! network_fs_types = ["nfs", "nfs4", "lustre"]
//! reserved_mount_prefixes = ["/mnt/cloud-metadata"]
//!
//! [partitions]
//! skip_usage = false
//! stat_timeout_ms = 5000
//!
//! [scan]
//! timeout_secs = 30
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::context::ScanContext;
use crate::error::{Result, SysError};
use crate::filter::{
    DEFAULT_STAT_TIMEOUT, Op, default_network_fs_types, default_reserved_mount_prefixes,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub filter: FilterConfig,
    pub partitions: PartitionConfig,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// When false every device, filesystem and mount point matches
    pub use_default_predicates: bool,
    pub network_fs_types: Vec<String>,
    pub reserved_mount_prefixes: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            use_default_predicates: true,
            network_fs_types: default_network_fs_types(),
            reserved_mount_prefixes: default_reserved_mount_prefixes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub skip_usage: bool,
    pub stat_timeout_ms: u64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            skip_usage: false,
            stat_timeout_ms: DEFAULT_STAT_TIMEOUT.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Overall deadline for one discovery call
    pub timeout_secs: Option<u64>,
}

impl DiscoveryConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|error| SysError::Config {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        toml::from_str(&raw).map_err(|error| SysError::Config {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })
    }

    /// Filter policy described by this configuration
    pub fn op(&self) -> Op {
        let op = if self.filter.use_default_predicates {
            Op::with_default_predicates(
                self.filter.network_fs_types.clone(),
                self.filter.reserved_mount_prefixes.clone(),
            )
        } else {
            Op::new()
        };

        op.with_skip_usage(self.partitions.skip_usage)
            .with_stat_timeout(Duration::from_millis(self.partitions.stat_timeout_ms))
    }

    pub fn context(&self, token: CancellationToken) -> ScanContext {
        let ctx = ScanContext::new(token);
        match self.scan.timeout_secs {
            Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
            None => ctx,
        }
    }
}
