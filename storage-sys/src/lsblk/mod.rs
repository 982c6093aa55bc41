// SPDX-License-Identifier: GPL-3.0-only

//! Block device discovery through `lsblk`
//!
//! The tool's version decides between JSON and legacy key-value output
//! ([`LsblkStrategy`]). Both decode to the same raw tree, which
//! [`hierarchy::prune`] filters, re-parents and completes with filesystem
//! types from `findmnt` where `lsblk` reported none.

pub mod hierarchy;
pub mod json;
pub mod pairs;
pub mod strategy;

use std::sync::Arc;

use storage_types::{BlockDevices, FlattenedBlockDevices};
use tracing::{debug, warn};

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::context::ScanContext;
use crate::error::{Result, SysError};
use crate::filter::Op;
use crate::findmnt::{FindMnt, FindMntCommand};
use crate::fstype::FstypeResolver;

pub use strategy::LsblkStrategy;

pub const LSBLK: &str = "lsblk";

/// Block device discovery with injectable tool access
#[derive(Clone)]
pub struct BlockDeviceDiscovery {
    runner: Arc<dyn CommandRunner>,
    findmnt: Arc<dyn FindMnt>,
}

impl Default for BlockDeviceDiscovery {
    fn default() -> Self {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemCommandRunner);
        Self {
            findmnt: Arc::new(FindMntCommand::new(Arc::clone(&runner))),
            runner,
        }
    }
}

impl BlockDeviceDiscovery {
    pub fn new(runner: Arc<dyn CommandRunner>, findmnt: Arc<dyn FindMnt>) -> Self {
        Self { runner, findmnt }
    }

    /// Ask `lsblk` for its version and pick the matching output format
    pub async fn detect_strategy(&self, ctx: &ScanContext) -> Result<LsblkStrategy> {
        let output = self
            .runner
            .run(ctx, LSBLK, &["--version".to_string()])
            .await?;
        LsblkStrategy::from_version(&output.combined())
    }

    /// Pruned block device tree
    pub async fn discover(&self, ctx: &ScanContext, op: &Op) -> Result<BlockDevices> {
        ctx.check()?;

        let strategy = match self.detect_strategy(ctx).await {
            Ok(strategy) => strategy,
            Err(SysError::Cancelled) => return Err(SysError::Cancelled),
            Err(error) => {
                warn!(
                    "failed to decide lsblk flags, falling back to JSON output: {}",
                    error
                );
                LsblkStrategy::Json
            }
        };
        debug!("using lsblk {:?} output", strategy);

        let output = self.runner.run(ctx, LSBLK, &strategy.args()).await?;
        let roots = strategy.parse(&output.stdout)?;

        let mut resolver = FstypeResolver::new(self.findmnt.as_ref());
        hierarchy::prune(ctx, op, &mut resolver, roots).await
    }

    /// Pruned block devices as a flat, name-sorted list
    pub async fn discover_flattened(
        &self,
        ctx: &ScanContext,
        op: &Op,
    ) -> Result<FlattenedBlockDevices> {
        Ok(self.discover(ctx, op).await?.flatten())
    }
}

/// Discover block devices with the host's `lsblk` and `findmnt`
pub async fn discover_block_devices(ctx: &ScanContext, op: &Op) -> Result<BlockDevices> {
    BlockDeviceDiscovery::default().discover(ctx, op).await
}

/// Flattened form of [`discover_block_devices`]
pub async fn discover_block_devices_flattened(
    ctx: &ScanContext,
    op: &Op,
) -> Result<FlattenedBlockDevices> {
    BlockDeviceDiscovery::default()
        .discover_flattened(ctx, op)
        .await
}
