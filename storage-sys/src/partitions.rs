// SPDX-License-Identifier: GPL-3.0-only

//! Partition enumeration with time-bounded mount point checks
//!
//! Each mount point is checked with a blocking `stat` on a detached thread,
//! raced against the policy's stat timeout. A check that loses the race marks
//! the partition as timed out and unmounted. The thread is left to finish on
//! its own; the runtime never owns it, so a hung mount cannot hold up its
//! shutdown.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use storage_types::{Partition, Partitions, Usage};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::context::ScanContext;
use crate::error::{Result, SysError};
use crate::filter::Op;
use crate::mountinfo::{MOUNTINFO_PATH, read_mountinfo};
use crate::usage::usage_for_mount_point;

/// Blocking filesystem calls made per partition
pub trait MountProbe: Send + Sync + 'static {
    /// Succeeds when `mount_point` exists
    fn stat(&self, mount_point: &Path) -> io::Result<()>;

    fn usage(&self, mount_point: &Path) -> io::Result<Usage>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMountProbe;

impl MountProbe for SystemMountProbe {
    fn stat(&self, mount_point: &Path) -> io::Result<()> {
        std::fs::metadata(mount_point).map(|_| ())
    }

    fn usage(&self, mount_point: &Path) -> io::Result<Usage> {
        usage_for_mount_point(mount_point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Existence {
    Present,
    Missing,
    TimedOut,
    Unreachable,
}

/// Partition discovery over a mount table file
#[derive(Clone)]
pub struct PartitionDiscovery {
    probe: Arc<dyn MountProbe>,
    mountinfo_path: PathBuf,
}

impl Default for PartitionDiscovery {
    fn default() -> Self {
        Self::new(Arc::new(SystemMountProbe), PathBuf::from(MOUNTINFO_PATH))
    }
}

impl PartitionDiscovery {
    pub fn new(probe: Arc<dyn MountProbe>, mountinfo_path: PathBuf) -> Self {
        Self {
            probe,
            mountinfo_path,
        }
    }

    /// Partitions accepted by the policy's filesystem type and mount point
    /// predicates, sorted by descending capacity
    pub async fn discover(&self, ctx: &ScanContext, op: &Op) -> Result<Partitions> {
        let entries = ctx.run(read_mountinfo(&self.mountinfo_path)).await?;

        let mut partitions = Vec::new();
        for entry in entries {
            ctx.check()?;
            if !op.matches_fstype(&entry.fs_type) || !op.matches_mount_point(&entry.mount_point) {
                continue;
            }

            let mut partition = Partition {
                device: entry.source,
                fstype: entry.fs_type,
                mount_point: entry.mount_point,
                ..Default::default()
            };

            match self
                .check_exists(ctx, &partition.mount_point, op.stat_timeout())
                .await?
            {
                Existence::Present => partition.mounted = true,
                Existence::Missing => {
                    debug!(
                        "dropping {}: mount point {} does not exist",
                        partition.device, partition.mount_point
                    );
                    continue;
                }
                Existence::TimedOut => {
                    warn!(
                        "stat of {} timed out after {:?}, treating as not mounted",
                        partition.mount_point,
                        op.stat_timeout()
                    );
                    partition.stat_timed_out = true;
                }
                Existence::Unreachable => {}
            }

            if partition.mounted && !op.skip_usage() {
                match self.usage(ctx, &partition.mount_point).await {
                    Ok(usage) => partition.usage = Some(usage),
                    Err(SysError::Io(error)) if error.kind() == io::ErrorKind::NotFound => {
                        debug!(
                            "dropping {}: mount point {} vanished",
                            partition.device, partition.mount_point
                        );
                        continue;
                    }
                    Err(error) => return Err(error),
                }
            }

            partitions.push(partition);
        }

        let mut partitions = Partitions(partitions);
        partitions.sort_by_total_desc();
        Ok(partitions)
    }

    async fn check_exists(
        &self,
        ctx: &ScanContext,
        mount_point: &str,
        timeout: Duration,
    ) -> Result<Existence> {
        let probe = Arc::clone(&self.probe);
        let path = PathBuf::from(mount_point);
        let result = run_detached(move || probe.stat(&path))?;

        let raced = ctx
            .run(async { Ok::<_, SysError>(tokio::time::timeout(timeout, result).await) })
            .await?;

        match raced {
            Err(_) => Ok(Existence::TimedOut),
            Ok(Err(recv_error)) => Err(SysError::Io(io::Error::other(recv_error))),
            Ok(Ok(Ok(()))) => Ok(Existence::Present),
            Ok(Ok(Err(error))) if error.kind() == io::ErrorKind::NotFound => Ok(Existence::Missing),
            Ok(Ok(Err(error))) => {
                warn!("stat of {} failed: {}", mount_point, error);
                Ok(Existence::Unreachable)
            }
        }
    }

    async fn usage(&self, ctx: &ScanContext, mount_point: &str) -> Result<Usage> {
        let probe = Arc::clone(&self.probe);
        let path = PathBuf::from(mount_point);

        let result = run_detached(move || probe.usage(&path))?;

        ctx.run(async move {
            match result.await {
                Ok(usage) => usage.map_err(SysError::from),
                Err(error) => Err(SysError::Io(io::Error::other(error))),
            }
        })
        .await
    }
}

/// Run a blocking filesystem call on its own OS thread and hand back the
/// receiving end of its result.
fn run_detached<T, F>(call: F) -> Result<oneshot::Receiver<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("mount-probe".to_string())
        .spawn(move || {
            // The receiver is gone once the check timed out.
            let _ = tx.send(call());
        })?;
    Ok(rx)
}

/// Discover partitions from `/proc/self/mountinfo`
pub async fn discover_partitions(ctx: &ScanContext, op: &Op) -> Result<Partitions> {
    PartitionDiscovery::default().discover(ctx, op).await
}
