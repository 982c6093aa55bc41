// SPDX-License-Identifier: GPL-3.0-only

//! Filter policy applied while walking device trees and mount tables
//!
//! An [`Op`] bundles three predicates (filesystem type, device type, mount
//! point). A predicate that is not set matches everything. The ready-made
//! predicates below cover the usual host inventory policy.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use storage_types::BlockDevice;

/// Default bound on a single mount point existence check
pub const DEFAULT_STAT_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_NETWORK_FS_TYPES: &[&str] = &["nfs", "nfs4", "wekafs", "virtiofs", "lustre"];

pub const DEFAULT_RESERVED_MOUNT_PREFIXES: &[&str] = &["/mnt/cloud-metadata"];

const LOCAL_FS_TYPES: &[&str] = &[
    "ext2",
    "ext3",
    "ext4",
    "xfs",
    "btrfs",
    "zfs",
    "zfs_member",
    "f2fs",
    "LVM2_member",
    "linux_raid_member",
];

pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Filter policy for one discovery call
#[derive(Clone)]
pub struct Op {
    fstype: Option<Predicate>,
    device_type: Option<Predicate>,
    mount_point: Option<Predicate>,
    skip_usage: bool,
    stat_timeout: Duration,
}

impl Default for Op {
    fn default() -> Self {
        Self {
            fstype: None,
            device_type: None,
            mount_point: None,
            skip_usage: false,
            stat_timeout: DEFAULT_STAT_TIMEOUT,
        }
    }
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Op")
            .field("fstype", &self.fstype.is_some())
            .field("device_type", &self.device_type.is_some())
            .field("mount_point", &self.mount_point.is_some())
            .field("skip_usage", &self.skip_usage)
            .field("stat_timeout", &self.stat_timeout)
            .finish()
    }
}

impl Op {
    pub fn new() -> Self {
        Self::default()
    }

    /// Policy built from the default predicates
    pub fn with_default_predicates(
        network_fs_types: Vec<String>,
        reserved_mount_prefixes: Vec<String>,
    ) -> Self {
        Self::new()
            .with_fstype_filter(move |fstype| default_fstype(fstype, &network_fs_types))
            .with_device_type_filter(default_device_type)
            .with_mount_point_filter(move |mount_point| {
                default_mount_point(mount_point, &reserved_mount_prefixes)
            })
    }

    pub fn with_fstype_filter(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.fstype = Some(Arc::new(f));
        self
    }

    pub fn with_device_type_filter(
        mut self,
        f: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.device_type = Some(Arc::new(f));
        self
    }

    pub fn with_mount_point_filter(
        mut self,
        f: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.mount_point = Some(Arc::new(f));
        self
    }

    pub fn with_skip_usage(mut self, skip_usage: bool) -> Self {
        self.skip_usage = skip_usage;
        self
    }

    pub fn with_stat_timeout(mut self, stat_timeout: Duration) -> Self {
        self.stat_timeout = stat_timeout;
        self
    }

    pub fn matches_fstype(&self, fstype: &str) -> bool {
        self.fstype.as_ref().is_none_or(|f| f(fstype))
    }

    pub fn matches_device_type(&self, device_type: &str) -> bool {
        self.device_type.as_ref().is_none_or(|f| f(device_type))
    }

    pub fn matches_mount_point(&self, mount_point: &str) -> bool {
        self.mount_point.as_ref().is_none_or(|f| f(mount_point))
    }

    /// All three predicates hold for `dev`
    pub fn matches(&self, dev: &BlockDevice) -> bool {
        self.matches_fstype(&dev.fstype)
            && self.matches_device_type(&dev.device_type)
            && self.matches_mount_point(&dev.mount_point)
    }

    pub fn skip_usage(&self) -> bool {
        self.skip_usage
    }

    pub fn stat_timeout(&self) -> Duration {
        self.stat_timeout
    }
}

/// Disks, partitions, LVM volumes and RAID/MD arrays
pub fn default_device_type(device_type: &str) -> bool {
    matches!(device_type, "disk" | "part" | "lvm")
        || device_type.starts_with("raid")
        || device_type.starts_with("md")
}

/// Whole disks only
pub fn disk_device_type(device_type: &str) -> bool {
    device_type == "disk"
}

/// Unformatted layers, local filesystems, LVM/RAID members and `network_fs_types`
pub fn default_fstype(fstype: &str, network_fs_types: &[String]) -> bool {
    fstype.is_empty()
        || LOCAL_FS_TYPES.contains(&fstype)
        || network_fstype(fstype, network_fs_types)
}

pub fn network_fstype(fstype: &str, network_fs_types: &[String]) -> bool {
    !fstype.is_empty() && network_fs_types.iter().any(|t| t == fstype)
}

pub fn ext4_fstype(fstype: &str) -> bool {
    fstype == "ext4"
}

/// Rejects empty mount points and anything at or below a reserved prefix.
/// `/mnt/cloud-metadata-x` is not below `/mnt/cloud-metadata`.
pub fn default_mount_point(mount_point: &str, reserved_prefixes: &[String]) -> bool {
    if mount_point.is_empty() {
        return false;
    }
    !reserved_prefixes.iter().any(|prefix| {
        let prefix = prefix.trim_end_matches('/');
        !prefix.is_empty()
            && mount_point
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

pub fn default_network_fs_types() -> Vec<String> {
    DEFAULT_NETWORK_FS_TYPES.iter().map(|s| s.to_string()).collect()
}

pub fn default_reserved_mount_prefixes() -> Vec<String> {
    DEFAULT_RESERVED_MOUNT_PREFIXES
        .iter()
        .map(|s| s.to_string())
        .collect()
}
