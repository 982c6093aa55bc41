// SPDX-License-Identifier: GPL-3.0-only

//! Host storage discovery for disk inventory
//!
//! This crate turns the output of host introspection tools into the models
//! from `storage-types`:
//! - Block device trees from `lsblk` (JSON or legacy key-value output)
//! - Filesystem type fallback through `findmnt`
//! - Partitions from the mount table, with time-bounded mount point checks
//!   and `statvfs` capacity
//!
//! Every operation takes a [`ScanContext`] (cancellation plus deadline) and a
//! filter policy [`Op`]. Tool access goes through the [`CommandRunner`],
//! [`FindMnt`] and [`MountProbe`] traits so callers and tests can substitute
//! their own.

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod findmnt;
pub mod fstype;
pub mod lsblk;
pub mod mountinfo;
pub mod partitions;
pub mod usage;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use config::DiscoveryConfig;
pub use context::ScanContext;
pub use error::{Result, SysError};
pub use filter::Op;
pub use findmnt::{FindMnt, FindMntCommand};
pub use fstype::FstypeResolver;
pub use lsblk::{
    BlockDeviceDiscovery, LsblkStrategy, discover_block_devices, discover_block_devices_flattened,
};
pub use mountinfo::{MountEntry, find_fs_type_and_device_by_minor, find_mount_target_device};
pub use partitions::{MountProbe, PartitionDiscovery, SystemMountProbe, discover_partitions};
