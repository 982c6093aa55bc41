// SPDX-License-Identifier: GPL-3.0-only

//! Canonical data models for host disk inventory
//!
//! This crate defines the types produced by discovery and handed to whatever
//! evaluates host health:
//!
//! - **storage-sys**: Builds these types from `lsblk`, `findmnt` and the mount table
//! - **callers**: Serialize them as JSON or interpret them directly
//!
//! ## Architecture
//!
//! ### Tree Hierarchy
//! - `BlockDevice` → recursive device tree (disk → partition → LVM/RAID → ...)
//!
//! ### Flat Hierarchy
//! - `FlattenedBlockDevice` → one entry per device name with parent/child name sets
//! - `Partition` → mount table entry with optional capacity `Usage`
//!
//! Fields reported by external tools are decoded leniently (see [`coerce`]), so
//! one model covers every supported tool version.

pub mod block;
pub mod coerce;
pub mod common;
pub mod findmnt;
pub mod flatten;
pub mod partition;

pub use block::{BlockDevice, BlockDevices, MAX_RECURSION_DEPTH};
pub use common::{Usage, bytes_to_pretty, parse_flag, parse_percent, parse_size, pretty_to_bytes};
pub use findmnt::{FindMntOutput, FoundMnt};
pub use flatten::{FlattenedBlockDevice, FlattenedBlockDevices};
pub use partition::{DeviceUsage, Partition, Partitions};
