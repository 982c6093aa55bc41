// SPDX-License-Identifier: GPL-3.0-only

use std::cmp::Ordering;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::common::Usage;

/// A mounted (or formerly mounted) partition from the host mount table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Source device path (e.g. "/dev/sda1")
    pub device: String,

    pub fstype: String,

    pub mount_point: String,

    /// Mount point answered the existence check in time
    pub mounted: bool,

    /// Existence check did not complete before its timeout
    pub stat_timed_out: bool,

    /// Capacity statistics, absent when skipped or not mounted
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Partitions(pub Vec<Partition>);

impl Partitions {
    /// Total capacity of the mounted partitions that carry usage data
    pub fn mounted_total_bytes(&self) -> u64 {
        self.0
            .iter()
            .filter(|part| part.mounted)
            .filter_map(|part| part.usage.as_ref())
            .map(|usage| usage.total_bytes)
            .sum()
    }

    /// Sort by descending total capacity; partitions without usage go last.
    pub fn sort_by_total_desc(&mut self) {
        self.0.sort_by(|a, b| match (&a.usage, &b.usage) {
            (Some(a), Some(b)) => b.total_bytes.cmp(&a.total_bytes),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }

    /// Look up a partition by its mount point
    pub fn by_mount_point(&self, mount_point: &str) -> Option<&Partition> {
        self.0.iter().find(|part| part.mount_point == mount_point)
    }
}

impl Deref for Partitions {
    type Target = [Partition];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Partition>> for Partitions {
    fn from(parts: Vec<Partition>) -> Self {
        Self(parts)
    }
}

/// Capacity of one block device joined through its mount point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceUsage {
    pub device_name: String,
    pub mount_point: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}
