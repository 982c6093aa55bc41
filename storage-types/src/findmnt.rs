// SPDX-License-Identifier: GPL-3.0-only

//! Results of the secondary mount introspection (`findmnt`)

use serde::{Deserialize, Serialize};

/// One filesystem resolved for a target path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FoundMnt {
    /// Where the filesystem is mounted
    pub mounted_point: String,

    /// Source device followed by any bind sub-path
    /// (e.g. ["/dev/sda1", "/var/lib/kubelet"])
    pub sources: Vec<String>,

    pub fstype: String,

    pub size_humanized: String,
    pub size_bytes: u64,

    pub used_humanized: String,
    pub used_bytes: u64,

    pub available_humanized: String,
    pub available_bytes: u64,

    pub used_percent_humanized: String,
    pub used_percent: f64,
}

/// Every filesystem found for one queried target
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindMntOutput {
    pub target: String,
    pub filesystems: Vec<FoundMnt>,
}

impl FindMntOutput {
    /// Filesystem type of the first resolved filesystem, empty if none
    pub fn first_fstype(&self) -> &str {
        self.filesystems
            .first()
            .map(|fs| fs.fstype.as_str())
            .unwrap_or_default()
    }
}
