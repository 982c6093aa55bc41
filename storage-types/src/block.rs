// SPDX-License-Identifier: GPL-3.0-only

//! Block device tree as reported by `lsblk`

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::coerce;

/// Deepest nesting level visited when walking a device tree.
///
/// Roots are depth 0; nodes below this level are dropped.
pub const MAX_RECURSION_DEPTH: usize = 20;

/// One node in the block device tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Device path (e.g. "/dev/sda1")
    #[serde(default, deserialize_with = "coerce::null_default")]
    pub name: String,

    /// Name of the immediate parent, empty for roots
    #[serde(default, deserialize_with = "coerce::null_default")]
    pub parent_device_name: String,

    /// Device class ("disk", "part", "lvm", "raid1", ...)
    #[serde(rename = "type", default, deserialize_with = "coerce::null_default")]
    pub device_type: String,

    /// Size in bytes
    #[serde(default, deserialize_with = "coerce::bytes")]
    pub size: u64,

    #[serde(default, deserialize_with = "coerce::null_default")]
    pub size_humanized: String,

    /// Rotational media
    #[serde(default, deserialize_with = "coerce::flag")]
    pub rota: bool,

    #[serde(default, deserialize_with = "coerce::null_default")]
    pub serial: String,

    #[serde(default, deserialize_with = "coerce::null_default")]
    pub wwn: String,

    #[serde(default, deserialize_with = "coerce::null_default")]
    pub vendor: String,

    #[serde(default, deserialize_with = "coerce::null_default")]
    pub model: String,

    /// Firmware revision
    #[serde(default, deserialize_with = "coerce::null_default")]
    pub rev: String,

    #[serde(
        rename = "mountpoint",
        default,
        deserialize_with = "coerce::null_default"
    )]
    pub mount_point: String,

    #[serde(default, deserialize_with = "coerce::null_default")]
    pub fstype: String,

    /// Bytes used by the filesystem on this device
    #[serde(default, deserialize_with = "coerce::bytes")]
    pub fsused: u64,

    #[serde(default, deserialize_with = "coerce::null_default")]
    pub partuuid: String,

    /// Parent kernel name from legacy pairs output
    #[serde(skip_serializing, default, deserialize_with = "coerce::null_default")]
    pub pkname: String,

    #[serde(default, deserialize_with = "coerce::null_default")]
    pub children: Vec<BlockDevice>,
}

/// Root-level block devices of one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockDevices(pub Vec<BlockDevice>);

impl BlockDevices {
    /// Sum of the sizes of all root devices
    pub fn total_bytes(&self) -> u64 {
        self.0.iter().map(|dev| dev.size).sum()
    }

    /// Depth-first search for a device by name
    pub fn find(&self, name: &str) -> Option<&BlockDevice> {
        fn walk<'a>(devs: &'a [BlockDevice], name: &str) -> Option<&'a BlockDevice> {
            devs.iter().find_map(|dev| {
                if dev.name == name {
                    Some(dev)
                } else {
                    walk(&dev.children, name)
                }
            })
        }
        walk(&self.0, name)
    }
}

impl Deref for BlockDevices {
    type Target = [BlockDevice];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<BlockDevice>> for BlockDevices {
    fn from(devs: Vec<BlockDevice>) -> Self {
        Self(devs)
    }
}

impl FromIterator<BlockDevice> for BlockDevices {
    fn from_iter<I: IntoIterator<Item = BlockDevice>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for BlockDevices {
    type Item = BlockDevice;
    type IntoIter = std::vec::IntoIter<BlockDevice>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nulls_and_mixed_encodings() {
        let json = r#"{
            "name": "/dev/nvme0n1",
            "type": "disk",
            "size": "63.9M",
            "rota": "0",
            "serial": null,
            "wwn": null,
            "vendor": null,
            "model": "Samsung SSD 970",
            "rev": null,
            "mountpoint": null,
            "fstype": null,
            "fsused": null,
            "partuuid": null,
            "children": null
        }"#;

        let dev: BlockDevice = serde_json::from_str(json).expect("device should decode");
        assert_eq!(dev.name, "/dev/nvme0n1");
        assert_eq!(dev.device_type, "disk");
        assert_eq!(dev.size, 63_900_000);
        assert!(!dev.rota);
        assert_eq!(dev.model, "Samsung SSD 970");
        assert!(dev.mount_point.is_empty());
        assert!(dev.children.is_empty());
    }

    #[test]
    fn pkname_is_not_serialized() {
        let dev = BlockDevice {
            name: "/dev/sda1".into(),
            pkname: "/dev/sda".into(),
            ..Default::default()
        };
        let json = serde_json::to_string(&dev).expect("serialize");
        assert!(!json.contains("pkname"));
        assert!(json.contains(r#""type":"""#));
        assert!(json.contains(r#""mountpoint":"""#));
    }

    #[test]
    fn total_bytes_counts_roots_only() {
        let devs = BlockDevices(vec![
            BlockDevice {
                name: "/dev/sda".into(),
                size: 100,
                children: vec![BlockDevice {
                    name: "/dev/sda1".into(),
                    size: 60,
                    ..Default::default()
                }],
                ..Default::default()
            },
            BlockDevice {
                name: "/dev/sdb".into(),
                size: 50,
                ..Default::default()
            },
        ]);

        assert_eq!(devs.total_bytes(), 150);
        assert_eq!(devs.find("/dev/sda1").map(|d| d.size), Some(60));
        assert!(devs.find("/dev/sdc").is_none());
    }
}
