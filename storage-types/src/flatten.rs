// SPDX-License-Identifier: GPL-3.0-only

//! Flat, name-addressable view of a block device tree

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::block::{BlockDevice, BlockDevices, MAX_RECURSION_DEPTH};
use crate::partition::{DeviceUsage, Partitions};

/// A block device without nested children.
///
/// A device shared by several parents (e.g. a physical volume backing more
/// than one logical volume) appears once with every parent listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedBlockDevice {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub size: u64,
    pub size_humanized: String,
    pub rota: bool,
    pub serial: String,
    pub wwn: String,
    pub vendor: String,
    pub model: String,
    pub rev: String,
    #[serde(rename = "mountpoint")]
    pub mount_point: String,
    pub fstype: String,
    pub fsused: u64,
    pub partuuid: String,
    pub parents: BTreeSet<String>,
    pub children: BTreeSet<String>,
}

impl FlattenedBlockDevice {
    fn from_node(dev: &BlockDevice) -> Self {
        Self {
            name: dev.name.clone(),
            device_type: dev.device_type.clone(),
            size: dev.size,
            size_humanized: dev.size_humanized.clone(),
            rota: dev.rota,
            serial: dev.serial.clone(),
            wwn: dev.wwn.clone(),
            vendor: dev.vendor.clone(),
            model: dev.model.clone(),
            rev: dev.rev.clone(),
            mount_point: dev.mount_point.clone(),
            fstype: dev.fstype.clone(),
            fsused: dev.fsused,
            partuuid: dev.partuuid.clone(),
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }
}

/// Flattened devices sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlattenedBlockDevices(pub Vec<FlattenedBlockDevice>);

impl BlockDevices {
    /// Flatten the tree into a de-duplicated list keyed by device name
    pub fn flatten(&self) -> FlattenedBlockDevices {
        let mut by_name = BTreeMap::new();
        for dev in self.iter() {
            flatten_into(dev, None, 0, &mut by_name);
        }
        FlattenedBlockDevices(by_name.into_values().collect())
    }
}

// Post-order: children land in the map before their parent.
fn flatten_into(
    dev: &BlockDevice,
    parent: Option<&str>,
    depth: usize,
    by_name: &mut BTreeMap<String, FlattenedBlockDevice>,
) {
    if depth > MAX_RECURSION_DEPTH {
        return;
    }

    for child in &dev.children {
        flatten_into(child, Some(&dev.name), depth + 1, by_name);
    }

    let entry = by_name
        .entry(dev.name.clone())
        .or_insert_with(|| FlattenedBlockDevice::from_node(dev));

    if let Some(parent) = parent {
        entry.parents.insert(parent.to_string());
    }
    if depth < MAX_RECURSION_DEPTH {
        entry
            .children
            .extend(dev.children.iter().map(|child| child.name.clone()));
    }
}

impl FlattenedBlockDevices {
    /// Join devices to partition usage by mount point, keeping device order.
    pub fn device_usages(&self, partitions: &Partitions) -> Vec<DeviceUsage> {
        let usage_by_mount: HashMap<&str, _> = partitions
            .iter()
            .filter_map(|part| part.usage.map(|usage| (part.mount_point.as_str(), usage)))
            .collect();

        self.0
            .iter()
            .filter(|dev| !dev.mount_point.is_empty())
            .filter_map(|dev| {
                let usage = usage_by_mount.get(dev.mount_point.as_str())?;
                Some(DeviceUsage {
                    device_name: dev.name.clone(),
                    mount_point: dev.mount_point.clone(),
                    total_bytes: usage.total_bytes,
                    used_bytes: usage.used_bytes,
                    free_bytes: usage.free_bytes,
                })
            })
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<&FlattenedBlockDevice> {
        self.0.iter().find(|dev| dev.name == name)
    }
}

impl Deref for FlattenedBlockDevices {
    type Target = [FlattenedBlockDevice];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Usage;
    use crate::partition::Partition;

    fn node(name: &str, children: Vec<BlockDevice>) -> BlockDevice {
        BlockDevice {
            name: name.into(),
            device_type: "disk".into(),
            children,
            ..Default::default()
        }
    }

    #[test]
    fn shared_device_keeps_every_parent() {
        // Two disks whose partitions back the same LVM volume.
        let devs = BlockDevices(vec![
            node("/dev/sda", vec![node("/dev/sda1", vec![node("/dev/mapper/vg-lv", vec![])])]),
            node("/dev/sdb", vec![node("/dev/sdb1", vec![node("/dev/mapper/vg-lv", vec![])])]),
        ]);

        let flat = devs.flatten();
        let names: Vec<&str> = flat.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["/dev/mapper/vg-lv", "/dev/sda", "/dev/sda1", "/dev/sdb", "/dev/sdb1"]
        );

        let lv = flat.find("/dev/mapper/vg-lv").expect("lv present");
        assert_eq!(
            lv.parents.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["/dev/sda1", "/dev/sdb1"]
        );
        assert!(lv.children.is_empty());

        let sda = flat.find("/dev/sda").expect("sda present");
        assert!(sda.parents.is_empty());
        assert!(sda.children.contains("/dev/sda1"));
    }

    #[test]
    fn flatten_stops_at_depth_ceiling() {
        let mut chain = node("n30", vec![]);
        for level in (0..30).rev() {
            chain = node(&format!("n{level:02}"), vec![chain]);
        }
        let flat = BlockDevices(vec![chain]).flatten();

        assert_eq!(flat.len(), MAX_RECURSION_DEPTH + 1);
        let deepest = flat.find("n20").expect("deepest kept node");
        assert!(deepest.children.is_empty());
        assert!(flat.find("n21").is_none());
    }

    #[test]
    fn device_usages_join_on_mount_point() {
        let mut sda1 = node("/dev/sda1", vec![]);
        sda1.mount_point = "/".into();
        let mut sda2 = node("/dev/sda2", vec![]);
        sda2.mount_point = "/data".into();
        let flat = BlockDevices(vec![node("/dev/sda", vec![sda1, sda2])]).flatten();

        let partitions = Partitions(vec![
            Partition {
                device: "/dev/sda1".into(),
                mount_point: "/".into(),
                mounted: true,
                usage: Some(Usage {
                    total_bytes: 100,
                    free_bytes: 40,
                    used_bytes: 60,
                }),
                ..Default::default()
            },
            Partition {
                device: "/dev/sda2".into(),
                mount_point: "/data".into(),
                ..Default::default()
            },
        ]);

        let usages = flat.device_usages(&partitions);
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].device_name, "/dev/sda1");
        assert_eq!(usages[0].used_bytes, 60);
    }
}
