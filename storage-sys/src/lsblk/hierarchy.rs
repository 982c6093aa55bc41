// SPDX-License-Identifier: GPL-3.0-only

//! Filtering walk over a decoded device tree

use futures::FutureExt;
use futures::future::BoxFuture;
use storage_types::{BlockDevice, BlockDevices, MAX_RECURSION_DEPTH, bytes_to_pretty};
use tracing::debug;

use crate::context::ScanContext;
use crate::error::Result;
use crate::filter::Op;
use crate::fstype::FstypeResolver;

/// Prune `roots` with `op` and stamp every node with its parent's name.
///
/// A node survives if it matches all predicates itself or if any of its
/// children survived, so an unmounted LVM or RAID layer never hides a mounted
/// descendant. Roots come back sorted by name.
pub async fn prune(
    ctx: &ScanContext,
    op: &Op,
    resolver: &mut FstypeResolver<'_>,
    roots: Vec<BlockDevice>,
) -> Result<BlockDevices> {
    let mut kept = Vec::with_capacity(roots.len());
    for mut root in roots {
        if process_block_device(ctx, op, resolver, &mut root, None, 0).await? {
            kept.push(root);
        }
    }

    kept.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(BlockDevices(kept))
}

fn process_block_device<'a, 'r: 'a>(
    ctx: &'a ScanContext,
    op: &'a Op,
    resolver: &'a mut FstypeResolver<'r>,
    dev: &'a mut BlockDevice,
    parent: Option<&'a str>,
    depth: usize,
) -> BoxFuture<'a, Result<bool>> {
    async move {
        if depth > MAX_RECURSION_DEPTH {
            debug!(
                "dropping {}: nested deeper than {} levels",
                dev.name, MAX_RECURSION_DEPTH
            );
            return Ok(false);
        }

        if let Some(parent) = parent {
            dev.parent_device_name = parent.to_string();
        }
        dev.size_humanized = bytes_to_pretty(dev.size);

        let children = std::mem::take(&mut dev.children);
        let mut kept = Vec::with_capacity(children.len());
        for mut child in children {
            if process_block_device(
                ctx,
                op,
                &mut *resolver,
                &mut child,
                Some(dev.name.as_str()),
                depth + 1,
            )
            .await?
            {
                kept.push(child);
            }
        }
        dev.children = kept;

        if dev.fstype.is_empty() && !dev.mount_point.is_empty() {
            dev.fstype = resolver.resolve(ctx, &dev.mount_point).await?;
        }

        Ok(!dev.children.is_empty() || op.matches(dev))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{default_network_fs_types, default_reserved_mount_prefixes};
    use crate::lsblk::json;
    use crate::test_support::FakeFindMnt;

    fn defaults() -> Op {
        Op::with_default_predicates(default_network_fs_types(), default_reserved_mount_prefixes())
    }

    async fn prune_json(input: &str, op: &Op, findmnt: &FakeFindMnt) -> BlockDevices {
        let roots = json::decode(input.as_bytes()).expect("decode");
        let mut resolver = FstypeResolver::new(findmnt);
        prune(&ScanContext::default(), op, &mut resolver, roots)
            .await
            .expect("prune")
    }

    #[tokio::test]
    async fn keeps_mounted_partition_under_disk() {
        let input = r#"{"blockdevices":[{"name":"/dev/sda","type":"disk","children":[{"name":"/dev/sda1","type":"part","mountpoint":"/","fstype":"ext4"}]}]}"#;
        let findmnt = FakeFindMnt::new();
        let devs = prune_json(input, &defaults(), &findmnt).await;

        assert_eq!(devs.len(), 1);
        assert_eq!(devs[0].name, "/dev/sda");
        assert_eq!(devs[0].children.len(), 1);

        let sda1 = &devs[0].children[0];
        assert_eq!(sda1.name, "/dev/sda1");
        assert_eq!(sda1.mount_point, "/");
        assert_eq!(sda1.fstype, "ext4");
        assert_eq!(sda1.parent_device_name, "/dev/sda");
        assert_eq!(findmnt.call_count(), 0);
    }

    #[tokio::test]
    async fn fallback_fstype_lets_child_and_parent_survive() {
        let input = r#"{"blockdevices":[{"name":"/dev/nvme0n1","type":"disk","fstype":null,"mountpoint":null,"children":[{"name":"/dev/nvme0n1p1","type":"part","mountpoint":"/data","fstype":null}]}]}"#;
        let findmnt = FakeFindMnt::new().with_fstype("/data", "ext4");
        let devs = prune_json(input, &defaults(), &findmnt).await;

        assert_eq!(devs.len(), 1);
        assert_eq!(devs[0].name, "/dev/nvme0n1");
        assert_eq!(devs[0].fstype, "");
        assert_eq!(devs[0].children[0].fstype, "ext4");
        assert_eq!(findmnt.call_count(), 1);
    }

    #[tokio::test]
    async fn unmounted_intermediate_layers_do_not_hide_descendants() {
        let input = r#"{"blockdevices":[
            {"name":"/dev/sdb","type":"disk","children":[
                {"name":"/dev/sdb1","type":"part","fstype":"linux_raid_member","children":[
                    {"name":"/dev/md0","type":"raid1","fstype":"LVM2_member","children":[
                        {"name":"/dev/mapper/vg-data","type":"lvm","fstype":"xfs","mountpoint":"/srv"}
                    ]}
                ]},
                {"name":"/dev/sdb2","type":"part","fstype":"swap"}
            ]},
            {"name":"/dev/loop0","type":"loop","fstype":"squashfs","mountpoint":"/snap/core/1"}
        ]}"#;
        let findmnt = FakeFindMnt::new();
        let devs = prune_json(input, &defaults(), &findmnt).await;

        assert_eq!(devs.len(), 1);
        let sdb = &devs[0];
        assert_eq!(sdb.children.len(), 1);
        let md0 = &sdb.children[0].children[0];
        assert_eq!(md0.parent_device_name, "/dev/sdb1");
        assert_eq!(md0.children[0].name, "/dev/mapper/vg-data");
        assert_eq!(md0.children[0].parent_device_name, "/dev/md0");
    }

    #[tokio::test]
    async fn populated_fstype_is_never_replaced() {
        let input = r#"{"blockdevices":[{"name":"/dev/sda","type":"disk","mountpoint":"/mnt/x","fstype":"xfs"}]}"#;
        let findmnt = FakeFindMnt::new().with_fstype("/mnt/x", "ext4");
        let devs = prune_json(input, &Op::new(), &findmnt).await;

        assert_eq!(devs[0].fstype, "xfs");
        assert_eq!(findmnt.call_count(), 0);
    }

    #[tokio::test]
    async fn repeated_mount_points_hit_findmnt_once() {
        let input = r#"{"blockdevices":[
            {"name":"/dev/sda","type":"disk","mountpoint":"/shared"},
            {"name":"/dev/sdb","type":"disk","mountpoint":"/shared"},
            {"name":"/dev/sdc","type":"disk","mountpoint":"/shared"}
        ]}"#;
        let findmnt = FakeFindMnt::new().with_fstype("/shared", "nfs4");
        let devs = prune_json(input, &defaults(), &findmnt).await;

        assert_eq!(devs.len(), 3);
        assert!(devs.iter().all(|dev| dev.fstype == "nfs4"));
        assert_eq!(findmnt.call_count(), 1);
    }

    #[tokio::test]
    async fn roots_are_sorted_and_humanized() {
        let input = r#"{"blockdevices":[
            {"name":"/dev/sdb","type":"disk","size":1000},
            {"name":"/dev/sda","type":"disk","size":"63.9M"}
        ]}"#;
        let devs = prune_json(input, &Op::new(), &FakeFindMnt::new()).await;

        assert_eq!(devs[0].name, "/dev/sda");
        assert_eq!(devs[0].size_humanized, "64 MB");
        assert_eq!(devs[1].size_humanized, "1.0 kB");
        assert!(devs[0].parent_device_name.is_empty());
    }

    fn chain(levels: usize) -> BlockDevice {
        let mut node = BlockDevice {
            name: format!("/dev/n{levels}"),
            device_type: "disk".into(),
            mount_point: "/leaf".into(),
            fstype: "ext4".into(),
            ..Default::default()
        };
        for level in (0..levels).rev() {
            node = BlockDevice {
                name: format!("/dev/n{level}"),
                device_type: "disk".into(),
                children: vec![node],
                ..Default::default()
            };
        }
        node
    }

    #[tokio::test]
    async fn subtrees_past_the_depth_ceiling_are_dropped() {
        let findmnt = FakeFindMnt::new();
        let op = defaults();

        // Leaf at depth 30: the only matching node is out of reach.
        let mut resolver = FstypeResolver::new(&findmnt);
        let devs = prune(&ScanContext::default(), &op, &mut resolver, vec![chain(30)])
            .await
            .expect("prune");
        assert!(devs.is_empty());

        // Leaf exactly at the ceiling is kept with every ancestor.
        let mut resolver = FstypeResolver::new(&findmnt);
        let devs = prune(
            &ScanContext::default(),
            &op,
            &mut resolver,
            vec![chain(MAX_RECURSION_DEPTH)],
        )
        .await
        .expect("prune");
        assert_eq!(devs.len(), 1);
        let leaf_name = format!("/dev/n{MAX_RECURSION_DEPTH}");
        assert!(devs.find(&leaf_name).is_some());
    }
}
