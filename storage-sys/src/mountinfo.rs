// SPDX-License-Identifier: GPL-3.0-only

//! Raw mount table (`/proc/self/mountinfo`) parsing and lookups

use std::path::Path;

use tracing::debug;

use crate::error::Result;

pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Entries ignored by the mount table lookups
const SKIPPED_FS_TYPES: &[&str] = &["overlay", "tmpfs", "shm"];

/// One line of the mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub major: u32,
    pub minor: u32,
    pub mount_point: String,
    pub fs_type: String,
    /// Mount source, usually a device path
    pub source: String,
}

impl MountEntry {
    fn is_skipped(&self) -> bool {
        SKIPPED_FS_TYPES.contains(&self.fs_type.as_str())
            || SKIPPED_FS_TYPES.contains(&self.source.as_str())
    }
}

/// Read and parse the mount table at `path`
pub async fn read_mountinfo(path: &Path) -> Result<Vec<MountEntry>> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(parse_mountinfo(&raw))
}

/// Mount table entry serving `target`, read from the table at `path`
pub async fn lookup_mount_target(path: &Path, target: &str) -> Result<Option<MountEntry>> {
    let entries = read_mountinfo(path).await?;
    Ok(find_mount_target_device(&entries, target).cloned())
}

/// Mount table entry for a device minor number, read from the table at `path`
pub async fn lookup_mount_by_minor(path: &Path, minor: u32) -> Result<Option<MountEntry>> {
    let entries = read_mountinfo(path).await?;
    Ok(find_fs_type_and_device_by_minor(&entries, minor).cloned())
}

/// Parse mountinfo text, skipping lines that do not have the expected shape.
pub fn parse_mountinfo(input: &str) -> Vec<MountEntry> {
    input
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let entry = parse_line(line);
            if entry.is_none() {
                debug!("skipping malformed mountinfo line: {:?}", line);
            }
            entry
        })
        .collect()
}

// 36 35 98:0 /mnt1 /mnt2 rw,noatime master:1 - ext3 /dev/root rw,errors=continue
fn parse_line(line: &str) -> Option<MountEntry> {
    let (left, right) = line.split_once(" - ")?;

    let left_fields: Vec<&str> = left.split_whitespace().collect();
    if left_fields.len() < 5 {
        return None;
    }
    let (major, minor) = left_fields[2].split_once(':')?;

    let mut right_fields = right.split_whitespace();
    let fs_type = right_fields.next()?;
    let source = right_fields.next().unwrap_or_default();

    Some(MountEntry {
        major: major.parse().ok()?,
        minor: minor.parse().ok()?,
        mount_point: unescape_mount_field(left_fields[4]),
        fs_type: fs_type.to_string(),
        source: unescape_mount_field(source),
    })
}

/// First entry whose mount point starts with `target`
pub fn find_mount_target_device<'a>(
    entries: &'a [MountEntry],
    target: &str,
) -> Option<&'a MountEntry> {
    entries
        .iter()
        .filter(|entry| !entry.is_skipped())
        .find(|entry| entry.mount_point.starts_with(target))
}

/// First entry mounted from a device with the given minor number
pub fn find_fs_type_and_device_by_minor(
    entries: &[MountEntry],
    minor: u32,
) -> Option<&MountEntry> {
    entries
        .iter()
        .filter(|entry| !entry.is_skipped())
        .find(|entry| entry.minor == minor)
}

fn unescape_mount_field(value: &str) -> String {
    let mut output = Vec::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..index + 4].iter().all(|b| (b'0'..=b'7').contains(b))
            && let Ok(num) = u8::from_str_radix(&value[index + 1..index + 4], 8)
        {
            output.push(num);
            index += 4;
            continue;
        }

        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}
