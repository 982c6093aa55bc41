// SPDX-License-Identifier: GPL-3.0-only

//! `lsblk --pairs` output from releases without JSON support
//!
//! Every line describes one device as `KEY="value"` pairs. The tree is rebuilt
//! from the `PKNAME` parent reference, then re-encoded as the JSON document
//! newer releases print so both formats share one decoder.

use std::iter::Peekable;
use std::str::Chars;

use serde_json::Map;
use storage_types::{BlockDevice, MAX_RECURSION_DEPTH, parse_flag, parse_size};
use tracing::debug;

use super::json::{self, OUTPUT_KEY};
use crate::error::{Result, SysError};

/// Decode `lsblk --pairs` output into the raw device tree.
pub fn decode(output: &[u8]) -> Result<Vec<BlockDevice>> {
    if output.iter().all(u8::is_ascii_whitespace) {
        return Err(SysError::EmptyInput);
    }

    let text = std::str::from_utf8(output).map_err(|error| SysError::parse(output, error))?;

    let records = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            parse_line(line).map_err(|reason| {
                debug!("failed to parse lsblk pairs line {}: {:?}", index + 1, line);
                SysError::parse(output, format!("line {}: {}", index + 1, reason))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let roots = build_hierarchy(records);
    if roots.is_empty() {
        return Err(SysError::HierarchyBuildFailed);
    }

    let roots = serde_json::to_value(&roots).map_err(|error| SysError::parse(output, error))?;
    let mut document = Map::new();
    document.insert(OUTPUT_KEY.to_string(), roots);
    let canonical =
        serde_json::to_vec(&document).map_err(|error| SysError::parse(output, error))?;

    json::decode(&canonical)
}

fn parse_line(line: &str) -> std::result::Result<BlockDevice, String> {
    let mut dev = BlockDevice::default();

    for (key, value) in tokenize(line)? {
        match key.as_str() {
            "NAME" => dev.name = value,
            "TYPE" => dev.device_type = value,
            "SIZE" => dev.size = parse_size(&value).map_err(|error| error.to_string())?,
            "ROTA" => dev.rota = parse_flag(&value).map_err(|error| error.to_string())?,
            "SERIAL" => dev.serial = value,
            "WWN" => dev.wwn = value,
            "VENDOR" => dev.vendor = value,
            "MODEL" => dev.model = value,
            "REV" => dev.rev = value,
            "MOUNTPOINT" => dev.mount_point = value,
            "FSTYPE" => dev.fstype = value,
            "FSUSED" => dev.fsused = parse_size(&value).map_err(|error| error.to_string())?,
            "PARTUUID" => dev.partuuid = value,
            "PKNAME" => dev.pkname = value,
            _ => {}
        }
    }

    Ok(dev)
}

fn tokenize(line: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Ok(pairs);
        }

        let mut key = String::new();
        let mut has_value = false;
        while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
            if c == '=' {
                has_value = true;
                break;
            }
            key.push(c);
        }
        if !has_value || key.is_empty() {
            return Err(format!("expected KEY=\"value\", found {key:?}"));
        }

        let value = if chars.next_if_eq(&'"').is_some() {
            quoted_value(&mut chars).ok_or_else(|| format!("unterminated value for {key}"))?
        } else {
            let mut value = String::new();
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                value.push(c);
            }
            value
        };

        pairs.push((key, value));
    }
}

// Reads up to the closing quote, decoding `\xNN` escapes.
fn quoted_value(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut bytes = Vec::new();
    let mut buf = [0_u8; 4];

    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(String::from_utf8_lossy(&bytes).into_owned()),
            '\\' => match chars.next()? {
                'x' => {
                    let hex: String = (0..2)
                        .filter_map(|_| chars.next_if(|c| c.is_ascii_hexdigit()))
                        .collect();
                    match u8::from_str_radix(&hex, 16) {
                        Ok(byte) if hex.len() == 2 => bytes.push(byte),
                        _ => {
                            bytes.extend_from_slice(b"\\x");
                            bytes.extend_from_slice(hex.as_bytes());
                        }
                    }
                }
                other => bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes()),
            },
            other => bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes()),
        }
    }

    None
}

/// Nest every record under the record its `pkname` names.
///
/// Records may reference parents that appear later in the output, so
/// attachment repeats until no record moves. Records whose parent never
/// shows up are dropped.
fn build_hierarchy(records: Vec<BlockDevice>) -> Vec<BlockDevice> {
    let (mut roots, mut pending): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|dev| dev.pkname.is_empty());
    if roots.is_empty() {
        return roots;
    }

    while !pending.is_empty() {
        let before = pending.len();
        let mut unplaced = Vec::new();
        for dev in pending {
            if let Err(dev) = attach(&mut roots, dev, 0) {
                unplaced.push(dev);
            }
        }
        pending = unplaced;
        if pending.len() == before {
            break;
        }
    }

    for orphan in &pending {
        debug!(
            "dropping {}: parent {} not found in lsblk output",
            orphan.name, orphan.pkname
        );
    }

    roots
}

fn attach(devs: &mut [BlockDevice], dev: BlockDevice, depth: usize) -> std::result::Result<(), BlockDevice> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(dev);
    }

    if let Some(parent) = devs.iter_mut().find(|parent| parent.name == dev.pkname) {
        parent.children.push(dev);
        return Ok(());
    }

    let mut dev = dev;
    for parent in devs.iter_mut() {
        match attach(&mut parent.children, dev, depth + 1) {
            Ok(()) => return Ok(()),
            Err(unplaced) => dev = unplaced,
        }
    }
    Err(dev)
}
