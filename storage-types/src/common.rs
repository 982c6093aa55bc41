// SPDX-License-Identifier: GPL-3.0-only

//! Common utility types shared across models

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

const SI_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Filesystem usage statistics for one mounted filesystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Capacity of the filesystem in bytes
    pub total_bytes: u64,

    /// Bytes not allocated to any file
    pub free_bytes: u64,

    /// Bytes in use (total minus free)
    pub used_bytes: u64,
}

impl Usage {
    /// Usage percentage (0-100), zero for an empty filesystem
    pub fn used_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.used_bytes as f64 * 100.0) / self.total_bytes as f64
    }
}

/// Render a byte count with SI units (e.g. 63900000 -> "64 MB")
pub fn bytes_to_pretty(bytes: u64) -> String {
    let mut val = bytes as f64;
    let mut steps = 0;

    while val >= 1000. && steps < SI_UNITS.len() - 1 {
        val /= 1000.;
        steps += 1;
    }

    if steps == 0 {
        format!("{} {}", bytes, SI_UNITS[0])
    } else if val < 10. {
        format!("{:.1} {}", val, SI_UNITS[steps])
    } else {
        format!("{:.0} {}", val, SI_UNITS[steps])
    }
}

/// Parse a human-readable size to bytes.
///
/// Single-letter and `B`-suffixed units are decimal (`"63.9M"` is
/// 63 900 000 bytes), `i`/`iB` suffixed units are binary (`"1Ki"` is 1024).
/// Whitespace between the number and the unit is allowed.
pub fn pretty_to_bytes(pretty: &str) -> Result<u64> {
    let trimmed = pretty.trim();
    let split_at = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split_at);

    let val: f64 = number
        .parse()
        .map_err(|_| anyhow!("Invalid size: {:?}", pretty))?;
    let multiplier = unit_multiplier(unit.trim())
        .ok_or_else(|| anyhow!("Invalid unit: {:?}", unit.trim()))?;

    Ok((val * multiplier as f64) as u64)
}

/// Parse a size that is either a plain integer or a humanized string.
/// Empty input is zero.
pub fn parse_size(value: &str) -> Result<u64> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(0);
    }
    if let Ok(bytes) = value.parse::<u64>() {
        return Ok(bytes);
    }
    pretty_to_bytes(value)
}

/// Parse a boolean flag written as `1`/`0` or `true`/`false`. Empty input is false.
pub fn parse_flag(value: &str) -> Result<bool> {
    match value.trim() {
        "" | "0" | "false" => Ok(false),
        "1" | "true" => Ok(true),
        other => Err(anyhow!("Invalid boolean: {:?}", other)),
    }
}

/// Parse a percentage such as `"73%"`. Empty input is zero.
pub fn parse_percent(value: &str) -> Result<f64> {
    let value = value.trim().trim_end_matches('%').trim();
    if value.is_empty() {
        return Ok(0.0);
    }
    value
        .parse()
        .map_err(|_| anyhow!("Invalid percentage: {:?}", value))
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    let lower = unit.to_ascii_lowercase();
    let (prefix, base) = if let Some(prefix) = lower.strip_suffix("ib") {
        (prefix, 1024_u64)
    } else if let Some(prefix) = lower.strip_suffix('i') {
        (prefix, 1024)
    } else {
        (lower.strip_suffix('b').unwrap_or(&lower), 1000)
    };

    let steps = match prefix {
        "" if base == 1000 => 0,
        "k" => 1,
        "m" => 2,
        "g" => 3,
        "t" => 4,
        "p" => 5,
        "e" => 6,
        _ => return None,
    };

    Some(base.pow(steps))
}
