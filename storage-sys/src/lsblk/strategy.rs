// SPDX-License-Identifier: GPL-3.0-only

//! `lsblk` output format selection by tool version

use std::sync::LazyLock;

use regex::Regex;
use storage_types::BlockDevice;

use super::{json, pairs};
use crate::error::{Result, SysError};

const BASE_FLAGS: &[&str] = &["--paths", "--bytes", "--fs", "--output"];

const JSON_COLUMNS: &str =
    "NAME,TYPE,SIZE,ROTA,SERIAL,WWN,VENDOR,MODEL,REV,MOUNTPOINT,FSTYPE,FSUSED,PARTUUID";

// Older releases have no FSUSED column and need PKNAME to rebuild the tree.
const PAIRS_COLUMNS: &str =
    "NAME,TYPE,SIZE,ROTA,SERIAL,WWN,VENDOR,MODEL,REV,MOUNTPOINT,FSTYPE,PARTUUID,PKNAME";

/// First util-linux release whose `lsblk` prints JSON
pub const MIN_JSON_VERSION: f64 = 2.37;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+").expect("Invalid regex"));

/// How `lsblk` is invoked and how its output is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LsblkStrategy {
    Json,
    Pairs,
}

impl LsblkStrategy {
    /// Pick the strategy from `lsblk --version` output.
    pub fn from_version(banner: &str) -> Result<Self> {
        let version = VERSION_PATTERN
            .find(banner)
            .and_then(|found| found.as_str().parse::<f64>().ok())
            .ok_or_else(|| {
                SysError::UnsupportedOutput(format!(
                    "failed to parse 'lsblk --version' output: {banner:?}"
                ))
            })?;

        if version >= MIN_JSON_VERSION {
            Ok(Self::Json)
        } else {
            Ok(Self::Pairs)
        }
    }

    pub fn args(self) -> Vec<String> {
        let (columns, format) = match self {
            Self::Json => (JSON_COLUMNS, "--json"),
            Self::Pairs => (PAIRS_COLUMNS, "--pairs"),
        };

        BASE_FLAGS
            .iter()
            .copied()
            .chain([columns, format])
            .map(str::to_string)
            .collect()
    }

    /// Decode tool output into an unfiltered device tree
    pub fn parse(self, output: &[u8]) -> Result<Vec<BlockDevice>> {
        match self {
            Self::Json => json::decode(output),
            Self::Pairs => pairs::decode(output),
        }
    }
}
