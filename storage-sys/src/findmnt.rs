// SPDX-License-Identifier: GPL-3.0-only

//! Secondary mount introspection through `findmnt`

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use storage_types::{FindMntOutput, FoundMnt, parse_percent, parse_size};
use tracing::debug;

use crate::command::{CommandRunner, SystemCommandRunner};
use crate::context::ScanContext;
use crate::error::{Result, SysError};

pub const FINDMNT: &str = "findmnt";

/// Resolves the filesystems mounted at or containing a target path.
#[async_trait]
pub trait FindMnt: Send + Sync {
    async fn find_mnt(&self, ctx: &ScanContext, target: &str) -> Result<FindMntOutput>;
}

/// [`FindMnt`] backed by the `findmnt` binary
#[derive(Clone)]
pub struct FindMntCommand {
    runner: Arc<dyn CommandRunner>,
}

impl FindMntCommand {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl Default for FindMntCommand {
    fn default() -> Self {
        Self::new(Arc::new(SystemCommandRunner))
    }
}

#[async_trait]
impl FindMnt for FindMntCommand {
    async fn find_mnt(&self, ctx: &ScanContext, target: &str) -> Result<FindMntOutput> {
        let args = [
            "--target".to_string(),
            target.to_string(),
            "--json".to_string(),
            "--df".to_string(),
        ];
        let output = self.runner.run(ctx, FINDMNT, &args).await?;
        parse_findmnt_output(target, &output.stdout)
    }
}

#[derive(Debug, Deserialize)]
struct RawFindMnt {
    #[serde(default)]
    filesystems: Option<Vec<RawFilesystem>>,
}

#[derive(Debug, Deserialize)]
struct RawFilesystem {
    #[serde(default)]
    source: Value,
    #[serde(default)]
    target: Value,
    #[serde(default)]
    fstype: Value,
    #[serde(default)]
    size: Value,
    #[serde(default)]
    used: Value,
    #[serde(default)]
    avail: Value,
    #[serde(default, rename = "use%")]
    use_percent: Value,
}

/// Decode `findmnt --json --df` output for `target`
pub fn parse_findmnt_output(target: &str, output: &[u8]) -> Result<FindMntOutput> {
    if output.iter().all(u8::is_ascii_whitespace) {
        return Err(SysError::EmptyInput);
    }

    let raw: RawFindMnt = serde_json::from_slice(output).map_err(|error| {
        debug!(
            "failed to decode findmnt output ({} bytes): {}",
            output.len(),
            error
        );
        SysError::parse(output, error)
    })?;

    let filesystems = raw
        .filesystems
        .unwrap_or_default()
        .into_iter()
        .map(|fs| found_mnt(fs).map_err(|error| SysError::parse(output, error)))
        .collect::<Result<Vec<_>>>()?;

    Ok(FindMntOutput {
        target: target.to_string(),
        filesystems,
    })
}

fn found_mnt(raw: RawFilesystem) -> anyhow::Result<FoundMnt> {
    let size_humanized = text(&raw.size);
    let used_humanized = text(&raw.used);
    let available_humanized = text(&raw.avail);
    let used_percent_humanized = text(&raw.use_percent);

    Ok(FoundMnt {
        mounted_point: text(&raw.target),
        sources: split_sources(&text(&raw.source)),
        fstype: text(&raw.fstype),
        size_bytes: parse_size(&size_humanized)?,
        used_bytes: parse_size(&used_humanized)?,
        available_bytes: parse_size(&available_humanized)?,
        used_percent: parse_percent(&used_percent_humanized)?,
        size_humanized,
        used_humanized,
        available_humanized,
        used_percent_humanized,
    })
}

fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `/dev/sda1[/var/lib/kubelet]` -> `["/dev/sda1", "/var/lib/kubelet"]`
pub fn split_sources(source: &str) -> Vec<String> {
    source
        .split(['[', ']'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
