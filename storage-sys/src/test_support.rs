// SPDX-License-Identifier: GPL-3.0-only

//! In-memory stand-ins for the external tools, shared by unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use storage_types::{FindMntOutput, FoundMnt};

use crate::command::{CommandOutput, CommandRunner};
use crate::context::ScanContext;
use crate::error::{Result, SysError};
use crate::findmnt::FindMnt;

#[derive(Debug, Clone)]
enum Response {
    Stdout(String),
    Missing,
    Failed,
}

/// Answers commands by the longest registered command-line prefix.
#[derive(Debug, Default)]
pub struct FakeRunner {
    responses: Vec<(String, Response)>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, prefix: &str, stdout: &str) -> Self {
        self.responses
            .push((prefix.to_string(), Response::Stdout(stdout.to_string())));
        self
    }

    pub fn with_missing_tool(mut self, prefix: &str) -> Self {
        self.responses.push((prefix.to_string(), Response::Missing));
        self
    }

    pub fn with_failure(mut self, prefix: &str) -> Self {
        self.responses.push((prefix.to_string(), Response::Failed));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        ctx: &ScanContext,
        program: &str,
        args: &[String],
    ) -> Result<CommandOutput> {
        let line = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }
        ctx.check()?;

        let response = self
            .responses
            .iter()
            .filter(|(prefix, _)| line.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, response)| response.clone());

        match response {
            Some(Response::Stdout(stdout)) => Ok(CommandOutput::from_stdout(stdout)),
            Some(Response::Missing) => Err(SysError::ToolNotFound {
                tool: program.to_string(),
            }),
            Some(Response::Failed) | None => Err(SysError::CommandFailed {
                command: line,
                status: "exit status: 1".to_string(),
                stderr: "fake failure".to_string(),
            }),
        }
    }
}

/// Maps mount points to filesystem types and counts lookups.
#[derive(Debug, Default)]
pub struct FakeFindMnt {
    fstypes: HashMap<String, String>,
    calls: AtomicUsize,
}

impl FakeFindMnt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fstype(mut self, target: &str, fstype: &str) -> Self {
        self.fstypes.insert(target.to_string(), fstype.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FindMnt for FakeFindMnt {
    async fn find_mnt(&self, ctx: &ScanContext, target: &str) -> Result<FindMntOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ctx.check()?;

        match self.fstypes.get(target) {
            Some(fstype) => Ok(FindMntOutput {
                target: target.to_string(),
                filesystems: vec![FoundMnt {
                    mounted_point: target.to_string(),
                    fstype: fstype.clone(),
                    ..Default::default()
                }],
            }),
            None => Err(SysError::CommandFailed {
                command: format!("findmnt --target {target}"),
                status: "exit status: 1".to_string(),
                stderr: format!("findmnt: can't find {target} in /proc/self/mountinfo"),
            }),
        }
    }
}
