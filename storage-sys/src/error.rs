// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Longest prefix of raw tool output kept in a parse error
const FRAGMENT_LIMIT: usize = 256;

/// Error types for discovery operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("{tool} not found in PATH")]
    ToolNotFound { tool: String },

    #[error("command `{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to parse {len} bytes of tool output: {reason} (input starts with {fragment:?})")]
    Parse {
        len: usize,
        fragment: String,
        reason: String,
    },

    #[error("empty input provided")]
    EmptyInput,

    #[error("unexpected output format, missing {0:?} key")]
    MissingKey(&'static str),

    #[error("unsupported output: {0}")]
    UnsupportedOutput(String),

    #[error("build disk hierarchy failed")]
    HierarchyBuildFailed,

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("context canceled")]
    Cancelled,

    #[error("invalid configuration {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SysError {
    /// Build a parse error carrying the input length and a short prefix of it
    pub fn parse(input: &[u8], reason: impl ToString) -> Self {
        let text = String::from_utf8_lossy(input);
        let fragment = text.chars().take(FRAGMENT_LIMIT).collect();
        SysError::Parse {
            len: input.len(),
            fragment,
            reason: reason.to_string(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SysError::Cancelled)
    }

    /// Failures reported by a tool or the clock, which a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SysError::CommandFailed { .. } | SysError::Timeout(_) | SysError::Io(_)
        )
    }
}

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, SysError>;
