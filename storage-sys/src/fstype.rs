// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem type fallback for devices `lsblk` reports without one

use std::collections::HashMap;

use tracing::debug;

use crate::context::ScanContext;
use crate::error::Result;
use crate::findmnt::FindMnt;

/// Looks up filesystem types by mount point, memoizing every answer.
///
/// One resolver lives for exactly one discovery call.
pub struct FstypeResolver<'a> {
    findmnt: &'a dyn FindMnt,
    cache: HashMap<String, String>,
}

impl<'a> FstypeResolver<'a> {
    pub fn new(findmnt: &'a dyn FindMnt) -> Self {
        Self {
            findmnt,
            cache: HashMap::new(),
        }
    }

    /// Filesystem type mounted at `mount_point`, or empty when unknown.
    ///
    /// Lookup failures are cached as empty and not reported; only a
    /// cancelled or expired context is returned as an error.
    pub async fn resolve(&mut self, ctx: &ScanContext, mount_point: &str) -> Result<String> {
        if mount_point.is_empty() {
            return Ok(String::new());
        }
        if let Some(fstype) = self.cache.get(mount_point) {
            debug!("fstype for {} served from cache: {:?}", mount_point, fstype);
            return Ok(fstype.clone());
        }

        let fstype = match self.findmnt.find_mnt(ctx, mount_point).await {
            Ok(output) => output.first_fstype().to_string(),
            Err(error) => {
                ctx.check()?;
                debug!("findmnt failed for {}: {}", mount_point, error);
                String::new()
            }
        };

        debug!("resolved fstype for {}: {:?}", mount_point, fstype);
        self.cache.insert(mount_point.to_string(), fstype.clone());
        Ok(fstype)
    }
}
