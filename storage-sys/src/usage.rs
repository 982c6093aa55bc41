// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::CString;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use storage_types::Usage;

/// Capacity statistics for the filesystem mounted at `mount_point`.
///
/// `free_bytes` is the space available to unprivileged users; `used_bytes`
/// counts every allocated block.
pub fn usage_for_mount_point(mount_point: &Path) -> io::Result<Usage> {
    let mount_point_c = CString::new(mount_point.as_os_str().as_bytes()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("mount point contains NUL byte: {mount_point:?}"),
        )
    })?;

    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    let rc = unsafe { libc::statvfs(mount_point_c.as_ptr(), stat.as_mut_ptr()) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }

    let stat = unsafe { stat.assume_init() };
    let frsize = if stat.f_frsize > 0 {
        stat.f_frsize as u64
    } else {
        stat.f_bsize as u64
    };

    let total = (stat.f_blocks as u64).saturating_mul(frsize);
    let free = (stat.f_bfree as u64).saturating_mul(frsize);
    let available = (stat.f_bavail as u64).saturating_mul(frsize);

    Ok(Usage {
        total_bytes: total,
        free_bytes: available,
        used_bytes: total.saturating_sub(free),
    })
}
