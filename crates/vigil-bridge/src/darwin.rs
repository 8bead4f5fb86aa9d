// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// sysctl queries shared by the iOS and macOS bridges.

use std::ffi::CString;
use std::mem;

use vigil_core::error::{Result, VigilError};

/// `P_TRACED` from <sys/proc.h>; not exported by libc.
const P_TRACED: libc::c_int = 0x0000_0800;

/// Whether the kernel reports `P_TRACED` for the current process.
pub(crate) fn process_traced() -> Result<bool> {
    let mut mib: [libc::c_int; 4] = [
        libc::CTL_KERN,
        libc::KERN_PROC,
        libc::KERN_PROC_PID,
        // SAFETY: getpid has no preconditions.
        unsafe { libc::getpid() },
    ];
    // SAFETY: kinfo_proc is a plain C struct; all-zero is a valid bit pattern.
    let mut info: libc::kinfo_proc = unsafe { mem::zeroed() };
    let mut size: libc::size_t = mem::size_of::<libc::kinfo_proc>();

    // SAFETY: `mib` names a 4-level query, `info` is writable for `size`
    // bytes and no new value is supplied.
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            (&mut info as *mut libc::kinfo_proc).cast::<libc::c_void>(),
            &mut size,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(VigilError::Bridge(format!(
            "sysctl(KERN_PROC_PID) failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(info.kp_proc.p_flag & P_TRACED != 0)
}

/// Read a string-valued sysctl such as `hw.machine`.
pub(crate) fn sysctl_string(name: &str) -> Result<Option<String>> {
    let c_name = CString::new(name)
        .map_err(|_| VigilError::InvalidArgument(format!("sysctl name contains NUL: {name}")))?;

    let mut len: libc::size_t = 0;
    // SAFETY: a null output buffer asks the kernel for the required length.
    let rc = unsafe {
        libc::sysctlbyname(
            c_name.as_ptr(),
            std::ptr::null_mut(),
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Ok(None);
    }

    let mut buf = vec![0u8; len];
    // SAFETY: `buf` is writable for `len` bytes.
    let rc = unsafe {
        libc::sysctlbyname(
            c_name.as_ptr(),
            buf.as_mut_ptr().cast::<libc::c_void>(),
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    if rc != 0 {
        return Err(VigilError::Bridge(format!(
            "sysctlbyname({name}) failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    buf.truncate(len);
    while buf.last() == Some(&0) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
