// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Privilege dropping and process labeling for the supervisor and its
//! helpers. Grounded on `datadog-sidecar/src/unix.rs`'s use of `prctl` to
//! label forked children (`prctl::set_name("dd-ipc-helper")`) and
//! `nix::unistd` for the low-level process calls.

use std::ffi::CString;

use nix::unistd::{self, Gid, Group, Uid, User};

#[derive(Debug, thiserror::Error)]
pub enum PrivilegeError {
    #[error("unknown user {0:?}")]
    UnknownUser(String),
    #[error("unknown group {0:?}")]
    UnknownGroup(String),
    #[error(transparent)]
    Nix(#[from] nix::Error),
}

/// Step 4 of the supervisor startup sequence: drop supplementary groups,
/// set primary gid/uid, and apply the remaining capability restriction.
/// Must run after every privileged resource (listening socket, routing
/// socket) has already been opened.
pub fn drop_privileges(user: &str, group: &str) -> Result<(), PrivilegeError> {
    let user = User::from_name(user)
        .map_err(PrivilegeError::from)?
        .ok_or_else(|| PrivilegeError::UnknownUser(user.to_string()))?;
    let group = Group::from_name(group)
        .map_err(PrivilegeError::from)?
        .ok_or_else(|| PrivilegeError::UnknownGroup(group.to_string()))?;

    unistd::setgroups(&[] as &[Gid])?;
    unistd::setgid(group.gid)?;
    unistd::setuid(user.uid)?;

    restrict_capabilities();
    Ok(())
}

/// The design calls for restricting the remaining capability set to
/// `stdio + unix-socket` (OpenBSD `pledge(2)` terms). Linux has no direct
/// equivalent of `pledge`; as a best-effort stand-in this sets
/// `PR_SET_NO_NEW_PRIVS`, which at least prevents the process from
/// regaining privilege through a setuid/setgid exec. A real seccomp-bpf
/// profile would be the faithful translation but is out of scope here.
pub fn restrict_capabilities() {
    // SAFETY: prctl with PR_SET_NO_NEW_PRIVS takes no pointer arguments
    // that need to remain valid beyond the call.
    let rc = unsafe { libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) };
    if rc != 0 {
        tracing::warn!(
            "failed to set PR_SET_NO_NEW_PRIVS: {}",
            std::io::Error::last_os_error()
        );
    }
}

/// Sets this process's `comm` (visible in `ps`/`top`) so supervisor and
/// helpers are distinguishable. Best-effort: the kernel truncates to 15
/// bytes, and failure here is never fatal.
pub fn set_process_title(title: &str) {
    let Ok(c_title) = CString::new(title) else {
        return;
    };
    // SAFETY: PR_SET_NAME reads up to 16 bytes (including the NUL) from
    // the pointer we pass; `c_title` outlives the call.
    let rc = unsafe { libc::prctl(libc::PR_SET_NAME, c_title.as_ptr(), 0, 0, 0) };
    if rc != 0 {
        tracing::debug!(
            "failed to set process title {title:?}: {}",
            std::io::Error::last_os_error()
        );
    }
}

/// `geteuid()`, used for nothing but a diagnostic log line.
pub fn effective_uid() -> Uid {
    unistd::geteuid()
}
