// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Forks the two helper children. Unlike `spawn_worker`'s trampoline
//! (which re-execs a *different* process image and jumps in through a
//! dynamic symbol, because it injects into a foreign host), both helpers
//! here are the same `networkd` binary: the child just never returns from
//! its helper loop. A plain `fork()` is enough — there is nothing to
//! `exec()`.

use std::os::fd::{AsRawFd, RawFd};

use networkd_ipc::Channel;
use nix::unistd::{fork, ForkResult, Pid};

use crate::helpers;

pub struct Helpers {
    pub exec_channel: Channel,
    pub exec_pid: Pid,
    pub write_channel: Channel,
    pub write_pid: Pid,
}

/// Step 1 of the supervisor startup sequence: fork both helpers before
/// any other privileged resource is touched. Must run on the sole thread
/// of the process, before the async runtime is constructed. Both helpers
/// read `Config` back out of the process-wide `OnceLock` (see
/// `config::get`) after `fork()`, rather than having it passed down
/// explicitly — `fork()` already gives each child its own copy of
/// whatever was initialized in the parent before the call.
pub fn spawn_helpers() -> anyhow::Result<Helpers> {
    let (exec_channel, exec_pid) = spawn_one(helpers::run_exec_helper, &[])?;
    // The write helper is forked second, with the exec channel's
    // supervisor-side descriptor already open in this process. `fork()`
    // duplicates the whole fd table regardless of `CLOEXEC`, so without
    // an explicit close the write helper would inherit a live fd onto a
    // channel it has no business touching — violating the confinement
    // invariant that each helper's channel is exclusively owned. The
    // write-helper child closes it immediately after the fork.
    let (write_channel, write_pid) = spawn_one(helpers::run_write_helper, &[exec_channel.as_raw_fd()])?;
    Ok(Helpers {
        exec_channel,
        exec_pid,
        write_channel,
        write_pid,
    })
}

/// `foreign_fds` lists descriptors, already open in this process, that
/// belong to an unrelated helper's channel: the forked child closes each
/// one before entering its helper loop.
fn spawn_one(entry: fn(Channel) -> !, foreign_fds: &[RawFd]) -> anyhow::Result<(Channel, Pid)> {
    let (supervisor_end, child_end) = Channel::pair()?;
    // SAFETY: called before the tokio runtime or any additional thread
    // exists, so the child inherits a single-threaded, async-signal-safe
    // state to jump straight into its helper loop from.
    match unsafe { fork()? } {
        ForkResult::Parent { child } => {
            drop(child_end);
            Ok((supervisor_end, child))
        }
        ForkResult::Child => {
            drop(supervisor_end);
            for &fd in foreign_fds {
                // SAFETY: `fd` is a descriptor this process inherited from
                // the parent at fork time and does not otherwise use; closing
                // it here, before the helper loop starts, only affects this
                // process's fd table entry.
                unsafe {
                    libc::close(fd);
                }
            }
            entry(child_end)
        }
    }
}
