// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The exec helper's request handling. Pure function of `(kind, payload)`
//! to `(status, output)` — the surrounding receive/reply loop lives in
//! [`super::run_exec_helper`] so this part is unit-testable without a
//! forked child.

use std::io::Read;
use std::process::{Command, Stdio};

use networkd_ipc::wire::{request_type, status};
use networkd_validate::Validator;

use crate::config::Config;

/// Runs `cmd`, capturing up to `cap` bytes of its stdout. Mirrors spec
/// §4.2's execution procedure: pipe, spawn, close the write end (handled
/// for us by `std::process::Command`'s `Stdio::piped()`), read up to
/// capacity, wait, and report success iff the exit status was zero.
fn capture_output(mut cmd: Command, cap: usize) -> std::io::Result<(bool, Vec<u8>)> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::null());
    let mut child = cmd.spawn()?;
    let mut buf = Vec::new();
    if let Some(mut out) = child.stdout.take() {
        out.take(cap as u64).read_to_end(&mut buf)?;
    }
    let exit = child.wait()?;
    Ok((exit.success(), buf))
}

fn run(cmd: Command, cap: usize) -> Result<(bool, Vec<u8>), std::io::Error> {
    capture_output(cmd, cap)
}

/// Handles one request, returning `(status, output)` as spec.md §4.2
/// defines them. `cap` is the exec output cap (1 MiB in production,
/// smaller in tests).
pub fn handle_request(cfg: &Config, validator: &Validator, cap: usize, kind: u32, payload: &[u8]) -> (u32, Vec<u8>) {
    let outcome = match kind {
        request_type::LIST_INTERFACES => run(Command::new(&cfg.ifconfig_path), cap),
        request_type::LIST_PSEUDO_INTERFACES => {
            let mut cmd = Command::new(&cfg.ifconfig_path);
            cmd.arg("-C");
            run(cmd, cap)
        }
        request_type::IFCONFIG_DOWN => match validated_iface(validator, payload) {
            Some(iface) => {
                let mut cmd = Command::new(&cfg.ifconfig_path);
                cmd.arg(iface).arg("down");
                run(cmd, cap)
            }
            None => {
                tracing::warn!("IFCONFIG_DOWN rejected: invalid interface name");
                return (status::ERROR, Vec::new());
            }
        },
        request_type::NETSTART => match validated_iface(validator, payload) {
            Some(iface) => {
                let mut cmd = Command::new(&cfg.sh_path);
                cmd.arg(&cfg.netstart_script).arg(iface);
                run(cmd, cap)
            }
            None => {
                tracing::warn!("NETSTART rejected: invalid interface name");
                return (status::ERROR, Vec::new());
            }
        },
        request_type::LOGEVENT => {
            // Payload originates from the kernel routing feed, not from a
            // client, so it is not run through validate_iface/_stanza.
            let message = String::from_utf8_lossy(payload).into_owned();
            let mut cmd = Command::new(&cfg.logger_path);
            cmd.arg(message);
            run(cmd, cap)
        }
        other => {
            tracing::warn!(kind = other, "exec helper received unauthorized request type");
            return (status::ERROR, Vec::new());
        }
    };

    match outcome {
        Ok((true, out)) => (status::OK, out),
        Ok((false, out)) => (status::ERROR, out),
        Err(err) => {
            tracing::warn!("exec helper spawn failed: {err}");
            (status::ERROR, Vec::new())
        }
    }
}

fn validated_iface<'a>(validator: &Validator, payload: &'a [u8]) -> Option<&'a str> {
    std::str::from_utf8(payload)
        .ok()
        .filter(|s| validator.validate_iface(s))
}
