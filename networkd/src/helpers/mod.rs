// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The two helper children's request loops. Each is a tight
//! receive-dispatch-reply cycle over its half of the helper channel;
//! neither helper touches the reactor, the listening socket, or anything
//! outside its narrow capability.

pub mod exec;
pub mod write;

use networkd_ipc::Channel;
use networkd_validate::Validator;

/// Runs until the supervisor closes its end of the channel, then exits
/// the process. Never returns. Reads `Config` out of the process-wide
/// `OnceLock` (`config::get`) rather than taking it as a parameter: by
/// the time this runs, the parent already called `config::init` before
/// forking, and `fork()` carries that initialized value into this
/// process's own copy of the static.
pub fn run_exec_helper(mut channel: Channel) -> ! {
    crate::privilege::set_process_title("networkd: exec helper");
    let cfg = crate::config::get();
    let validator = Validator::new().expect("validator patterns are a startup invariant");
    loop {
        match channel.recv_request() {
            Ok(frame) => {
                let (status, output) =
                    exec::handle_request(cfg, &validator, crate::config::EXEC_OUTPUT_CAP, frame.kind, &frame.payload);
                if let Err(err) = channel.send_response(status, output) {
                    tracing::error!("exec helper failed to reply: {err}");
                    break;
                }
            }
            Err(_) => {
                tracing::info!("exec helper observed channel EOF, exiting");
                break;
            }
        }
    }
    std::process::exit(0)
}

/// Runs until the supervisor closes its end of the channel, then exits
/// the process. Never returns. See [`run_exec_helper`] for why `Config`
/// is read back from `config::get` instead of being passed in.
pub fn run_write_helper(mut channel: Channel) -> ! {
    crate::privilege::set_process_title("networkd: write helper");
    let cfg = crate::config::get();
    let validator = Validator::new().expect("validator patterns are a startup invariant");
    loop {
        match channel.recv_request() {
            Ok(frame) => {
                let status = write::handle_request(cfg, &validator, frame.kind, &frame.payload);
                if let Err(err) = channel.send_response(status, Vec::new()) {
                    tracing::error!("write helper failed to reply: {err}");
                    break;
                }
            }
            Err(_) => {
                tracing::info!("write helper observed channel EOF, exiting");
                break;
            }
        }
    }
    std::process::exit(0)
}
