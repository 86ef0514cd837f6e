// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The supervisor's startup sequence and event loop (spec §4.1). Runs on
//! a `tokio` current-thread runtime plus a `LocalSet`: client tasks are
//! `spawn_local`, never `Send`, matching the single-threaded reactor
//! contract the design calls for.

use std::io;
use std::os::fd::FromRawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use std::rc::Rc;

use nix::unistd::{chown, Group, Uid};
use tokio::net::UnixListener;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::LocalSet;

use networkd_ipc::wire::request_type;
use networkd_validate::Validator;

use crate::client::handle_client;
use crate::config::{Config, LISTEN_BACKLOG};
use crate::dispatch::HelperHandles;
use crate::fork::spawn_helpers;
use crate::privilege;
use crate::routing::{LinkEvent, RoutingSocket};

const SOCKET_MODE: u32 = 0o660;

/// Runs the supervisor to completion: startup, event loop, graceful
/// shutdown. Returns once a termination signal has been handled and
/// every resource has been torn down.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    // Steps 1-3 happen while the process still holds its starting
    // privileges; step 4 drops them. All four must finish before the
    // event loop starts.
    let helpers = spawn_helpers()?;
    let listener = bind_listener(cfg)?;
    let mut routing = RoutingSocket::open()?;

    privilege::drop_privileges(&cfg.user, &cfg.group)?;
    privilege::set_process_title("networkd: supervisor");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let validator = Rc::new(Validator::new()?);
    let handles = HelperHandles::new(helpers.exec_channel, helpers.write_channel);

    let local = LocalSet::new();
    local
        .run_until(event_loop(
            listener,
            &mut routing,
            handles,
            validator,
            &mut sigterm,
            &mut sigint,
        ))
        .await;

    unlink_socket(&cfg.socket_path);
    Ok(())
}

async fn event_loop(
    listener: UnixListener,
    routing: &mut RoutingSocket,
    handles: HelperHandles,
    validator: Rc<Validator>,
    sigterm: &mut Signal,
    sigint: &mut Signal,
) {
    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let handles = handles.clone();
                        let validator = Rc::clone(&validator);
                        tokio::task::spawn_local(async move {
                            handle_client(stream, handles, validator).await;
                        });
                    }
                    Err(err) => tracing::warn!("accept failed: {err}"),
                }
            }
            event = routing.next_event() => {
                match event {
                    Ok(Some(link_event)) => forward_link_event(&handles, &link_event),
                    Ok(None) => {}
                    Err(err) => tracing::warn!("routing socket read failed: {err}"),
                }
            }
        }
    }
    // Cancellation policy (spec §4.1): stop accepting, drop every
    // in-flight client task and both helper channels. Dropping `local`
    // on return aborts any still-running `spawn_local` client tasks;
    // dropping `handles` here closes both helper channels, which is
    // what causes the helpers to observe EOF and exit.
    drop(handles);
    drop(listener);
}

fn forward_link_event(handles: &HelperHandles, event: &LinkEvent) {
    let state = if event.up { "up" } else { "down" };
    let message = format!("{state} {}", event.iface);
    if let Err(err) = handles.exec.borrow_mut().call(request_type::LOGEVENT, message.into_bytes()) {
        tracing::warn!("failed to post LOGEVENT: {err}");
    }
}

fn bind_listener(cfg: &Config) -> anyhow::Result<UnixListener> {
    let path = &cfg.socket_path;
    if path.exists() {
        std::fs::remove_file(path)?;
    }

    let std_listener = bind_raw(path)?;
    std_listener.set_nonblocking(true)?;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(SOCKET_MODE))?;
    let group = Group::from_name(&cfg.group)?
        .ok_or_else(|| anyhow::anyhow!("unknown group {:?}", cfg.group))?;
    chown(path, Some(Uid::from_raw(0)), Some(group.gid))?;

    Ok(UnixListener::from_std(std_listener)?)
}

/// Binds and listens on `path` with the spec-mandated accept backlog
/// (`LISTEN_BACKLOG`, spec §6): `std::os::unix::net::UnixListener::bind`
/// always calls `listen()` with std's hard-coded backlog of 128, so the
/// socket is built from raw `libc` calls instead — the same pattern
/// `routing.rs` uses for the netlink socket.
fn bind_raw(path: &Path) -> io::Result<std::os::unix::net::UnixListener> {
    // SAFETY: a plain stream-socket creation with no pointer arguments.
    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    let bytes = path.as_os_str().as_bytes();
    let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    if bytes.len() >= addr.sun_path.len() {
        unsafe { libc::close(fd) };
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "socket path too long"));
    }
    for (dst, &src) in addr.sun_path.iter_mut().zip(bytes.iter()) {
        *dst = src as libc::c_char;
    }
    let len = (std::mem::size_of::<libc::sa_family_t>() + bytes.len()) as libc::socklen_t;

    // SAFETY: `addr` is a valid, fully-initialized sockaddr_un of `len`
    // bytes; `fd` is the socket we just created.
    let rc = unsafe { libc::bind(fd, &addr as *const libc::sockaddr_un as *const libc::sockaddr, len) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }

    // SAFETY: `fd` is a bound socket; listen() takes no pointer arguments.
    let rc = unsafe { libc::listen(fd, LISTEN_BACKLOG) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(fd) };
        return Err(err);
    }

    // SAFETY: `fd` is a freshly bound and listening socket we own exclusively.
    Ok(unsafe { std::os::unix::net::UnixListener::from_raw_fd(fd) })
}

fn unlink_socket(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("failed to unlink socket {path:?}: {err}");
        }
    }
}
