// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The kernel link-state feed. spec §6 describes a `PF_ROUTE` socket
//! filtered to `IFINFO`-class messages; the nearest facility with
//! equivalent semantics on Linux is `NETLINK_ROUTE` with an
//! `RTMGRP_LINK` multicast subscription, decoding `ifinfomsg` headers out
//! of `RTM_NEWLINK`/`RTM_DELLINK` messages (see SPEC_FULL.md §6).

use std::io;
use std::os::fd::{AsRawFd, RawFd};

use tokio::io::unix::AsyncFd;

/// One decoded link-state transition: `name` is the interface the kernel
/// reported on, `up` is true for `RTM_NEWLINK` with `IFF_RUNNING` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub iface: String,
    pub up: bool,
}

struct RawSocket(RawFd);

impl AsRawFd for RawSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

pub struct RoutingSocket {
    fd: AsyncFd<RawSocket>,
}

impl RoutingSocket {
    /// Opens and binds the routing socket. Must run while the supervisor
    /// still holds its privileged resources (startup step 3).
    pub fn open() -> io::Result<Self> {
        let raw = unsafe {
            let fd = libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                libc::NETLINK_ROUTE,
            );
            if fd < 0 {
                return Err(io::Error::last_os_error());
            }

            let mut addr: libc::sockaddr_nl = std::mem::zeroed();
            addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
            addr.nl_groups = libc::RTMGRP_LINK as u32;
            let rc = libc::bind(
                fd,
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_nl>() as u32,
            );
            if rc < 0 {
                let err = io::Error::last_os_error();
                libc::close(fd);
                return Err(err);
            }
            fd
        };

        Ok(RoutingSocket {
            fd: AsyncFd::new(RawSocket(raw))?,
        })
    }

    /// Awaits and decodes the next interface-information message,
    /// skipping anything else the kernel happens to deliver on this
    /// socket. Returns `Ok(None)` for a datagram that decoded to no
    /// recognizable link event (e.g. an unrelated `RTM_*` type).
    pub async fn next_event(&mut self) -> io::Result<Option<LinkEvent>> {
        let mut buf = [0u8; 4096];
        loop {
            let mut guard = self.fd.readable().await?;
            let received = guard.try_io(|inner| {
                let rc = unsafe {
                    libc::recv(
                        inner.get_ref().as_raw_fd(),
                        buf.as_mut_ptr() as *mut libc::c_void,
                        buf.len(),
                        0,
                    )
                };
                if rc < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(rc as usize)
                }
            });
            match received {
                Ok(Ok(len)) => return Ok(decode_link_event(&buf[..len])),
                Ok(Err(err)) => return Err(err),
                Err(_would_block) => continue,
            }
        }
    }
}

fn decode_link_event(data: &[u8]) -> Option<LinkEvent> {
    decode_link_event_with(data, index_to_name)
}

/// `index_to_name` is injected so the decoder can be exercised against
/// hand-built buffers without a real interface index to resolve.
fn decode_link_event_with(data: &[u8], resolve: impl Fn(i32) -> Option<String>) -> Option<LinkEvent> {
    let hdr_len = std::mem::size_of::<libc::nlmsghdr>();
    let mut offset = 0;
    while offset + hdr_len <= data.len() {
        let nlh = read_unaligned::<libc::nlmsghdr>(&data[offset..]);
        let msg_len = nlh.nlmsg_len as usize;
        if msg_len < hdr_len || offset + msg_len > data.len() {
            break;
        }

        if nlh.nlmsg_type == libc::RTM_NEWLINK as u16 || nlh.nlmsg_type == libc::RTM_DELLINK as u16 {
            let ifi_off = offset + hdr_len;
            let ifi_len = std::mem::size_of::<libc::ifinfomsg>();
            if ifi_off + ifi_len <= data.len() {
                let ifi = read_unaligned::<libc::ifinfomsg>(&data[ifi_off..]);
                let up = nlh.nlmsg_type == libc::RTM_NEWLINK as u16
                    && (ifi.ifi_flags as u32 & libc::IFF_RUNNING as u32) != 0;
                if let Some(iface) = resolve(ifi.ifi_index) {
                    return Some(LinkEvent { iface, up });
                }
            }
        }

        // NLMSG_ALIGN: messages are padded to 4-byte boundaries.
        offset += (msg_len + 3) & !3;
    }
    None
}

fn read_unaligned<T: Copy>(bytes: &[u8]) -> T {
    debug_assert!(bytes.len() >= std::mem::size_of::<T>());
    unsafe { std::ptr::read_unaligned(bytes.as_ptr() as *const T) }
}

fn index_to_name(index: i32) -> Option<String> {
    let mut buf = [0i8; libc::IF_NAMESIZE];
    let ptr = unsafe { libc::if_indextoname(index as u32, buf.as_mut_ptr()) };
    if ptr.is_null() {
        return None;
    }
    let cstr = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
    cstr.to_str().ok().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Packs one `nlmsghdr` + `ifinfomsg` pair, padded to the 4-byte
    /// `NLMSG_ALIGN` boundary, the way the kernel would deliver it.
    fn build_link_message(msg_type: u16, index: i32, flags: u32) -> Vec<u8> {
        let hdr_len = std::mem::size_of::<libc::nlmsghdr>();
        let ifi_len = std::mem::size_of::<libc::ifinfomsg>();
        let total = hdr_len + ifi_len;

        let nlh = libc::nlmsghdr {
            nlmsg_len: total as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: 0,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        };
        let ifi = libc::ifinfomsg {
            ifi_family: libc::AF_UNSPEC as u8,
            ifi_type: 0,
            ifi_index: index,
            ifi_flags: flags,
            ifi_change: 0xffffffff,
        };

        let mut buf = Vec::with_capacity((total + 3) & !3);
        buf.extend_from_slice(unsafe {
            std::slice::from_raw_parts(&nlh as *const _ as *const u8, hdr_len)
        });
        buf.extend_from_slice(unsafe {
            std::slice::from_raw_parts(&ifi as *const _ as *const u8, ifi_len)
        });
        buf.resize((total + 3) & !3, 0);
        buf
    }

    fn fake_resolver(idx: i32) -> Option<String> {
        match idx {
            2 => Some("em0".to_string()),
            _ => None,
        }
    }

    #[test]
    fn decodes_newlink_with_running_flag_as_up() {
        let data = build_link_message(libc::RTM_NEWLINK as u16, 2, libc::IFF_RUNNING as u32);
        let event = decode_link_event_with(&data, fake_resolver).unwrap();
        assert_eq!(event, LinkEvent { iface: "em0".to_string(), up: true });
    }

    #[test]
    fn decodes_newlink_without_running_flag_as_down() {
        let data = build_link_message(libc::RTM_NEWLINK as u16, 2, 0);
        let event = decode_link_event_with(&data, fake_resolver).unwrap();
        assert_eq!(event, LinkEvent { iface: "em0".to_string(), up: false });
    }

    #[test]
    fn dellink_is_always_down() {
        let data = build_link_message(libc::RTM_DELLINK as u16, 2, libc::IFF_RUNNING as u32);
        let event = decode_link_event_with(&data, fake_resolver).unwrap();
        assert_eq!(event, LinkEvent { iface: "em0".to_string(), up: false });
    }

    #[test]
    fn unrelated_message_type_yields_none() {
        let data = build_link_message(libc::RTM_NEWADDR as u16, 2, libc::IFF_RUNNING as u32);
        assert!(decode_link_event_with(&data, fake_resolver).is_none());
    }

    #[test]
    fn unresolvable_index_yields_none() {
        let data = build_link_message(libc::RTM_NEWLINK as u16, 99, libc::IFF_RUNNING as u32);
        assert!(decode_link_event_with(&data, fake_resolver).is_none());
    }

    #[test]
    fn truncated_buffer_yields_none() {
        let data = build_link_message(libc::RTM_NEWLINK as u16, 2, libc::IFF_RUNNING as u32);
        assert!(decode_link_event_with(&data[..4], fake_resolver).is_none());
    }
}
