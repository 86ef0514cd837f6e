// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Maps each client command to its helper calls and builds the
//! `ok`/`error` reply. Helper calls are synchronous (`Channel::call`
//! blocks), which is how the single outstanding request per helper
//! invariant (spec §5) is enforced: nothing else on this single-threaded
//! reactor can run while a call is in flight.

use std::cell::RefCell;
use std::rc::Rc;

use bytes::Bytes;
use networkd_ipc::wire::request_type;
use networkd_ipc::Channel;
use networkd_proto::{error_reply, list_reply, ok_reply, ArrayWriter, Command, InterfaceEntry};
use networkd_validate::{iface_is_pseudo, Validator};

/// Shared handles to both helper channels. `Rc<RefCell<_>>` rather than a
/// `Mutex` because the supervisor is single-threaded (no `Send` needed,
/// no contention to arbitrate) — see spec §5.
#[derive(Clone)]
pub struct HelperHandles {
    pub exec: Rc<RefCell<Channel>>,
    pub write: Rc<RefCell<Channel>>,
}

impl HelperHandles {
    pub fn new(exec: Channel, write: Channel) -> Self {
        HelperHandles {
            exec: Rc::new(RefCell::new(exec)),
            write: Rc::new(RefCell::new(write)),
        }
    }
}

pub async fn handle_command(cmd: Command, helpers: &HelperHandles, validator: &Validator) -> String {
    match cmd {
        Command::List => handle_list(helpers, validator),
        Command::Configure { iface, stanzas } => handle_configure(&iface, &stanzas, helpers, validator),
        Command::Connect { iface } => handle_connect(&iface, helpers, validator),
        Command::Disconnect { iface } => handle_disconnect(&iface, helpers, validator),
    }
}

fn handle_list(helpers: &HelperHandles, validator: &Validator) -> String {
    let pseudo_classes = match helpers.exec.borrow_mut().call(request_type::LIST_PSEUDO_INTERFACES, Bytes::new()) {
        Ok(frame) if frame.is_ok() => String::from_utf8_lossy(&frame.payload).into_owned(),
        Ok(_) => {
            tracing::warn!("LIST_PSEUDO_INTERFACES returned ERROR");
            return error_reply();
        }
        Err(err) => {
            tracing::error!("exec helper call failed: {err}");
            return error_reply();
        }
    };

    let listing = match helpers.exec.borrow_mut().call(request_type::LIST_INTERFACES, Bytes::new()) {
        Ok(frame) if frame.is_ok() => String::from_utf8_lossy(&frame.payload).into_owned(),
        Ok(_) => {
            tracing::warn!("LIST_INTERFACES returned ERROR");
            return error_reply();
        }
        Err(err) => {
            tracing::error!("exec helper call failed: {err}");
            return error_reply();
        }
    };

    let entries = parse_interfaces(&listing, &pseudo_classes, validator);
    list_reply(&entries)
}

/// Walks the interface tool's output line by line, building one
/// [`InterfaceEntry`] per header, skipping pseudo-class interfaces
/// entirely (spec §4.4).
fn parse_interfaces(text: &str, pseudo_classes: &str, validator: &Validator) -> Vec<InterfaceEntry> {
    let mut entries = Vec::new();
    let mut current: Option<InterfaceEntry> = None;
    let mut skip_current = false;

    for line in text.lines() {
        if let Some(header) = validator.parse_ifconfig_header(line) {
            if let Some(entry) = current.take() {
                if !skip_current {
                    entries.push(entry);
                }
            }
            skip_current = iface_is_pseudo(&header.name, pseudo_classes);
            current = Some(InterfaceEntry {
                name: header.name,
                pairs: vec![("flags".to_string(), header.flags), ("mtu".to_string(), header.mtu)],
            });
        } else if let Some((key, value)) = validator.parse_ifconfig_kv(line) {
            if let Some(entry) = current.as_mut() {
                entry.pairs.push((key, value));
            }
        }
    }
    if let Some(entry) = current.take() {
        if !skip_current {
            entries.push(entry);
        }
    }
    entries
}

fn handle_configure(iface: &str, stanzas: &[String], helpers: &HelperHandles, validator: &Validator) -> String {
    if !validator.validate_iface(iface) {
        tracing::warn!(%iface, "configure rejected: invalid interface name");
        return error_reply();
    }
    let payload = encode_write_payload(iface, stanzas);
    match helpers.write.borrow_mut().call(request_type::WRITE, payload) {
        Ok(frame) if frame.is_ok() => ok_reply(),
        Ok(_) => error_reply(),
        Err(err) => {
            tracing::error!("write helper call failed: {err}");
            error_reply()
        }
    }
}

fn handle_connect(iface: &str, helpers: &HelperHandles, validator: &Validator) -> String {
    if !validator.validate_iface(iface) {
        tracing::warn!(%iface, "connect rejected: invalid interface name");
        return error_reply();
    }
    let payload = encode_write_payload(iface, &[]);
    // AUTOCONFIGURE's result is ignored by design (spec §4.4).
    if let Err(err) = helpers.write.borrow_mut().call(request_type::AUTOCONFIGURE, payload) {
        tracing::warn!("autoconfigure call failed, proceeding anyway: {err}");
    }

    match helpers
        .exec
        .borrow_mut()
        .call(request_type::NETSTART, Bytes::from(iface.as_bytes().to_vec()))
    {
        Ok(frame) if frame.is_ok() => ok_reply(),
        Ok(_) => error_reply(),
        Err(err) => {
            tracing::error!("exec helper call failed: {err}");
            error_reply()
        }
    }
}

fn handle_disconnect(iface: &str, helpers: &HelperHandles, validator: &Validator) -> String {
    if !validator.validate_iface(iface) {
        tracing::warn!(%iface, "disconnect rejected: invalid interface name");
        return error_reply();
    }
    // Routed to the exec helper, not the write helper: see SPEC_FULL.md §9.
    match helpers
        .exec
        .borrow_mut()
        .call(request_type::IFCONFIG_DOWN, Bytes::from(iface.as_bytes().to_vec()))
    {
        Ok(frame) if frame.is_ok() => ok_reply(),
        Ok(_) => error_reply(),
        Err(err) => {
            tracing::error!("exec helper call failed: {err}");
            error_reply()
        }
    }
}

fn encode_write_payload(iface: &str, stanzas: &[String]) -> Bytes {
    let mut w = ArrayWriter::start();
    w.send(iface);
    for stanza in stanzas {
        w.send(stanza);
    }
    Bytes::from(w.finish().into_bytes())
}
