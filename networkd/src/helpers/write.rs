// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The write helper's request handling: validated, file-scoped
//! `configure`/`autoconfigure` operations. The payload is the same
//! JSON-array element encoding the client protocol uses — the first
//! element is the interface name, the rest are stanzas — so it is decoded
//! with `networkd_proto::split_elements` rather than a bespoke format.

use std::io::{self, Write};

use networkd_ipc::wire::{request_type, status};
use networkd_proto::split_elements;
use networkd_validate::Validator;

use crate::config::Config;

pub fn handle_request(cfg: &Config, validator: &Validator, kind: u32, payload: &[u8]) -> u32 {
    let elems = match decode_payload(payload) {
        Some(elems) if !elems.is_empty() => elems,
        _ => {
            tracing::warn!("write helper received a malformed payload");
            return status::ERROR;
        }
    };
    let iface = &elems[0];
    if !validator.validate_iface(iface) {
        tracing::warn!(%iface, "write helper rejected invalid interface name");
        return status::ERROR;
    }

    let result = match kind {
        request_type::WRITE => write_config(cfg, validator, iface, &elems[1..]),
        request_type::AUTOCONFIGURE => autoconfigure(cfg, iface),
        other => {
            tracing::warn!(kind = other, "write helper received unauthorized request type");
            return status::ERROR;
        }
    };

    match result {
        Ok(()) => status::OK,
        Err(err) => {
            tracing::warn!("write helper I/O failure: {err}");
            status::ERROR
        }
    }
}

fn decode_payload(payload: &[u8]) -> Option<Vec<String>> {
    let text = std::str::from_utf8(payload).ok()?;
    split_elements(text).ok()
}

/// Overwrites the hostname file with every stanza that passes
/// `validate_stanza`; an invalid stanza is skipped, never aborts the
/// whole write (spec §4.3).
fn write_config(cfg: &Config, validator: &Validator, iface: &str, stanzas: &[String]) -> io::Result<()> {
    let path = cfg.hostname_file(iface);
    let mut file = std::fs::File::create(&path)?;
    for stanza in stanzas {
        if !validator.validate_stanza(stanza) {
            tracing::warn!(%iface, %stanza, "dropping stanza that failed validation");
            continue;
        }
        writeln!(file, "{stanza}")?;
    }
    Ok(())
}

/// Creates the hostname file with a single `dhcp` line iff it does not
/// already exist; otherwise succeeds without touching it.
fn autoconfigure(cfg: &Config, iface: &str) -> io::Result<()> {
    let path = cfg.hostname_file(iface);
    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(mut file) => writeln!(file, "dhcp"),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use networkd_proto::ArrayWriter;
    use tempfile::tempdir;

    fn payload(elems: &[&str]) -> Vec<u8> {
        let mut w = ArrayWriter::start();
        for e in elems {
            w.send(e);
        }
        w.finish().into_bytes()
    }

    #[test]
    fn write_overwrites_and_skips_invalid_stanzas() {
        let dir = tempdir().unwrap();
        let cfg = Config::for_test(dir.path());
        let v = Validator::new().unwrap();
        let p = payload(&["em0", "inet 192.168.1.5 255.255.255.0 192.168.1.255", "!run /bin/sh", "dhcp"]);
        let st = handle_request(&cfg, &v, request_type::WRITE, &p);
        assert_eq!(st, status::OK);
        let contents = std::fs::read_to_string(cfg.hostname_file("em0")).unwrap();
        assert_eq!(
            contents,
            "inet 192.168.1.5 255.255.255.0 192.168.1.255\ndhcp\n"
        );
    }

    #[test]
    fn write_rejects_bad_iface_without_touching_filesystem() {
        let dir = tempdir().unwrap();
        let cfg = Config::for_test(dir.path());
        let v = Validator::new().unwrap();
        let p = payload(&[".badvalue", "dhcp"]);
        let st = handle_request(&cfg, &v, request_type::WRITE, &p);
        assert_eq!(st, status::ERROR);
        assert!(!cfg.hostname_file(".badvalue").exists());
    }

    #[test]
    fn autoconfigure_is_idempotent() {
        let dir = tempdir().unwrap();
        let cfg = Config::for_test(dir.path());
        let v = Validator::new().unwrap();
        let p = payload(&["em0"]);

        let st1 = handle_request(&cfg, &v, request_type::AUTOCONFIGURE, &p);
        assert_eq!(st1, status::OK);
        let after_first = std::fs::read_to_string(cfg.hostname_file("em0")).unwrap();
        assert_eq!(after_first, "dhcp\n");

        // A second autoconfigure must not alter the file's contents.
        std::fs::write(cfg.hostname_file("em0"), "dhcp\nnwid custom\n").unwrap();
        let st2 = handle_request(&cfg, &v, request_type::AUTOCONFIGURE, &p);
        assert_eq!(st2, status::OK);
        let after_second = std::fs::read_to_string(cfg.hostname_file("em0")).unwrap();
        assert_eq!(after_second, "dhcp\nnwid custom\n");
    }
}
