// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Regex-driven validation and parsing for everything that crosses a
//! privilege boundary: interface names, configuration stanzas, and the
//! output of the host's interface tool.
//!
//! All patterns are compiled once, in [`Validator::new`], and reused for the
//! lifetime of the process rather than recompiled per call.

use regex::Regex;

/// Maximum length of a legal interface name (see the data model invariant).
pub const MAX_IFACE_LEN: usize = 15;

#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error("failed to compile validation pattern: {0}")]
    BadPattern(#[from] regex::Error),
}

/// One interface header line, as produced by `parse_ifconfig_header`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfaceHeader {
    pub name: String,
    pub flags: String,
    pub mtu: String,
}

/// Holds every compiled pattern the daemon needs. Construct once at
/// startup and share behind a reference; there is no mutable state here.
pub struct Validator {
    iface: Regex,
    stanza_dhcp: Regex,
    stanza_rtsol: Regex,
    stanza_nwid: Regex,
    stanza_wpakey: Regex,
    stanza_dest: Regex,
    stanza_inet: Regex,
    stanza_inet6: Regex,
    header: Regex,
    kv: Regex,
}

impl Validator {
    pub fn new() -> Result<Self, ValidateError> {
        Ok(Validator {
            iface: Regex::new(r"^[a-z]+[0-9]*$")?,
            stanza_dhcp: Regex::new(r"^dhcp$")?,
            stanza_rtsol: Regex::new(r"^rtsol$")?,
            stanza_nwid: Regex::new(r"^nwid .*$")?,
            stanza_wpakey: Regex::new(r"^wpakey .*$")?,
            // Deliberately a single character class, not a dotted-quad or
            // colon-hex run: the grammar preserves the original's loose
            // "dest" acceptance rather than tightening it. See §9.
            stanza_dest: Regex::new(r"^dest [0-9:.]$")?,
            stanza_inet: Regex::new(r"^inet [0-9.]+ [0-9.]+ [0-9.]+$")?,
            stanza_inet6: Regex::new(r"^inet6 [a-f0-9:]+ [a-f0-9:]+ [a-f0-9:]+$")?,
            header: Regex::new(r"^([a-z]+[0-9]*): flags=[0-9]+<([A-Z,]*)> mtu ([0-9]+)$")?,
            kv: Regex::new(r"^\t([a-z]+):? ([^\n]+)$")?,
        })
    }

    /// `^[a-z]+[0-9]*$`, additionally bounded to [`MAX_IFACE_LEN`] bytes.
    pub fn validate_iface(&self, s: &str) -> bool {
        s.len() <= MAX_IFACE_LEN && self.iface.is_match(s)
    }

    /// One of `dhcp`, `rtsol`, `nwid .*`, `wpakey .*`, `dest <char>`,
    /// `inet A B C`, `inet6 A B C`.
    pub fn validate_stanza(&self, s: &str) -> bool {
        self.stanza_dhcp.is_match(s)
            || self.stanza_rtsol.is_match(s)
            || self.stanza_nwid.is_match(s)
            || self.stanza_wpakey.is_match(s)
            || self.stanza_dest.is_match(s)
            || self.stanza_inet.is_match(s)
            || self.stanza_inet6.is_match(s)
    }

    pub fn parse_ifconfig_header(&self, line: &str) -> Option<IfaceHeader> {
        let caps = self.header.captures(line)?;
        Some(IfaceHeader {
            name: caps[1].to_string(),
            flags: caps[2].to_string(),
            mtu: caps[3].to_string(),
        })
    }

    /// A leading TAB distinguishes a continuation line from a header.
    pub fn parse_ifconfig_kv(&self, line: &str) -> Option<(String, String)> {
        let caps = self.kv.captures(line)?;
        Some((caps[1].to_string(), caps[2].to_string()))
    }
}

/// True iff `name`'s leading alphabetic prefix equals one of the
/// space-separated tokens in `class_list`. Pure string logic, no regex
/// needed.
pub fn iface_is_pseudo(name: &str, class_list: &str) -> bool {
    let prefix_len = name
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map(|(idx, _)| idx)
        .unwrap_or(name.len());
    let prefix = &name[..prefix_len];
    if prefix.is_empty() {
        return false;
    }
    class_list.split_whitespace().any(|tok| tok == prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn v() -> Validator {
        Validator::new().unwrap()
    }

    #[test]
    fn iface_accepts_letters_then_digits() {
        let v = v();
        assert!(v.validate_iface("em0"));
        assert!(v.validate_iface("lo0"));
        assert!(v.validate_iface("em"));
        assert!(!v.validate_iface("Em0"));
        assert!(!v.validate_iface("0em"));
        assert!(!v.validate_iface(".badvalue"));
        assert!(!v.validate_iface(""));
    }

    #[test]
    fn iface_rejects_over_length() {
        let v = v();
        let long = "a".repeat(MAX_IFACE_LEN + 1);
        assert!(!v.validate_iface(&long));
        let ok = "a".repeat(MAX_IFACE_LEN);
        assert!(v.validate_iface(&ok));
    }

    #[test]
    fn stanza_accepts_allow_listed_forms() {
        let v = v();
        assert!(v.validate_stanza("dhcp"));
        assert!(v.validate_stanza("rtsol"));
        assert!(v.validate_stanza("nwid myssid"));
        assert!(v.validate_stanza("wpakey secret"));
        assert!(v.validate_stanza("inet 192.168.1.5 255.255.255.0 192.168.1.255"));
        assert!(v.validate_stanza("inet6 fe80:: ffff:: fe80::1"));
    }

    #[test]
    fn stanza_rejects_shell_injection() {
        let v = v();
        assert!(!v.validate_stanza("!run /bin/sh"));
        assert!(!v.validate_stanza("dhcp; rm -rf /"));
    }

    #[test]
    fn header_line_parses_fields() {
        let v = v();
        let h = v
            .parse_ifconfig_header("em0: flags=8863<UP,BROADCAST,RUNNING> mtu 1500")
            .unwrap();
        assert_eq!(h.name, "em0");
        assert_eq!(h.flags, "UP,BROADCAST,RUNNING");
        assert_eq!(h.mtu, "1500");
    }

    #[test]
    fn kv_line_requires_leading_tab() {
        let v = v();
        assert!(v.parse_ifconfig_kv("\tstatus: active").is_some());
        assert!(v.parse_ifconfig_kv("status: active").is_none());
        let (k, val) = v.parse_ifconfig_kv("\tinet 10.0.0.1 netmask 0xffffff00").unwrap();
        assert_eq!(k, "inet");
        assert_eq!(val, "10.0.0.1 netmask 0xffffff00");
    }

    #[test]
    fn pseudo_prefix_matches_class_list() {
        assert!(iface_is_pseudo("lo0", "lo bridge pflog"));
        assert!(!iface_is_pseudo("em0", "lo bridge pflog"));
        assert!(iface_is_pseudo("pflog0", "lo bridge pflog"));
        assert!(!iface_is_pseudo("", "lo"));
    }
}
