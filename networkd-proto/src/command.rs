// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The client-facing command vocabulary: parsing one line into a
//! [`Command`], and building the `ok`/`error` replies.

use crate::framing::{next, singleton, ArrayWriter, FramingError, NextItem};

/// Default cap on a single command-line frame's string elements.
pub const MAX_ELEMENT_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Configure { iface: String, stanzas: Vec<String> },
    Connect { iface: String },
    Disconnect { iface: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Command(Command),
    /// Recognized shape, unknown command name: ignored with a warning, no
    /// reply is sent.
    Unknown(String),
}

/// Parses one newline-stripped line into its JSON array elements.
pub fn split_elements(line: &str) -> Result<Vec<String>, FramingError> {
    let mut elems = Vec::new();
    let mut rest = line;
    loop {
        let (item, tail) = next(rest, MAX_ELEMENT_LEN)?;
        match item {
            NextItem::Value(v) => {
                elems.push(v);
                rest = tail;
            }
            NextItem::End => break,
        }
    }
    Ok(elems)
}

impl Command {
    /// Builds a `Command` from already-split JSON array elements. Returns
    /// `None` for an empty frame (nothing to dispatch).
    pub fn from_elements(elems: Vec<String>) -> Option<ParsedLine> {
        let mut iter = elems.into_iter();
        let name = iter.next()?;
        let args: Vec<String> = iter.collect();
        Some(match name.as_str() {
            "list" => ParsedLine::Command(Command::List),
            "configure" => {
                let mut args = args.into_iter();
                match args.next() {
                    Some(iface) => ParsedLine::Command(Command::Configure {
                        iface,
                        stanzas: args.collect(),
                    }),
                    None => ParsedLine::Unknown(name),
                }
            }
            "connect" => match args.into_iter().next() {
                Some(iface) => ParsedLine::Command(Command::Connect { iface }),
                None => ParsedLine::Unknown(name),
            },
            "disconnect" => match args.into_iter().next() {
                Some(iface) => ParsedLine::Command(Command::Disconnect { iface }),
                None => ParsedLine::Unknown(name),
            },
            _ => ParsedLine::Unknown(name),
        })
    }
}

/// One non-pseudo interface's `list` contribution: the header pairs plus
/// every subsequent key/value line, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InterfaceEntry {
    pub name: String,
    pub pairs: Vec<(String, String)>,
}

pub fn ok_reply() -> String {
    singleton("ok")
}

pub fn error_reply() -> String {
    singleton("error")
}

/// Builds the `list` command's success reply: `["ok", "<iface>.<key>",
/// "<value>", …]`.
pub fn list_reply(entries: &[InterfaceEntry]) -> String {
    let mut w = ArrayWriter::start();
    w.send("ok");
    for entry in entries {
        for (key, value) in &entry.pairs {
            w.send(&format!("{}.{}", entry.name, key));
            w.send(value);
        }
    }
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elems(line: &str) -> Vec<String> {
        split_elements(line).unwrap()
    }

    #[test]
    fn parses_list() {
        let parsed = Command::from_elements(elems(r#"["list"]"#)).unwrap();
        assert_eq!(parsed, ParsedLine::Command(Command::List));
    }

    #[test]
    fn parses_configure_with_stanzas() {
        let parsed = Command::from_elements(elems(
            r#"["configure","em0","inet 192.168.1.5 255.255.255.0 192.168.1.255","dhcp"]"#,
        ))
        .unwrap();
        assert_eq!(
            parsed,
            ParsedLine::Command(Command::Configure {
                iface: "em0".to_string(),
                stanzas: vec![
                    "inet 192.168.1.5 255.255.255.0 192.168.1.255".to_string(),
                    "dhcp".to_string(),
                ],
            })
        );
    }

    #[test]
    fn parses_connect_and_disconnect() {
        assert_eq!(
            Command::from_elements(elems(r#"["connect","em0"]"#)).unwrap(),
            ParsedLine::Command(Command::Connect {
                iface: "em0".to_string()
            })
        );
        assert_eq!(
            Command::from_elements(elems(r#"["disconnect","em0"]"#)).unwrap(),
            ParsedLine::Command(Command::Disconnect {
                iface: "em0".to_string()
            })
        );
    }

    #[test]
    fn unknown_command_is_ignored_not_errored() {
        let parsed = Command::from_elements(elems(r#"["frobnicate","em0"]"#)).unwrap();
        assert_eq!(parsed, ParsedLine::Unknown("frobnicate".to_string()));
    }

    #[test]
    fn configure_without_iface_is_unknown_shape() {
        let parsed = Command::from_elements(elems(r#"["configure"]"#)).unwrap();
        assert_eq!(parsed, ParsedLine::Unknown("configure".to_string()));
    }

    #[test]
    fn list_reply_interleaves_iface_dot_key_pairs() {
        let entries = vec![InterfaceEntry {
            name: "em0".to_string(),
            pairs: vec![
                ("flags".to_string(), "UP,RUNNING".to_string()),
                ("mtu".to_string(), "1500".to_string()),
            ],
        }];
        assert_eq!(
            list_reply(&entries),
            r#"["ok","em0.flags","UP,RUNNING","em0.mtu","1500"]"#
        );
    }

    #[test]
    fn error_and_ok_replies() {
        assert_eq!(ok_reply(), "[\"ok\"]");
        assert_eq!(error_reply(), "[\"error\"]");
    }
}
