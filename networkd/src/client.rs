// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One client connection's read/dispatch/reply loop. Every complete line
//! already buffered is processed, in order, before the next `read()` —
//! this is what gives a single connection its per-client ordering
//! guarantee even though a client may pipeline several commands into one
//! `write()` (spec §4.4, §5).

use std::rc::Rc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use networkd_proto::{split_elements, Command, ParsedLine};
use networkd_validate::Validator;

use crate::config::CLIENT_READ_CHUNK;
use crate::dispatch::{handle_command, HelperHandles};

pub async fn handle_client(mut stream: UnixStream, helpers: HelperHandles, validator: Rc<Validator>) {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; CLIENT_READ_CHUNK];

    loop {
        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line = buf.drain(..=pos).collect::<Vec<u8>>();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
            if let Some(reply) = process_line(&line, &helpers, &validator).await {
                if write_reply(&mut stream, &reply).await.is_err() {
                    return;
                }
            }
        }

        match stream.read(&mut chunk).await {
            Ok(0) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(err) => {
                tracing::warn!("client read error: {err}");
                return;
            }
        }
    }
}

async fn process_line(line: &str, helpers: &HelperHandles, validator: &Validator) -> Option<String> {
    let elements = match split_elements(line) {
        Ok(elems) => elems,
        Err(err) => {
            // Frame-level protocol errors (overflow, invalid escape) are
            // logged and the line is dropped with no reply, the same as an
            // unknown command — only operation-level validation failures
            // (bad iface/stanza) get an explicit `["error"]` (spec §7).
            tracing::warn!("protocol error on client line: {err}");
            return None;
        }
    };

    match Command::from_elements(elements) {
        Some(ParsedLine::Command(cmd)) => Some(handle_command(cmd, helpers, validator).await),
        Some(ParsedLine::Unknown(name)) => {
            tracing::warn!(command = %name, "ignoring unrecognized command");
            None
        }
        None => None,
    }
}

async fn write_reply(stream: &mut UnixStream, reply: &str) -> std::io::Result<()> {
    stream.write_all(reply.as_bytes()).await?;
    stream.write_all(b"\n").await
}
