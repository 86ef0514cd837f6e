// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The client-facing wire protocol: a whitespace-tolerant, line-delimited
//! JSON-array framing (`framing`) and the four-command vocabulary built on
//! top of it (`command`).

pub mod command;
pub mod framing;

pub use command::{
    error_reply, list_reply, ok_reply, split_elements, Command, InterfaceEntry, ParsedLine,
    MAX_ELEMENT_LEN,
};
pub use framing::{escape, next, ArrayWriter, FramingError, NextItem};
