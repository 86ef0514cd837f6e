// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Framed length-prefixed messaging between the supervisor and its two
//! helper children.

pub mod channel;
pub mod wire;

pub use channel::Channel;
pub use wire::{request_type, status, Frame, HeaderCodec, WireError, HEADER_LEN, MAX_PAYLOAD};
