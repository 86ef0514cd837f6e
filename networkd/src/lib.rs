// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Library surface for the `networkd` binary. Split out from `main.rs` so
//! that the integration tests under `tests/` can drive the command
//! dispatcher and the configuration/validation layers directly, the way a
//! real client session would, without forking a privileged process.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod fork;
pub mod helpers;
pub mod privilege;
pub mod routing;
pub mod supervisor;
