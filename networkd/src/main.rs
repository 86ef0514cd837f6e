// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Entry point: parse the CLI, initialize logging, build the
//! single-threaded runtime, and run the supervisor to completion.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use networkd::config::{self, Cli};
use networkd::{privilege, supervisor};

fn main() {
    let cli = Cli::parse();
    init_tracing();

    tracing::info!(euid = %privilege::effective_uid(), "networkd starting");
    let cfg = config::init(cli);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("failed to build async runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(supervisor::run(cfg)) {
        tracing::error!("fatal: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
