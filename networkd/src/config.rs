// Copyright 2021-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process configuration, resolved once from the CLI and handed by
//! reference to every component. Grounded on `datadog-sidecar`'s
//! `Config`/`FromEnv` pair, minus the environment-variable sourcing —
//! this daemon's only external inputs are its two flags.

use std::path::PathBuf;
use std::sync::OnceLock;

use clap::Parser;

pub const DEFAULT_SOCKET_PATH: &str = "/var/run/networkd.sock";
pub const DEFAULT_USER: &str = "_networkd";
pub const DEFAULT_GROUP: &str = "network";

pub const IFCONFIG_PATH: &str = "/sbin/ifconfig";
pub const SH_PATH: &str = "/bin/sh";
pub const NETSTART_SCRIPT: &str = "/etc/netstart";
pub const LOGGER_PATH: &str = "/usr/bin/logger";
pub const HOSTNAME_IF_DIR: &str = "/etc";

/// Exec helper output cap (see spec §4.2): larger captures are truncated.
pub const EXEC_OUTPUT_CAP: usize = 1024 * 1024;

/// Accept queue backlog for the listening socket.
pub const LISTEN_BACKLOG: i32 = 5;

/// Bytes read per `read()` off a client connection (see spec §4.4).
pub const CLIENT_READ_CHUNK: usize = 200;

#[derive(Debug, Parser)]
#[command(name = "networkd", about = "Privilege-separated network interface daemon")]
pub struct Cli {
    /// Path of the control socket to bind.
    #[arg(short = 's', long = "socket", default_value = DEFAULT_SOCKET_PATH)]
    pub socket_path: PathBuf,

    /// Unprivileged account the supervisor drops to after binding.
    #[arg(short = 'u', long = "user", default_value = DEFAULT_USER)]
    pub user: String,
}

/// Resolved configuration for this run. Cheap to clone; every component
/// that needs a path or limit borrows or clones one of these rather than
/// re-parsing `std::env::args()`.
#[derive(Debug, Clone)]
pub struct Config {
    pub socket_path: PathBuf,
    pub user: String,
    pub group: String,
    pub ifconfig_path: PathBuf,
    pub sh_path: PathBuf,
    pub netstart_script: PathBuf,
    pub logger_path: PathBuf,
    pub hostname_if_dir: PathBuf,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Self {
        Config {
            socket_path: cli.socket_path,
            user: cli.user,
            group: DEFAULT_GROUP.to_string(),
            ifconfig_path: PathBuf::from(IFCONFIG_PATH),
            sh_path: PathBuf::from(SH_PATH),
            netstart_script: PathBuf::from(NETSTART_SCRIPT),
            logger_path: PathBuf::from(LOGGER_PATH),
            hostname_if_dir: PathBuf::from(HOSTNAME_IF_DIR),
        }
    }

    #[cfg(test)]
    pub fn for_test(dir: &std::path::Path) -> Self {
        Config {
            socket_path: dir.join("networkd.sock"),
            user: DEFAULT_USER.to_string(),
            group: DEFAULT_GROUP.to_string(),
            ifconfig_path: PathBuf::from("/bin/true"),
            sh_path: PathBuf::from(SH_PATH),
            netstart_script: dir.join("netstart"),
            logger_path: PathBuf::from("/bin/true"),
            hostname_if_dir: dir.to_path_buf(),
        }
    }

    pub fn hostname_file(&self, iface: &str) -> PathBuf {
        self.hostname_if_dir.join(format!("hostname.{iface}"))
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Parses `cli` into the process-wide [`Config`] and stores it behind a
/// `OnceLock`, built once and handed to every component that needs it —
/// never re-parsed. Must be called exactly once, before the supervisor
/// forks either helper, since both helpers read it back via [`get`] after
/// `fork()` rather than having it passed down explicitly.
pub fn init(cli: Cli) -> &'static Config {
    CONFIG.get_or_init(|| Config::from_cli(cli))
}

/// Borrows the process-wide `Config`. Panics if called before [`init`] —
/// every entry point (the supervisor and both forked helpers) calls or
/// inherits `init` before doing anything else.
pub fn get() -> &'static Config {
    CONFIG.get().expect("config::init must run before config::get")
}
