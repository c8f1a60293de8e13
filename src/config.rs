// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Environment-driven configuration: connect/idle timeouts and the server
//! bind address.

use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::address::DEFAULT_PORT;

/// Connect/idle timeouts and server bind address, read from
/// `CONNECT_TIMEOUT`/`IDLE_TIMEOUT`/`SERVER_HOST`/`SERVER_PORT`: an unset or
/// `0` timeout means "no timeout", and an unset host binds to all
/// interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub connect_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub server_host: IpAddr,
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config::from_env()
    }
}

impl Config {
    /// Build a `Config` from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Config {
            connect_timeout: env_timeout_secs("CONNECT_TIMEOUT"),
            idle_timeout: env_timeout_secs("IDLE_TIMEOUT"),
            server_host: env_host("SERVER_HOST"),
            server_port: env_port("SERVER_PORT"),
        }
    }
}

fn env_timeout_secs(key: &str) -> Option<Duration> {
    let secs: u64 = env::var(key).ok()?.parse().ok()?;
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

fn env_host(key: &str) -> IpAddr {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn env_port(key: &str) -> u16 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}
