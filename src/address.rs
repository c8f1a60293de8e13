// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination parsing: `host[:port]` strings and the 5/6-digit human
//! register address convention.
//!
//! Accepts a bare host defaulting to port 502, and maps human-readable
//! register numbers (e.g. `40001`) onto a register type plus a zero-based
//! address.

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};

pub const DEFAULT_PORT: u16 = 502;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid destination {0:?}")]
    InvalidDestination(String),
    #[error("{0:?} cannot be resolved to a socket address")]
    Unresolvable(String),
    #[error("{0:?} is not a valid human register address")]
    InvalidHumanAddress(String),
}

/// Parse a `host[:port]` destination, defaulting to port 502 when omitted.
pub fn parse_destination(s: &str) -> Result<SocketAddr, AddressError> {
    let candidate = if s.contains(':') {
        s.to_owned()
    } else {
        format!("{s}:{DEFAULT_PORT}")
    };
    candidate
        .to_socket_addrs()
        .map_err(|_| AddressError::InvalidDestination(s.to_owned()))?
        .next()
        .ok_or_else(|| AddressError::Unresolvable(s.to_owned()))
}

/// The four Modbus register types, as distinguished by the human addressing
/// convention's leading digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    Coil,
    DiscreteInput,
    InputRegister,
    HoldingRegister,
}

impl fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RegisterKind::Coil => "coil",
            RegisterKind::DiscreteInput => "discrete input",
            RegisterKind::InputRegister => "input register",
            RegisterKind::HoldingRegister => "holding register",
        };
        f.write_str(s)
    }
}

/// A human register address resolved to its kind and zero-based offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanAddress {
    pub kind: RegisterKind,
    pub address: u16,
}

/// Resolve a human register number per the 5/6-digit convention:
///
/// - 1-4 digits: coil, address is the number minus one.
/// - leading digit `0`: coil (`0xxxx`).
/// - leading digit `1`: discrete input (`1xxxx`).
/// - leading digit `3`: input register (`3xxxx`).
/// - leading digit `4`: holding register (`4xxxx`).
/// - leading digit `2`, or anything else, is unsupported.
///
/// `digits <= 4` is treated as coil, and type code `2` is deliberately left
/// unsupported — it names no Modbus register kind.
pub fn parse_human_register(s: &str) -> Result<HumanAddress, AddressError> {
    let digits = s.len();
    let n: u32 = s
        .parse()
        .map_err(|_| AddressError::InvalidHumanAddress(s.to_owned()))?;

    if digits <= 4 {
        let address = n
            .checked_sub(1)
            .ok_or_else(|| AddressError::InvalidHumanAddress(s.to_owned()))?;
        return Ok(HumanAddress {
            kind: RegisterKind::Coil,
            address: u16::try_from(address)
                .map_err(|_| AddressError::InvalidHumanAddress(s.to_owned()))?,
        });
    }

    let leading = n / 10u32.pow(digits as u32 - 1);
    let rest = n % 10u32.pow(digits as u32 - 1);
    let kind = match leading {
        0 => RegisterKind::Coil,
        1 => RegisterKind::DiscreteInput,
        3 => RegisterKind::InputRegister,
        4 => RegisterKind::HoldingRegister,
        _ => return Err(AddressError::InvalidHumanAddress(s.to_owned())),
    };
    let address = rest
        .checked_sub(1)
        .ok_or_else(|| AddressError::InvalidHumanAddress(s.to_owned()))?;
    Ok(HumanAddress {
        kind,
        address: u16::try_from(address)
            .map_err(|_| AddressError::InvalidHumanAddress(s.to_owned()))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_defaults_to_port_502() {
        let addr = parse_destination("127.0.0.1").unwrap();
        assert_eq!(addr.port(), 502);
    }

    #[test]
    fn destination_honors_explicit_port() {
        let addr = parse_destination("127.0.0.1:1502").unwrap();
        assert_eq!(addr.port(), 1502);
    }

    #[test]
    fn short_numbers_are_coils() {
        let addr = parse_human_register("1").unwrap();
        assert_eq!(addr.kind, RegisterKind::Coil);
        assert_eq!(addr.address, 0);
    }

    #[test]
    fn four_digit_numbers_are_coils() {
        let addr = parse_human_register("9999").unwrap();
        assert_eq!(addr.kind, RegisterKind::Coil);
        assert_eq!(addr.address, 9998);
    }

    #[test]
    fn five_digit_40001_is_first_holding_register() {
        let addr = parse_human_register("40001").unwrap();
        assert_eq!(addr.kind, RegisterKind::HoldingRegister);
        assert_eq!(addr.address, 0);
    }

    #[test]
    fn five_digit_30001_is_first_input_register() {
        let addr = parse_human_register("30001").unwrap();
        assert_eq!(addr.kind, RegisterKind::InputRegister);
        assert_eq!(addr.address, 0);
    }

    #[test]
    fn five_digit_10001_is_first_discrete_input() {
        let addr = parse_human_register("10001").unwrap();
        assert_eq!(addr.kind, RegisterKind::DiscreteInput);
        assert_eq!(addr.address, 0);
    }

    #[test]
    fn five_digit_00001_is_first_coil() {
        let addr = parse_human_register("00001").unwrap();
        assert_eq!(addr.kind, RegisterKind::Coil);
        assert_eq!(addr.address, 0);
    }

    #[test]
    fn five_digit_20001_is_unsupported() {
        assert!(parse_human_register("20001").is_err());
    }

    #[test]
    fn invalid_human_address_is_rejected() {
        assert!(parse_human_register("abc").is_err());
        assert!(parse_human_register("0").is_err());
    }
}
