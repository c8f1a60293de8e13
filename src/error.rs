// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;
use std::net::SocketAddr;

/// modbus-engine wire-level Error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid coil value
    CoilValue(u16),
    /// Invalid buffer size
    BufferSize,
    /// Invalid function code
    FnCode(u8),
    /// Invalid exception code
    ExceptionCode(u8),
    /// Invalid exception function code
    ExceptionFnCode(u8),
    /// Invalid byte count
    ByteCount(u8),
    /// MBAP `length` does not match `unitID + functionCode + data`
    LengthMismatch(u16, u16),
    /// Protocol not Modbus
    ProtocolNotModbus(u16),
    /// Buffer ended before a complete field could be read
    ShortFrame,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::CoilValue(v) => write!(f, "Invalid coil value: {v}"),
            Self::BufferSize => write!(f, "Invalid buffer size"),
            Self::FnCode(fn_code) => write!(f, "Invalid function code: 0x{fn_code:0>2X}"),
            Self::ExceptionCode(code) => write!(f, "Invalid exception code:0x {code:0>2X}"),
            Self::ExceptionFnCode(code) => {
                write!(f, "Invalid exception function code:0x {code:0>2X}")
            }
            Self::ByteCount(cnt) => write!(f, "Invalid byte count: {cnt}"),
            Self::LengthMismatch(length_field, expected) => write!(
                f,
                "Length Mismatch: MBAP length: {length_field}, expected: {expected}"
            ),
            Self::ProtocolNotModbus(protocol_id) => {
                write!(f, "Protocol not Modbus(0), received {protocol_id} instead")
            }
            Self::ShortFrame => write!(f, "frame ended before a complete field"),
        }
    }
}

impl std::error::Error for Error {}

/// Transport-level failure: connect failure, idle timeout, reset, or a
/// clean close mid-transaction. Aborts every slot of the affected
/// destination queue.
#[derive(Debug, thiserror::Error, Clone)]
pub enum TransportError {
    #[error("connection closed")]
    ConnectionClosed,
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),
    #[error("connection idle for longer than {0:?}")]
    IdleTimeout(std::time::Duration),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Local, per-slot failure: decode error, codec out-of-range, or explicit
/// cancellation. Aborts only the affected slot.
#[derive(Debug, thiserror::Error, Clone)]
pub enum ControllerError {
    #[error("wire decode error: {0}")]
    Decode(#[from] Error),
    #[error("register codec error: {0}")]
    Codec(#[from] crate::registers::CodecError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("request cancelled")]
    Cancelled,
    #[error("no queue for destination {0}")]
    NoQueue(SocketAddr),
}
