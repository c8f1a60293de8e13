// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP client (master) specific functions.

use super::{split_mbap, write_mbap, Result};
use crate::codec::Encode;
use crate::frame::{ExceptionResponse, Response, ResponseAdu, ResponsePdu, RequestAdu};

/// Encode a complete MBAP-framed request.
pub fn encode_request(adu: &RequestAdu) -> Result<Vec<u8>> {
    let mut pdu = Vec::new();
    adu.pdu.encode(&mut pdu)?;
    let mut buf = Vec::with_capacity(7 + pdu.len());
    write_mbap(adu.hdr, &pdu, &mut buf);
    Ok(buf)
}

/// Decode a single, already-reassembled TCP response frame.
pub fn decode_response(frame: &[u8]) -> Result<ResponseAdu> {
    let (hdr, pdu) = split_mbap(frame)?;
    let pdu = ExceptionResponse::try_from(pdu)
        .map(|er| ResponsePdu(Err(er)))
        .or_else(|_| Response::try_from(pdu).map(|r| ResponsePdu(Ok(r))))?;
    Ok(ResponseAdu { hdr, pdu })
}
