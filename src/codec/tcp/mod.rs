// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MBAP framing: compose/decompose a whole MODBUS/TCP frame (header + PDU).
//!
//! Frames handed to [`client::decode_response`] / [`server::decode_request`]
//! are expected to already be exactly one frame, as produced by
//! [`crate::codec::reassembler`].

use byteorder::{BigEndian, ByteOrder};

use crate::error::Error;
use crate::frame::{Header, TransactionId, UnitId};

pub mod client;
pub mod server;

type Result<T> = core::result::Result<T, Error>;

fn split_mbap(frame: &[u8]) -> Result<(Header, &[u8])> {
    if frame.len() < 8 {
        return Err(Error::ShortFrame);
    }
    let transaction_id: TransactionId = BigEndian::read_u16(&frame[0..2]);
    let protocol_id = BigEndian::read_u16(&frame[2..4]);
    if protocol_id != 0 {
        return Err(Error::ProtocolNotModbus(protocol_id));
    }
    let length = BigEndian::read_u16(&frame[4..6]);
    let unit_id: UnitId = frame[6];
    let pdu = &frame[7..];
    // length = unitID(1) + functionCode(1) + data; `pdu` already starts at
    // the function code, so unitID's contribution is the `+ 1` here.
    if length as usize != pdu.len() + 1 {
        return Err(Error::LengthMismatch(length, (pdu.len() + 1) as u16));
    }
    Ok((
        Header {
            transaction_id,
            unit_id,
        },
        pdu,
    ))
}

fn write_mbap(hdr: Header, pdu: &[u8], buf: &mut Vec<u8>) {
    let mut prefix = [0u8; 7];
    BigEndian::write_u16(&mut prefix[0..2], hdr.transaction_id);
    // protocolID is always 0 for Modbus.
    // length = unitID(1) + functionCode(1) + data, and `pdu` already starts
    // at the function code, so unitID's contribution is the `+ 1` here.
    BigEndian::write_u16(&mut prefix[4..6], (pdu.len() + 1) as u16);
    prefix[6] = hdr.unit_id;
    buf.extend_from_slice(&prefix);
    buf.extend_from_slice(pdu);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_mbap_rejects_short_frame() {
        assert!(matches!(split_mbap(&[0; 7]), Err(Error::ShortFrame)));
    }

    #[test]
    fn split_mbap_rejects_non_modbus_protocol() {
        let frame = &[0x00, 0x01, 0x00, 0x01, 0x00, 0x02, 0x01, 0x03];
        assert!(matches!(
            split_mbap(frame),
            Err(Error::ProtocolNotModbus(1))
        ));
    }

    #[test]
    fn split_mbap_rejects_length_mismatch() {
        let frame = &[0x00, 0x01, 0x00, 0x00, 0x00, 0x09, 0x01, 0x03];
        assert!(matches!(split_mbap(frame), Err(Error::LengthMismatch(9, 2))));
    }

    #[test]
    fn write_then_split_round_trips() {
        let hdr = Header {
            transaction_id: 0x0102,
            unit_id: 0x11,
        };
        let pdu = &[0x03, 0x00, 0x6B, 0x00, 0x03];
        let mut buf = Vec::new();
        write_mbap(hdr, pdu, &mut buf);
        let (decoded_hdr, decoded_pdu) = split_mbap(&buf).unwrap();
        assert_eq!(decoded_hdr, hdr);
        assert_eq!(decoded_pdu, pdu);
    }
}
