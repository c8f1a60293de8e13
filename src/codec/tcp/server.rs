// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP server (slave) specific functions.

use super::{split_mbap, write_mbap, Result};
use crate::codec::Encode;
use crate::error::Error;
use crate::frame::{
    Exception, ExceptionResponse, FunctionCode, Header, Request, RequestAdu, RequestPdu,
    ResponseAdu,
};

/// Outcome of decoding a request frame that parsed its MBAP header
/// successfully. A malformed payload that still names a well-formed
/// function code yields an `Exception` the caller should send back as a
/// normal response (an unregistered function code, or a bad coil write
/// value); anything else is a framing error serious enough to abort the
/// connection.
pub enum RequestDecode {
    Request(RequestAdu),
    Exception(Header, ExceptionResponse),
}

/// Decode a single, already-reassembled TCP request frame.
pub fn decode_request(frame: &[u8]) -> Result<RequestDecode> {
    let (hdr, pdu) = split_mbap(frame)?;
    match Request::try_from(pdu) {
        Ok(request) => Ok(RequestDecode::Request(RequestAdu {
            hdr,
            pdu: RequestPdu(request),
        })),
        Err(Error::FnCode(code)) => Ok(RequestDecode::Exception(
            hdr,
            ExceptionResponse {
                function: FunctionCode::new(code),
                exception: Exception::IllegalFunction,
            },
        )),
        Err(Error::CoilValue(_)) => Ok(RequestDecode::Exception(
            hdr,
            ExceptionResponse {
                function: FunctionCode::WriteSingleCoil,
                exception: Exception::IllegalDataValue,
            },
        )),
        Err(err) => Err(err),
    }
}

/// Encode a complete MBAP-framed response.
pub fn encode_response(adu: &ResponseAdu) -> Result<Vec<u8>> {
    let mut pdu = Vec::new();
    adu.pdu.encode(&mut pdu)?;
    let mut buf = Vec::with_capacity(7 + pdu.len());
    write_mbap(adu.hdr, &pdu, &mut buf);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FunctionCode, Header, Response, ResponsePdu};

    #[test]
    fn decode_write_single_register_request() {
        let buf: &[u8] = &[
            0x00, 0x2a, 0x00, 0x00, 0x00, 0x06, 0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD,
        ];
        let adu = match decode_request(buf).unwrap() {
            RequestDecode::Request(adu) => adu,
            RequestDecode::Exception(..) => panic!("expected a request"),
        };
        assert_eq!(adu.hdr.transaction_id, 42);
        assert_eq!(adu.hdr.unit_id, 0x12);
        assert_eq!(
            FunctionCode::from(&adu.pdu.0),
            FunctionCode::WriteSingleRegister
        );
    }

    #[test]
    fn decode_wrong_protocol() {
        let buf: &[u8] = &[
            0x00, 0x2a, 0x00, 0x01, 0x00, 0x06, 0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD,
        ];
        assert!(decode_request(buf).is_err());
    }

    #[test]
    fn decode_unknown_function_code_is_illegal_function_exception() {
        // 0x81: a reserved/never-valid function code (top bit set), distinct
        // from a merely unregistered code below 0x80 which decodes as
        // `Request::Custom` and is turned into an exception by the server's
        // dispatch instead.
        let buf: &[u8] = &[0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x12, 0x81];
        match decode_request(buf).unwrap() {
            RequestDecode::Exception(hdr, resp) => {
                assert_eq!(hdr.transaction_id, 1);
                assert_eq!(resp.exception, Exception::IllegalFunction);
            }
            RequestDecode::Request(_) => panic!("expected an exception"),
        }
    }

    #[test]
    fn decode_bad_coil_value_is_illegal_data_value_exception() {
        let buf: &[u8] = &[
            0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x12, 0x05, 0x00, 0x01, 0x12, 0x34,
        ];
        match decode_request(buf).unwrap() {
            RequestDecode::Exception(_, resp) => {
                assert_eq!(resp.exception, Exception::IllegalDataValue);
                assert_eq!(resp.function, FunctionCode::WriteSingleCoil);
            }
            RequestDecode::Request(_) => panic!("expected an exception"),
        }
    }

    #[test]
    fn encode_write_single_register_response() {
        let adu = ResponseAdu {
            hdr: Header {
                transaction_id: 42,
                unit_id: 0x12,
            },
            pdu: ResponsePdu(Ok(Response::WriteSingleRegister(0x2222, 0xABCD))),
        };
        let buf = encode_response(&adu).unwrap();
        assert_eq!(
            buf,
            vec![0x00, 0x2a, 0x00, 0x00, 0x00, 0x06, 0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD]
        );
    }
}
