// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::Error, frame::*};
use byteorder::{BigEndian, ByteOrder};

pub mod reassembler;
pub mod tcp;

/// The type of decoding: requests are decoded by a server, responses by a
/// client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderType {
    Request,
    Response,
}

type Result<T> = core::result::Result<T, Error>;

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Ok(Self::from_code(code))
    }
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        let fn_code: u8 = ex.function.value();
        debug_assert!(fn_code < 0x80);
        [fn_code + 0x80, ex.exception.code()]
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::BufferSize);
        }
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return Err(Error::ExceptionFnCode(fn_err_code));
        }
        let function = FunctionCode::new(fn_err_code - 0x80);
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl TryFrom<&[u8]> for Request {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        use FunctionCode as F;

        if bytes.is_empty() {
            return Err(Error::BufferSize);
        }

        let fn_code = bytes[0];

        if bytes.len() < min_request_pdu_len(FunctionCode::new(fn_code)) {
            return Err(Error::BufferSize);
        }

        let req = match FunctionCode::new(fn_code) {
            F::ReadCoils
            | F::ReadDiscreteInputs
            | F::ReadInputRegisters
            | F::ReadHoldingRegisters
            | F::WriteSingleRegister => {
                let addr = BigEndian::read_u16(&bytes[1..3]);
                let quantity = BigEndian::read_u16(&bytes[3..5]);

                match FunctionCode::new(fn_code) {
                    F::ReadCoils => Self::ReadCoils(addr, quantity),
                    F::ReadDiscreteInputs => Self::ReadDiscreteInputs(addr, quantity),
                    F::ReadInputRegisters => Self::ReadInputRegisters(addr, quantity),
                    F::ReadHoldingRegisters => Self::ReadHoldingRegisters(addr, quantity),
                    F::WriteSingleRegister => Self::WriteSingleRegister(addr, quantity),
                    _ => unreachable!(),
                }
            }
            F::WriteSingleCoil => Self::WriteSingleCoil(
                BigEndian::read_u16(&bytes[1..3]),
                u16_coil_to_bool(BigEndian::read_u16(&bytes[3..5]))?,
            ),
            F::WriteMultipleCoils => {
                let address = BigEndian::read_u16(&bytes[1..3]);
                let quantity = BigEndian::read_u16(&bytes[3..5]) as usize;
                let byte_count = bytes[5];
                if bytes.len() < (6 + byte_count as usize) {
                    return Err(Error::ByteCount(byte_count));
                }
                let data = bytes[6..6 + byte_count as usize].to_vec();
                Self::WriteMultipleCoils(address, Coils::from_packed(data, quantity))
            }
            F::WriteMultipleRegisters => {
                let address = BigEndian::read_u16(&bytes[1..3]);
                let quantity = BigEndian::read_u16(&bytes[3..5]) as usize;
                let byte_count = bytes[5];
                if bytes.len() < (6 + byte_count as usize) {
                    return Err(Error::ByteCount(byte_count));
                }
                let data = bytes[6..6 + byte_count as usize].to_vec();
                Self::WriteMultipleRegisters(address, Data::from_bytes(data, quantity))
            }
            F::ReadWriteMultipleRegisters => {
                let read_address = BigEndian::read_u16(&bytes[1..3]);
                let read_quantity = BigEndian::read_u16(&bytes[3..5]);
                let write_address = BigEndian::read_u16(&bytes[5..7]);
                let write_quantity = BigEndian::read_u16(&bytes[7..9]) as usize;
                let write_count = bytes[9];
                if bytes.len() < (10 + write_count as usize) {
                    return Err(Error::ByteCount(write_count));
                }
                let data = bytes[10..10 + write_count as usize].to_vec();
                Self::ReadWriteMultipleRegisters(
                    read_address,
                    read_quantity,
                    write_address,
                    Data::from_bytes(data, write_quantity),
                )
            }
            _ => match fn_code {
                fn_code if fn_code < 0x80 => {
                    Self::Custom(FunctionCode::Custom(fn_code), bytes[1..].to_vec())
                }
                _ => return Err(Error::FnCode(fn_code)),
            },
        };
        Ok(req)
    }
}

impl TryFrom<&[u8]> for Response {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        use FunctionCode as F;
        if bytes.is_empty() {
            return Err(Error::BufferSize);
        }
        let fn_code = bytes[0];
        if bytes.len() < min_response_pdu_len(FunctionCode::new(fn_code)) {
            return Err(Error::BufferSize);
        }
        let rsp = match FunctionCode::new(fn_code) {
            F::ReadCoils | F::ReadDiscreteInputs => {
                let byte_count = bytes[1] as usize;
                if byte_count + 2 > bytes.len() {
                    return Err(Error::BufferSize);
                }
                let data = bytes[2..byte_count + 2].to_vec();
                // The byte count alone does not tell us the originally
                // requested quantity; the caller truncates via
                // `Coils::truncated` if it retained that count.
                let quantity = byte_count * 8;

                match FunctionCode::new(fn_code) {
                    F::ReadCoils => Self::ReadCoils(Coils::from_packed(data, quantity)),
                    F::ReadDiscreteInputs => {
                        Self::ReadDiscreteInputs(Coils::from_packed(data, quantity))
                    }
                    _ => unreachable!(),
                }
            }
            F::WriteSingleCoil => {
                let address = BigEndian::read_u16(&bytes[1..3]);
                let value = BigEndian::read_u16(&bytes[3..5]);
                Self::WriteSingleCoil(address, u16_coil_to_bool(value)?)
            }
            F::WriteMultipleCoils | F::WriteSingleRegister | F::WriteMultipleRegisters => {
                let addr = BigEndian::read_u16(&bytes[1..3]);
                let payload = BigEndian::read_u16(&bytes[3..5]);
                match FunctionCode::new(fn_code) {
                    F::WriteMultipleCoils => Self::WriteMultipleCoils(addr, payload),
                    F::WriteSingleRegister => Self::WriteSingleRegister(addr, payload),
                    F::WriteMultipleRegisters => Self::WriteMultipleRegisters(addr, payload),
                    _ => unreachable!(),
                }
            }
            F::ReadInputRegisters | F::ReadHoldingRegisters | F::ReadWriteMultipleRegisters => {
                let byte_count = bytes[1] as usize;
                let quantity = byte_count / 2;
                if byte_count + 2 > bytes.len() {
                    return Err(Error::BufferSize);
                }
                let data = Data::from_bytes(bytes[2..2 + byte_count].to_vec(), quantity);

                match FunctionCode::new(fn_code) {
                    F::ReadInputRegisters => Self::ReadInputRegisters(data),
                    F::ReadHoldingRegisters => Self::ReadHoldingRegisters(data),
                    F::ReadWriteMultipleRegisters => Self::ReadWriteMultipleRegisters(data),
                    _ => unreachable!(),
                }
            }
            _ => Self::Custom(FunctionCode::new(fn_code), bytes[1..].to_vec()),
        };
        Ok(rsp)
    }
}

/// Encode a PDU/ADU into a byte buffer, appending to it.
pub trait Encode {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()>;
}

impl Encode for Request {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.push(FunctionCode::from(self).value());
        match self {
            Self::ReadCoils(address, payload)
            | Self::ReadDiscreteInputs(address, payload)
            | Self::ReadInputRegisters(address, payload)
            | Self::ReadHoldingRegisters(address, payload)
            | Self::WriteSingleRegister(address, payload) => {
                write_u16(buf, *address);
                write_u16(buf, *payload);
            }
            Self::WriteSingleCoil(address, state) => {
                write_u16(buf, *address);
                write_u16(buf, bool_to_u16_coil(*state));
            }
            Self::WriteMultipleCoils(address, coils) => {
                write_u16(buf, *address);
                write_u16(buf, coils.len() as u16);
                buf.push(coils.packed_len() as u8);
                buf.extend_from_slice(coils.packed());
            }
            Self::WriteMultipleRegisters(address, words) => {
                write_u16(buf, *address);
                write_u16(buf, words.len() as u16);
                buf.push((words.len() * 2) as u8);
                buf.extend_from_slice(words.payload());
            }
            Self::ReadWriteMultipleRegisters(read_address, quantity, write_address, words) => {
                write_u16(buf, *read_address);
                write_u16(buf, *quantity);
                write_u16(buf, *write_address);
                write_u16(buf, words.len() as u16);
                buf.push((words.len() * 2) as u8);
                buf.extend_from_slice(words.payload());
            }
            Self::Custom(_, data) => buf.extend_from_slice(data),
        }
        Ok(())
    }
}

impl Encode for Response {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.push(FunctionCode::from(self).value());
        match self {
            Self::ReadCoils(coils) | Self::ReadDiscreteInputs(coils) => {
                buf.push(coils.packed_len() as u8);
                buf.extend_from_slice(coils.packed());
            }
            Self::ReadInputRegisters(registers)
            | Self::ReadHoldingRegisters(registers)
            | Self::ReadWriteMultipleRegisters(registers) => {
                buf.push((registers.len() * 2) as u8);
                buf.extend_from_slice(registers.payload());
            }
            Self::WriteSingleCoil(address, state) => {
                write_u16(buf, *address);
                write_u16(buf, bool_to_u16_coil(*state));
            }
            Self::WriteMultipleCoils(address, payload)
            | Self::WriteMultipleRegisters(address, payload)
            | Self::WriteSingleRegister(address, payload) => {
                write_u16(buf, *address);
                write_u16(buf, *payload);
            }
            Self::Custom(_, data) => buf.extend_from_slice(data),
        }
        Ok(())
    }
}

impl Encode for RequestPdu {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        self.0.encode(buf)
    }
}

impl Encode for ResponsePdu {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        match &self.0 {
            Ok(res) => res.encode(buf),
            Err(e) => e.encode(buf),
        }
    }
}

impl Encode for ExceptionResponse {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
        let bytes: [u8; 2] = (*self).into();
        buf.extend_from_slice(&bytes);
        Ok(())
    }
}

fn write_u16(buf: &mut Vec<u8>, value: u16) {
    let mut tmp = [0u8; 2];
    BigEndian::write_u16(&mut tmp, value);
    buf.extend_from_slice(&tmp);
}

const fn min_request_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode as F;
    match fn_code {
        F::ReadCoils
        | F::ReadDiscreteInputs
        | F::ReadInputRegisters
        | F::WriteSingleCoil
        | F::ReadHoldingRegisters
        | F::WriteSingleRegister => 5,
        F::WriteMultipleCoils | F::WriteMultipleRegisters => 6,
        F::ReadWriteMultipleRegisters => 10,
        F::Custom(_) => 1,
    }
}

const fn min_response_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode as F;
    match fn_code {
        F::ReadCoils
        | F::ReadDiscreteInputs
        | F::ReadInputRegisters
        | F::ReadHoldingRegisters
        | F::ReadWriteMultipleRegisters => 2,
        F::WriteSingleCoil => 5,
        F::WriteMultipleCoils | F::WriteSingleRegister | F::WriteMultipleRegisters => 5,
        F::Custom(_) => 1,
    }
}
