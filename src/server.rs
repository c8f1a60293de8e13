// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Modbus/TCP server (slave) side: dispatches decoded requests to a
//! user-supplied [`RegisterStore`] and replies with the matching response or
//! exception.
//!
//! An unknown function code synthesizes an `ILLEGAL_FUNCTION` exception,
//! reusing the request's transaction and unit ID verbatim. [`InMemoryStore`]
//! is a plain `Vec`-backed [`RegisterStore`] so the crate is runnable out of
//! the box without a real backing store.

use std::sync::Mutex;

use crate::codec::tcp::server::{decode_request, encode_response, RequestDecode};
use crate::error::Error;
use crate::frame::{
    Coils, Data, Exception, ExceptionResponse, FunctionCode, Header, Request, RequestAdu,
    Response, ResponseAdu, ResponsePdu,
};

/// Hooks a server-side store exposes to [`ModbusServer`].
///
/// `pull_*` is invoked before a read is served, `push_*` after a write is
/// applied; both default to no-ops so implementers only override what they
/// need (e.g. to refresh cached values from real I/O).
pub trait RegisterStore: Send + Sync {
    fn coils(&self) -> std::sync::MutexGuard<'_, Vec<bool>>;
    fn registers(&self) -> std::sync::MutexGuard<'_, Vec<u16>>;

    fn pull_coils(&self, _address: u16, _count: u16) {}
    fn pull_registers(&self, _address: u16, _count: u16) {}
    fn push_coils(&self, _address: u16, _count: u16) {}
    fn push_registers(&self, _address: u16, _count: u16) {}
}

/// A plain in-memory [`RegisterStore`], sized at construction.
pub struct InMemoryStore {
    coils: Mutex<Vec<bool>>,
    registers: Mutex<Vec<u16>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new(coil_count: usize, register_count: usize) -> Self {
        InMemoryStore {
            coils: Mutex::new(vec![false; coil_count]),
            registers: Mutex::new(vec![0; register_count]),
        }
    }
}

impl RegisterStore for InMemoryStore {
    fn coils(&self) -> std::sync::MutexGuard<'_, Vec<bool>> {
        self.coils.lock().expect("coil store poisoned")
    }

    fn registers(&self) -> std::sync::MutexGuard<'_, Vec<u16>> {
        self.registers.lock().expect("register store poisoned")
    }
}

/// Dispatches decoded requests against a [`RegisterStore`] and builds the
/// matching response or exception.
pub struct ModbusServer<S> {
    store: S,
}

impl<S: RegisterStore> ModbusServer<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        ModbusServer { store }
    }

    /// Decode one reassembled request frame, dispatch it, and encode the
    /// reply frame to send back. A malformed payload that still names a
    /// well-formed function code (`RequestDecode::Exception`) is answered
    /// directly without reaching [`Self::dispatch`].
    pub fn handle_frame(&self, frame: &[u8]) -> Result<Vec<u8>, Error> {
        let response = match decode_request(frame)? {
            RequestDecode::Request(adu) => self.handle(&adu),
            RequestDecode::Exception(hdr, exception) => ResponseAdu {
                hdr,
                pdu: ResponsePdu(Err(exception)),
            },
        };
        encode_response(&response)
    }

    /// Handle one already-decoded request, returning the response ADU to
    /// send back (reusing the request's transaction and unit ID).
    pub fn handle(&self, adu: &RequestAdu) -> ResponseAdu {
        let function = FunctionCode::from(&adu.pdu.0);
        let result = self.dispatch(&adu.pdu.0);
        let pdu = match result {
            Ok(response) => ResponsePdu(Ok(response)),
            Err(exception) => ResponsePdu(Err(ExceptionResponse {
                function,
                exception,
            })),
        };
        ResponseAdu {
            hdr: adu.hdr,
            pdu,
        }
    }

    fn dispatch(&self, request: &Request) -> Result<Response, Exception> {
        match *request {
            Request::ReadCoils(address, count) => {
                self.store.pull_coils(address, count);
                let slice = self.read_bits(&self.store.coils(), address, count)?;
                Ok(Response::ReadCoils(Coils::from_bools(&slice)))
            }
            Request::ReadDiscreteInputs(address, count) => {
                self.store.pull_coils(address, count);
                let slice = self.read_bits(&self.store.coils(), address, count)?;
                Ok(Response::ReadDiscreteInputs(Coils::from_bools(&slice)))
            }
            Request::ReadHoldingRegisters(address, count) => {
                self.store.pull_registers(address, count);
                let slice = self.read_words(&self.store.registers(), address, count)?;
                Ok(Response::ReadHoldingRegisters(Data::from_words(&slice)))
            }
            Request::ReadInputRegisters(address, count) => {
                self.store.pull_registers(address, count);
                let slice = self.read_words(&self.store.registers(), address, count)?;
                Ok(Response::ReadInputRegisters(Data::from_words(&slice)))
            }
            Request::WriteSingleCoil(address, value) => {
                self.write_bit(address, value)?;
                self.store.push_coils(address, 1);
                Ok(Response::WriteSingleCoil(address, value))
            }
            Request::WriteSingleRegister(address, value) => {
                self.write_word(address, value)?;
                self.store.push_registers(address, 1);
                Ok(Response::WriteSingleRegister(address, value))
            }
            Request::WriteMultipleCoils(address, ref coils) => {
                let count = coils.len() as u16;
                self.write_bits(address, coils)?;
                self.store.push_coils(address, count);
                Ok(Response::WriteMultipleCoils(address, count))
            }
            Request::WriteMultipleRegisters(address, ref data) => {
                let count = data.len() as u16;
                self.write_words(address, &data.to_words())?;
                self.store.push_registers(address, count);
                Ok(Response::WriteMultipleRegisters(address, count))
            }
            Request::ReadWriteMultipleRegisters(read_address, read_count, write_address, ref data) => {
                self.write_words(write_address, &data.to_words())?;
                self.store.push_registers(write_address, data.len() as u16);
                self.store.pull_registers(read_address, read_count);
                let slice = self.read_words(&self.store.registers(), read_address, read_count)?;
                Ok(Response::ReadWriteMultipleRegisters(Data::from_words(&slice)))
            }
            Request::Custom(code, _) => Err(Exception::IllegalFunction).map_err(|e| {
                debug!("unsupported custom function code {code:?}");
                e
            }),
        }
    }

    fn read_bits(
        &self,
        store: &[bool],
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, Exception> {
        let start = address as usize;
        let end = start + count as usize;
        store
            .get(start..end)
            .map(<[bool]>::to_vec)
            .ok_or(Exception::IllegalDataAddress)
    }

    fn read_words(
        &self,
        store: &[u16],
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, Exception> {
        let start = address as usize;
        let end = start + count as usize;
        store
            .get(start..end)
            .map(<[u16]>::to_vec)
            .ok_or(Exception::IllegalDataAddress)
    }

    fn write_bit(&self, address: u16, value: bool) -> Result<(), Exception> {
        let mut coils = self.store.coils();
        let slot = coils
            .get_mut(address as usize)
            .ok_or(Exception::IllegalDataAddress)?;
        *slot = value;
        Ok(())
    }

    fn write_word(&self, address: u16, value: u16) -> Result<(), Exception> {
        let mut registers = self.store.registers();
        let slot = registers
            .get_mut(address as usize)
            .ok_or(Exception::IllegalDataAddress)?;
        *slot = value;
        Ok(())
    }

    fn write_bits(&self, address: u16, coils: &Coils) -> Result<(), Exception> {
        let mut store = self.store.coils();
        let start = address as usize;
        if start + coils.len() > store.len() {
            return Err(Exception::IllegalDataAddress);
        }
        for (i, bit) in coils.clone().into_iter().enumerate() {
            store[start + i] = bit;
        }
        Ok(())
    }

    fn write_words(&self, address: u16, words: &[u16]) -> Result<(), Exception> {
        let mut store = self.store.registers();
        let start = address as usize;
        if start + words.len() > store.len() {
            return Err(Exception::IllegalDataAddress);
        }
        store[start..start + words.len()].copy_from_slice(words);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{RequestPdu, TransactionId, UnitId};

    fn adu(request: Request) -> RequestAdu {
        RequestAdu {
            hdr: Header {
                transaction_id: 42 as TransactionId,
                unit_id: 1 as UnitId,
            },
            pdu: RequestPdu(request),
        }
    }

    #[test]
    fn read_holding_registers_in_range() {
        let store = InMemoryStore::new(8, 8);
        store.registers()[2] = 0x1234;
        let server = ModbusServer::new(store);

        let response = server.handle(&adu(Request::ReadHoldingRegisters(2, 1)));
        match response.pdu.0 {
            Ok(Response::ReadHoldingRegisters(data)) => {
                assert_eq!(data.to_words(), vec![0x1234]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn read_beyond_store_is_illegal_data_address() {
        let store = InMemoryStore::new(4, 4);
        let server = ModbusServer::new(store);

        let response = server.handle(&adu(Request::ReadHoldingRegisters(0, 10)));
        match response.pdu.0 {
            Err(ExceptionResponse { exception, .. }) => {
                assert_eq!(exception, Exception::IllegalDataAddress);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn write_single_register_updates_store() {
        let store = InMemoryStore::new(4, 4);
        let server = ModbusServer::new(store);

        let response = server.handle(&adu(Request::WriteSingleRegister(1, 0xABCD)));
        assert!(matches!(
            response.pdu.0,
            Ok(Response::WriteSingleRegister(1, 0xABCD))
        ));
        assert_eq!(server.store.registers()[1], 0xABCD);
    }

    #[test]
    fn unknown_function_code_is_illegal_function() {
        let store = InMemoryStore::new(1, 1);
        let server = ModbusServer::new(store);

        let response = server.handle(&adu(Request::Custom(FunctionCode::Custom(0x41), vec![])));
        match response.pdu.0 {
            Err(ExceptionResponse { exception, .. }) => {
                assert_eq!(exception, Exception::IllegalFunction);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn handle_frame_round_trips_a_read_holding_registers_request() {
        let store = InMemoryStore::new(4, 4);
        store.registers()[0] = 0x1234;
        let server = ModbusServer::new(store);

        // transaction 1, unit 1, ReadHoldingRegisters(0, 1)
        let frame: &[u8] = &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
        let reply = server.handle_frame(frame).unwrap();
        assert_eq!(
            reply,
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x12, 0x34]
        );
    }

    #[test]
    fn handle_frame_answers_bad_function_code_with_exception() {
        let store = InMemoryStore::new(1, 1);
        let server = ModbusServer::new(store);

        // transaction 1, unit 1, unregistered function code 0x41
        let frame: &[u8] = &[0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0x01, 0x41];
        let reply = server.handle_frame(frame).unwrap();
        assert_eq!(reply, vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0xC1, 0x01]);
    }
}
