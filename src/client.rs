// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A typed Modbus/TCP client built on [`RequestController`].
//!
//! A thin request-shaping facade in front of the queued controller: each
//! method builds the matching [`Request`] variant, submits it, and unpacks
//! the typed response (or surfaces the server's exception).

use std::net::SocketAddr;
use std::sync::Arc;

use crate::address::parse_destination;
use crate::controller::{RequestController, TransactionResult};
use crate::director::ConnectionDirector;
use crate::error::ControllerError;
use crate::frame::{Coils, Data, Request};

/// A Modbus/TCP client: submits typed requests through a shared
/// [`RequestController`].
pub struct ModbusClient<D> {
    controller: Arc<RequestController<D>>,
}

impl<D: ConnectionDirector + 'static> ModbusClient<D> {
    #[must_use]
    pub fn new(director: D) -> Self {
        ModbusClient {
            controller: RequestController::new(director),
        }
    }

    /// Obtain a handle to the underlying controller, e.g. to feed it
    /// [`crate::director::ActorEvent`]s observed from the director's event
    /// channel.
    #[must_use]
    pub fn controller_handle(&self) -> Arc<RequestController<D>> {
        Arc::clone(&self.controller)
    }

    /// Parse `destination` as `host[:port]` and submit `request` against it.
    pub async fn call(
        &self,
        destination: &str,
        unit_id: u8,
        request: Request,
    ) -> Result<TransactionResult, ClientError> {
        let addr = parse_destination(destination).map_err(ClientError::Address)?;
        self.submit(addr, unit_id, request).await
    }

    /// Submit `request` against an already-resolved socket address.
    pub async fn submit(
        &self,
        destination: SocketAddr,
        unit_id: u8,
        request: Request,
    ) -> Result<TransactionResult, ClientError> {
        self.controller
            .submit(destination, unit_id, request)
            .await
            .map_err(ClientError::Controller)
    }

    pub async fn read_coils(
        &self,
        destination: SocketAddr,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<bool>, ClientError> {
        match self
            .submit(destination, unit_id, Request::ReadCoils(address, count))
            .await?
        {
            Ok(crate::frame::Response::ReadCoils(coils)) => {
                Ok(coils.truncated(count as usize).into_iter().collect())
            }
            Ok(_) => Err(ClientError::UnexpectedResponse),
            Err(exception) => Err(ClientError::Exception(exception)),
        }
    }

    pub async fn read_holding_registers(
        &self,
        destination: SocketAddr,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ClientError> {
        match self
            .submit(
                destination,
                unit_id,
                Request::ReadHoldingRegisters(address, count),
            )
            .await?
        {
            Ok(crate::frame::Response::ReadHoldingRegisters(data)) => Ok(data.to_words()),
            Ok(_) => Err(ClientError::UnexpectedResponse),
            Err(exception) => Err(ClientError::Exception(exception)),
        }
    }

    pub async fn write_single_register(
        &self,
        destination: SocketAddr,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ClientError> {
        match self
            .submit(
                destination,
                unit_id,
                Request::WriteSingleRegister(address, value),
            )
            .await?
        {
            Ok(crate::frame::Response::WriteSingleRegister(_, _)) => Ok(()),
            Ok(_) => Err(ClientError::UnexpectedResponse),
            Err(exception) => Err(ClientError::Exception(exception)),
        }
    }

    pub async fn write_multiple_registers(
        &self,
        destination: SocketAddr,
        unit_id: u8,
        address: u16,
        values: &[u16],
    ) -> Result<(), ClientError> {
        match self
            .submit(
                destination,
                unit_id,
                Request::WriteMultipleRegisters(address, Data::from_words(values)),
            )
            .await?
        {
            Ok(crate::frame::Response::WriteMultipleRegisters(_, _)) => Ok(()),
            Ok(_) => Err(ClientError::UnexpectedResponse),
            Err(exception) => Err(ClientError::Exception(exception)),
        }
    }

    pub async fn write_multiple_coils(
        &self,
        destination: SocketAddr,
        unit_id: u8,
        address: u16,
        values: &[bool],
    ) -> Result<(), ClientError> {
        match self
            .submit(
                destination,
                unit_id,
                Request::WriteMultipleCoils(address, Coils::from_bools(values)),
            )
            .await?
        {
            Ok(crate::frame::Response::WriteMultipleCoils(_, _)) => Ok(()),
            Ok(_) => Err(ClientError::UnexpectedResponse),
            Err(exception) => Err(ClientError::Exception(exception)),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("invalid destination: {0}")]
    Address(#[from] crate::address::AddressError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error("device returned an exception: {}", .0.exception)]
    Exception(crate::frame::ExceptionResponse),
    #[error("unexpected response variant for this request")]
    UnexpectedResponse,
}
