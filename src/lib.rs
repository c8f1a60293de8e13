// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus/TCP protocol engine: wire codec, frame reassembly, request
//! controller, client and server.

#[macro_use]
extern crate log;

pub mod address;
pub mod client;
pub mod codec;
pub mod config;
pub mod controller;
pub mod director;
pub mod error;
pub mod frame;
pub mod registers;
pub mod server;

pub use client::ModbusClient;
pub use codec::Encode;
pub use config::Config;
pub use controller::RequestController;
pub use error::{ControllerError, Error, TransportError};
pub use frame::*;
pub use server::{ModbusServer, RegisterStore};
