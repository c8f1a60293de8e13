// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot Modbus/TCP client CLI: `read`/`write` subcommands addressed by
//! the 5/6-digit human register convention.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use modbus_engine::address::{parse_destination, parse_human_register, RegisterKind};
use modbus_engine::client::ModbusClient;
use modbus_engine::config::Config;
use modbus_engine::director::{ActorEvent, TcpDirector};
use modbus_engine::frame::Request;

#[derive(Parser)]
#[command(name = "modbus-client", about = "One-shot Modbus/TCP client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a coil, discrete input, input register, or holding register
    /// range, addressed by its 5/6-digit human register number.
    Read {
        addr: String,
        unit: u8,
        register: String,
        #[arg(default_value_t = 1)]
        count: u16,
    },
    /// Write a single coil or holding register, addressed by its 5/6-digit
    /// human register number.
    Write {
        addr: String,
        unit: u8,
        register: String,
        value: u16,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::from_env();

    let destination = match parse_destination(&cli_addr(&cli.command)) {
        Ok(addr) => addr,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let client = spawn_client(&config);

    let result = match cli.command {
        Command::Read {
            unit,
            register,
            count,
            ..
        } => run_read(&client, destination, unit, &register, count).await,
        Command::Write {
            unit,
            register,
            value,
            ..
        } => run_write(&client, destination, unit, &register, value).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn cli_addr(command: &Command) -> String {
    match command {
        Command::Read { addr, .. } | Command::Write { addr, .. } => addr.clone(),
    }
}

fn spawn_client(config: &Config) -> ModbusClient<Arc<TcpDirector>> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let director = Arc::new(TcpDirector::new(
        tx,
        config.connect_timeout,
        config.idle_timeout,
    ));
    let client = ModbusClient::new(director);
    let controller = client.controller_handle();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            controller.handle_event(event).await;
        }
    });
    client
}

async fn run_read(
    client: &ModbusClient<Arc<TcpDirector>>,
    destination: SocketAddr,
    unit: u8,
    register: &str,
    count: u16,
) -> Result<(), String> {
    let human = parse_human_register(register).map_err(|e| e.to_string())?;
    match human.kind {
        RegisterKind::Coil => {
            let values = client
                .read_coils(destination, unit, human.address, count)
                .await
                .map_err(|e| e.to_string())?;
            print_bits(&values);
        }
        RegisterKind::DiscreteInput => {
            let values = client
                .submit(
                    destination,
                    unit,
                    Request::ReadDiscreteInputs(human.address, count),
                )
                .await
                .map_err(|e| e.to_string())?
                .map_err(|ex| ex.to_string())?;
            match values {
                modbus_engine::frame::Response::ReadDiscreteInputs(coils) => {
                    print_bits(&coils.truncated(count as usize).into_iter().collect::<Vec<_>>());
                }
                other => return Err(format!("unexpected response: {other:?}")),
            }
        }
        RegisterKind::InputRegister => {
            let values = client
                .submit(
                    destination,
                    unit,
                    Request::ReadInputRegisters(human.address, count),
                )
                .await
                .map_err(|e| e.to_string())?
                .map_err(|ex| ex.to_string())?;
            match values {
                modbus_engine::frame::Response::ReadInputRegisters(data) => {
                    print_words(&data.to_words());
                }
                other => return Err(format!("unexpected response: {other:?}")),
            }
        }
        RegisterKind::HoldingRegister => {
            let values = client
                .read_holding_registers(destination, unit, human.address, count)
                .await
                .map_err(|e| e.to_string())?;
            print_words(&values);
        }
    }
    Ok(())
}

async fn run_write(
    client: &ModbusClient<Arc<TcpDirector>>,
    destination: SocketAddr,
    unit: u8,
    register: &str,
    value: u16,
) -> Result<(), String> {
    let human = parse_human_register(register).map_err(|e| e.to_string())?;
    match human.kind {
        RegisterKind::Coil => {
            client
                .submit(
                    destination,
                    unit,
                    Request::WriteSingleCoil(human.address, value != 0),
                )
                .await
                .map_err(|e| e.to_string())?
                .map_err(|ex| ex.to_string())?;
        }
        RegisterKind::HoldingRegister => {
            client
                .write_single_register(destination, unit, human.address, value)
                .await
                .map_err(|e| e.to_string())?;
        }
        other => return Err(format!("unsupported register type for write: {other}")),
    }
    println!("ok");
    Ok(())
}

fn print_bits(values: &[bool]) {
    for (i, v) in values.iter().enumerate() {
        println!("{i}: {}", *v as u8);
    }
}

fn print_words(values: &[u16]) {
    for (i, v) in values.iter().enumerate() {
        println!("{i}: {v}");
    }
}
