// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus/TCP server: binds a listener and answers requests against an
//! in-memory register store.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{debug, info, warn};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use modbus_engine::config::Config;
use modbus_engine::director::{ActorEvent, ConnectionDirector, TcpDirector};
use modbus_engine::server::{InMemoryStore, ModbusServer};

#[derive(Parser)]
#[command(name = "modbus-server", about = "Modbus/TCP server")]
struct Cli {
    /// Bind address; overrides `SERVER_HOST` when given.
    #[arg(long)]
    host: Option<String>,

    /// Bind port; overrides `SERVER_PORT` when given.
    #[arg(long)]
    port: Option<u16>,

    /// Number of coils and discrete inputs the in-memory store holds.
    #[arg(long, default_value_t = 65536)]
    coils: usize,

    /// Number of holding/input registers the in-memory store holds.
    #[arg(long, default_value_t = 65536)]
    registers: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    let config = Config::from_env();

    let host = match &cli.host {
        Some(h) => match h.parse() {
            Ok(addr) => addr,
            Err(_) => {
                eprintln!("invalid --host {h:?}");
                return ExitCode::FAILURE;
            }
        },
        None => config.server_host,
    };
    let port = cli.port.unwrap_or(config.server_port);
    let bind_addr = SocketAddr::new(host, port);

    let listener = match TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("failed to bind {bind_addr}: {err}");
            return ExitCode::FAILURE;
        }
    };
    info!("listening on {bind_addr}");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let director = Arc::new(TcpDirector::new(
        tx,
        config.connect_timeout,
        config.idle_timeout,
    ));
    tokio::spawn(Arc::clone(&director).serve(listener));

    let server = Arc::new(ModbusServer::new(InMemoryStore::new(
        cli.coils,
        cli.registers,
    )));

    while let Some(event) = rx.recv().await {
        match event {
            ActorEvent::Inbound { peer, frame } => match server.handle_frame(&frame) {
                Ok(reply) => director.send(peer, reply),
                Err(err) => {
                    warn!("malformed request from {peer}: {err}");
                    director.disconnect(peer);
                }
            },
            ActorEvent::ActorAdded { peer } => debug!("client connected: {peer}"),
            ActorEvent::ActorRemoved { peer } => debug!("client disconnected: {peer}"),
            ActorEvent::ActorError { peer, error } => debug!("client {peer} error: {error}"),
        }
    }

    ExitCode::SUCCESS
}
