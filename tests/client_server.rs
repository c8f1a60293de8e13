// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end round trip: a real `TcpListener` server answering a real
//! `ModbusClient` over localhost.

use std::sync::Arc;
use std::time::Duration;

use modbus_engine::client::ModbusClient;
use modbus_engine::director::{ActorEvent, ConnectionDirector, TcpDirector};
use modbus_engine::frame::Request;
use modbus_engine::server::{InMemoryStore, ModbusServer};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

async fn spawn_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let director = Arc::new(TcpDirector::new(tx, None, None));
    tokio::spawn(Arc::clone(&director).serve(listener));

    let store = InMemoryStore::new(16, 16);
    store.registers()[2] = 0x1234;
    let server = Arc::new(ModbusServer::new(store));

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let ActorEvent::Inbound { peer, frame } = event {
                if let Ok(reply) = server.handle_frame(&frame) {
                    director.send(peer, reply);
                }
            }
        }
    });

    addr
}

fn spawn_client() -> (ModbusClient<Arc<TcpDirector>>, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let director = Arc::new(TcpDirector::new(tx, None, None));
    let client = ModbusClient::new(director);
    let controller = client.controller_handle();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            controller.handle_event(event).await;
        }
    });
    (client, handle)
}

#[tokio::test]
async fn read_holding_registers_round_trip() {
    let addr = spawn_server().await;
    let (client, _handle) = spawn_client();

    let values = client
        .read_holding_registers(addr, 1, 2, 1)
        .await
        .expect("request should succeed");
    assert_eq!(values, vec![0x1234]);
}

#[tokio::test]
async fn write_then_read_back() {
    let addr = spawn_server().await;
    let (client, _handle) = spawn_client();

    client
        .write_single_register(addr, 1, 5, 0xABCD)
        .await
        .expect("write should succeed");

    let values = client
        .read_holding_registers(addr, 1, 5, 1)
        .await
        .expect("read should succeed");
    assert_eq!(values, vec![0xABCD]);
}

#[tokio::test]
async fn read_beyond_store_returns_illegal_data_address_exception() {
    let addr = spawn_server().await;
    let (client, _handle) = spawn_client();

    let result = client.submit(addr, 1, Request::ReadHoldingRegisters(0, 100)).await;
    let outcome = result.expect("transport should succeed");
    let exception = outcome.expect_err("expected a server exception");
    assert_eq!(
        exception.exception,
        modbus_engine::frame::Exception::IllegalDataAddress
    );
}

#[tokio::test]
async fn three_submissions_to_one_destination_complete_in_fifo_order() {
    let addr = spawn_server().await;
    let (client, _handle) = spawn_client();
    let client = Arc::new(client);

    let mut handles = Vec::new();
    for address in [0u16, 1, 2] {
        let client = Arc::clone(&client);
        handles.push(tokio::spawn(async move {
            client
                .write_single_register(addr, 1, address, address)
                .await
                .unwrap();
            address
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let values = client.read_holding_registers(addr, 1, 0, 3).await.unwrap();
    assert_eq!(values, vec![0, 1, 2]);
}

#[tokio::test]
async fn idle_timeout_aborts_outstanding_request() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let director = Arc::new(TcpDirector::new(tx, None, Some(Duration::from_millis(50))));
    let client = ModbusClient::new(Arc::clone(&director));
    let controller = client.controller_handle();

    // Nothing is listening here, but the connect itself succeeds against a
    // bound-but-silent listener so the idle timer, not a connect failure,
    // is what fires.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = listener.accept().await;
        std::future::pending::<()>().await;
    });

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            controller.handle_event(event).await;
        }
    });

    let result = client
        .read_holding_registers(silent_addr, 1, 0, 1)
        .await;
    assert!(result.is_err());
}
