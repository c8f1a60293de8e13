// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-destination request controller: at-most-one-outstanding FIFO queue,
//! transaction ID assignment, response matching, abort propagation.
//!
//! Each destination gets its own queue: at most one active slot, pending
//! work FIFO behind it. A connection failure aborts the active slot and
//! drains pending with the same error. Completion handles are
//! `tokio::sync::oneshot` channels so `submit` can be awaited directly.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::codec::tcp::client as tcp_client;
use crate::director::{ActorEvent, ConnectionDirector};
use crate::error::{ControllerError, Error as WireError, TransportError};
use crate::frame::{ExceptionResponse, Header, Request, RequestAdu, RequestPdu, Response, ResponseAdu};

/// A completed transaction: either the decoded response, or the server's
/// exception — a normal completion, not a failure.
pub type TransactionResult = Result<Response, ExceptionResponse>;

type Completion = oneshot::Sender<Result<TransactionResult, ControllerError>>;

/// Identifies one submitted slot for cancellation, independent of its
/// (not-yet-assigned, for pending slots) transaction ID.
type SlotId = u64;

struct RequestSlot {
    request: Request,
    unit_id: u8,
    transaction_id: Option<u16>,
    completion: Completion,
    slot_id: SlotId,
}

struct DestinationQueue {
    active: Option<RequestSlot>,
    pending: VecDeque<RequestSlot>,
    next_transaction_id: u16,
}

impl DestinationQueue {
    fn new() -> Self {
        DestinationQueue {
            active: None,
            pending: VecDeque::new(),
            next_transaction_id: 0,
        }
    }

    fn is_empty(&self) -> bool {
        self.active.is_none() && self.pending.is_empty()
    }
}

/// Disarmed by setting `controller` to `None` once `submit`'s `rx.await`
/// resolves; if dropped while still armed (the caller gave up on `submit`'s
/// future before it resolved), spawns the cancellation since `Drop` cannot
/// be `async`.
struct CancelOnDrop<D: ConnectionDirector + 'static> {
    controller: Option<Arc<RequestController<D>>>,
    destination: SocketAddr,
    slot_id: SlotId,
}

impl<D: ConnectionDirector + 'static> Drop for CancelOnDrop<D> {
    fn drop(&mut self) {
        let Some(controller) = self.controller.take() else {
            return;
        };
        let destination = self.destination;
        let slot_id = self.slot_id;
        tokio::spawn(async move {
            controller.cancel(destination, slot_id).await;
        });
    }
}

/// The client-side request controller: one [`DestinationQueue`] per peer.
pub struct RequestController<D> {
    director: D,
    queues: Mutex<HashMap<SocketAddr, DestinationQueue>>,
    next_slot_id: AtomicU64,
}

impl<D: ConnectionDirector + 'static> RequestController<D> {
    #[must_use]
    pub fn new(director: D) -> Arc<Self> {
        Arc::new(RequestController {
            director,
            queues: Mutex::new(HashMap::new()),
            next_slot_id: AtomicU64::new(0),
        })
    }

    /// Submit a request to `destination`/`unit_id`. Resolves with the
    /// decoded response (or the server's exception, a normal completion),
    /// or a [`ControllerError`] on transport/decode failure or cancellation.
    ///
    /// Dropping the returned future before it resolves — e.g. a caller
    /// wrapping it in `tokio::time::timeout` and giving up — cancels the
    /// slot: it is aborted with [`ControllerError::Cancelled`] and, if it
    /// was the active slot, the connection is closed, since the transaction
    /// ID cannot be safely reused on the same socket.
    pub async fn submit(
        self: &Arc<Self>,
        destination: SocketAddr,
        unit_id: u8,
        request: Request,
    ) -> Result<TransactionResult, ControllerError> {
        let slot_id = self.next_slot_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let slot = RequestSlot {
            request,
            unit_id,
            transaction_id: None,
            completion: tx,
            slot_id,
        };

        let mut queues = self.queues.lock().await;
        let queue = queues
            .entry(destination)
            .or_insert_with(DestinationQueue::new);
        if queue.active.is_some() {
            queue.pending.push_back(slot);
        } else {
            self.dispatch(queue, destination, slot);
        }
        drop(queues);

        let mut guard = CancelOnDrop {
            controller: Some(Arc::clone(self)),
            destination,
            slot_id,
        };
        let result = rx.await.unwrap_or(Err(ControllerError::Cancelled));
        guard.controller = None;
        result
    }

    /// Abort the slot identified by `slot_id` with [`ControllerError::Cancelled`].
    /// If it is the active slot, the connection is force-closed: the
    /// transaction ID it was assigned cannot be safely reused on the same
    /// socket.
    async fn cancel(self: &Arc<Self>, destination: SocketAddr, slot_id: SlotId) {
        let mut queues = self.queues.lock().await;
        let Some(queue) = queues.get_mut(&destination) else {
            return;
        };

        if queue.active.as_ref().is_some_and(|s| s.slot_id == slot_id) {
            let slot = queue.active.take().expect("checked above");
            let _ = slot.completion.send(Err(ControllerError::Cancelled));
            self.director.disconnect(destination);
            self.advance(queue, destination);
        } else if let Some(pos) = queue.pending.iter().position(|s| s.slot_id == slot_id) {
            let slot = queue.pending.remove(pos).expect("checked above");
            let _ = slot.completion.send(Err(ControllerError::Cancelled));
        }

        if queue.is_empty() {
            queues.remove(&destination);
        }
    }

    fn dispatch(
        self: &Arc<Self>,
        queue: &mut DestinationQueue,
        destination: SocketAddr,
        mut slot: RequestSlot,
    ) {
        let transaction_id = queue.next_transaction_id;
        queue.next_transaction_id = queue.next_transaction_id.wrapping_add(1);
        slot.transaction_id = Some(transaction_id);

        let adu = RequestAdu {
            hdr: Header {
                transaction_id,
                unit_id: slot.unit_id,
            },
            pdu: RequestPdu(slot.request.clone()),
        };
        match tcp_client::encode_request(&adu) {
            Ok(bytes) => {
                self.director.send(destination, bytes);
                queue.active = Some(slot);
            }
            Err(err) => {
                let _ = slot.completion.send(Err(ControllerError::Decode(err)));
            }
        }
    }

    /// Feed an [`ActorEvent`] observed from the director into the
    /// controller. Call this from the task draining the director's event
    /// channel.
    pub async fn handle_event(self: &Arc<Self>, event: ActorEvent) {
        match event {
            ActorEvent::Inbound { peer, frame } => self.on_inbound(peer, &frame).await,
            ActorEvent::ActorError { peer, error } => {
                self.abort_queue(peer, ControllerError::Transport(error))
                    .await;
            }
            ActorEvent::ActorRemoved { peer } => {
                self.abort_queue(
                    peer,
                    ControllerError::Transport(TransportError::ConnectionClosed),
                )
                .await;
            }
            ActorEvent::ActorAdded { .. } => {}
        }
    }

    async fn on_inbound(self: &Arc<Self>, peer: SocketAddr, frame: &[u8]) {
        let adu = match tcp_client::decode_response(frame) {
            Ok(adu) => adu,
            // silently discarded, active slot unaffected.
            Err(WireError::ProtocolNotModbus(_)) => return,
            Err(err) => {
                self.abort_queue(peer, ControllerError::Decode(err)).await;
                self.director.disconnect(peer);
                return;
            }
        };
        self.complete_active(peer, adu).await;
    }

    async fn complete_active(self: &Arc<Self>, peer: SocketAddr, adu: ResponseAdu) {
        let mut queues = self.queues.lock().await;
        let Some(queue) = queues.get_mut(&peer) else {
            debug!("inbound frame from {peer} with no queue, dropping");
            return;
        };
        let Some(active) = &queue.active else {
            debug!("inbound frame from {peer} with no active slot, dropping");
            return;
        };
        if active.transaction_id != Some(adu.hdr.transaction_id) {
            debug!(
                "transaction id mismatch from {peer}: expected {:?}, got {}",
                active.transaction_id, adu.hdr.transaction_id
            );
            return;
        }

        let slot = queue.active.take().expect("checked above");
        let _ = slot.completion.send(Ok(adu.pdu.0));

        self.advance(queue, peer);
        if queue.is_empty() {
            queues.remove(&peer);
        }
    }

    fn advance(self: &Arc<Self>, queue: &mut DestinationQueue, destination: SocketAddr) {
        if let Some(next) = queue.pending.pop_front() {
            self.dispatch(queue, destination, next);
        }
    }

    async fn abort_queue(self: &Arc<Self>, peer: SocketAddr, err: ControllerError) {
        let mut queues = self.queues.lock().await;
        let Some(mut queue) = queues.remove(&peer) else {
            return;
        };
        if let Some(active) = queue.active.take() {
            let _ = active.completion.send(Err(err.clone()));
        }
        while let Some(slot) = queue.pending.pop_front() {
            let _ = slot.completion.send(Err(err.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Data;

    #[derive(Clone)]
    struct RecordingDirector {
        sent: Arc<std::sync::Mutex<Vec<(SocketAddr, Vec<u8>)>>>,
    }

    impl RecordingDirector {
        fn new() -> Self {
            RecordingDirector {
                sent: Arc::new(std::sync::Mutex::new(Vec::new())),
            }
        }
    }

    impl ConnectionDirector for RecordingDirector {
        fn send(&self, destination: SocketAddr, bytes: Vec<u8>) {
            self.sent.lock().unwrap().push((destination, bytes));
        }

        fn disconnect(&self, _peer: SocketAddr) {}
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:502".parse().unwrap()
    }

    #[tokio::test]
    async fn second_submission_waits_for_first() {
        let director = RecordingDirector::new();
        let controller = RequestController::new(director.clone());

        let c1 = Arc::clone(&controller);
        let task_a = tokio::spawn(async move {
            c1.submit(peer(), 0x11, Request::ReadHoldingRegisters(0, 1))
                .await
        });
        tokio::task::yield_now().await;

        let c2 = Arc::clone(&controller);
        let task_b = tokio::spawn(async move {
            c2.submit(peer(), 0x11, Request::ReadHoldingRegisters(1, 1))
                .await
        });
        tokio::task::yield_now().await;

        assert_eq!(director.sent.lock().unwrap().len(), 1);

        // complete the active request
        let frame: &[u8] = &[
            0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x11, 0x03, 0x02, 0x00, 0x2A,
        ];
        controller
            .handle_event(ActorEvent::Inbound {
                peer: peer(),
                frame: frame.to_vec(),
            })
            .await;
        tokio::task::yield_now().await;

        assert_eq!(director.sent.lock().unwrap().len(), 2);

        let frame_b: &[u8] = &[
            0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x11, 0x03, 0x02, 0x00, 0x2B,
        ];
        controller
            .handle_event(ActorEvent::Inbound {
                peer: peer(),
                frame: frame_b.to_vec(),
            })
            .await;

        let result_a = task_a.await.unwrap().unwrap().unwrap();
        let result_b = task_b.await.unwrap().unwrap().unwrap();
        assert_eq!(
            result_a,
            Response::ReadHoldingRegisters(Data::from_words(&[0x002A]))
        );
        assert_eq!(
            result_b,
            Response::ReadHoldingRegisters(Data::from_words(&[0x002B]))
        );
    }

    #[tokio::test]
    async fn actor_error_aborts_whole_queue() {
        let director = RecordingDirector::new();
        let controller = RequestController::new(director);

        let c1 = Arc::clone(&controller);
        let task = tokio::spawn(async move {
            c1.submit(peer(), 0x11, Request::ReadHoldingRegisters(0, 1))
                .await
        });
        tokio::task::yield_now().await;

        controller
            .handle_event(ActorEvent::ActorError {
                peer: peer(),
                error: TransportError::ConnectionClosed,
            })
            .await;

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(ControllerError::Transport(TransportError::ConnectionClosed))
        ));
    }

    #[tokio::test]
    async fn protocol_mismatch_is_silently_discarded() {
        let director = RecordingDirector::new();
        let controller = RequestController::new(director);

        let c1 = Arc::clone(&controller);
        let task = tokio::spawn(async move {
            c1.submit(peer(), 0x11, Request::ReadHoldingRegisters(0, 1))
                .await
        });
        tokio::task::yield_now().await;

        let bad_protocol: &[u8] = &[0x00, 0x00, 0x00, 0x01, 0x00, 0x02, 0x11, 0x03];
        controller
            .handle_event(ActorEvent::Inbound {
                peer: peer(),
                frame: bad_protocol.to_vec(),
            })
            .await;

        // still waiting: the active slot must not have been aborted
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(!task.is_finished());
        task.abort();
    }

    #[derive(Clone)]
    struct DisconnectTrackingDirector {
        inner: RecordingDirector,
        disconnected: Arc<std::sync::Mutex<Vec<SocketAddr>>>,
    }

    impl DisconnectTrackingDirector {
        fn new() -> Self {
            DisconnectTrackingDirector {
                inner: RecordingDirector::new(),
                disconnected: Arc::new(std::sync::Mutex::new(Vec::new())),
            }
        }
    }

    impl ConnectionDirector for DisconnectTrackingDirector {
        fn send(&self, destination: SocketAddr, bytes: Vec<u8>) {
            self.inner.send(destination, bytes);
        }

        fn disconnect(&self, peer: SocketAddr) {
            self.disconnected.lock().unwrap().push(peer);
        }
    }

    #[tokio::test]
    async fn dropping_active_submit_cancels_and_disconnects() {
        let director = DisconnectTrackingDirector::new();
        let controller = RequestController::new(director.clone());

        let c1 = Arc::clone(&controller);
        let task = tokio::spawn(async move {
            c1.submit(peer(), 0x11, Request::ReadHoldingRegisters(0, 1))
                .await
        });
        tokio::task::yield_now().await;
        assert_eq!(director.inner.sent.lock().unwrap().len(), 1);

        task.abort();
        let _ = task.await;
        // the abort runs CancelOnDrop asynchronously in a spawned task.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(director.disconnected.lock().unwrap().as_slice(), &[peer()]);
    }

    #[tokio::test]
    async fn dropping_pending_submit_cancels_without_disconnecting() {
        let director = DisconnectTrackingDirector::new();
        let controller = RequestController::new(director.clone());

        let c1 = Arc::clone(&controller);
        let active = tokio::spawn(async move {
            c1.submit(peer(), 0x11, Request::ReadHoldingRegisters(0, 1))
                .await
        });
        tokio::task::yield_now().await;

        let c2 = Arc::clone(&controller);
        let pending = tokio::spawn(async move {
            c2.submit(peer(), 0x11, Request::ReadHoldingRegisters(1, 1))
                .await
        });
        tokio::task::yield_now().await;

        pending.abort();
        let _ = pending.await;
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        // only one request was ever sent: the active one, untouched by the
        // cancelled pending slot.
        assert_eq!(director.inner.sent.lock().unwrap().len(), 1);
        assert!(director.disconnected.lock().unwrap().is_empty());

        active.abort();
    }
}
