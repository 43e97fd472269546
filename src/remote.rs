//! Remote-task rendezvous: the two message queues connecting a running task
//! to an out-of-process adapter, plus the sequencer that drains inbound
//! responses back into ready queues.
//!
//! The concrete external transport an adapter speaks to is deliberately out
//! of scope here; this module only defines the interface as a
//! [`RemoteAdapter`] trait plus a minimal [`run_adapter`] driver suitable
//! for tests and simple embeddings.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, RecvError, Sender, TryRecvError};

use crate::config::MAX_MESSAGE_LEN;
use crate::task::Task;

/// A remote-task envelope. Shared (`Arc`) between the outbound queue, the
/// adapter, the inbound queue, and -- for a blocking request -- the slot
/// that parks the originator while it waits.
///
/// Public only so it can appear in the [`RemoteAdapter`]-facing
/// `Receiver`/`Sender` signatures ([`run_adapter`],
/// [`crate::Board::outbound_receiver`]); its fields stay crate-private since
/// an adapter only ever needs the message text `run_adapter` already hands
/// it, never the envelope itself.
pub struct RemoteEnvelope {
    pub(crate) message: String,
    pub(crate) response: Arc<Mutex<Option<Vec<u8>>>>,
    pub(crate) parked: Mutex<Option<Box<Task>>>,
    #[allow(dead_code)]
    pub(crate) blocking: bool,
}

impl RemoteEnvelope {
    pub(crate) fn new(message: impl Into<String>, blocking: bool) -> Self {
        let mut message = message.into();
        if message.len() > MAX_MESSAGE_LEN {
            log::warn!(
                "remote task message truncated from {} to {} bytes",
                message.len(),
                MAX_MESSAGE_LEN
            );
            message.truncate(MAX_MESSAGE_LEN);
        }
        RemoteEnvelope {
            message,
            response: Arc::new(Mutex::new(None)),
            parked: Mutex::new(None),
            blocking,
        }
    }
}

/// A handle to a remote task's eventual response, returned by
/// [`crate::Board::remote_task_create`].
///
/// For a blocking request, [`RemoteResponse::get`] is available as soon as
/// `remote_task_create` returns (the coroutine having resumed only after the
/// sequencer drained the matching inbound envelope). For a non-blocking
/// request the caller must poll [`RemoteResponse::try_get`].
#[derive(Clone)]
pub struct RemoteResponse(Arc<Mutex<Option<Vec<u8>>>>);

impl RemoteResponse {
    pub(crate) fn new(slot: Arc<Mutex<Option<Vec<u8>>>>) -> Self {
        RemoteResponse(slot)
    }

    /// Non-blocking read of whatever response has arrived so far.
    pub fn try_get(&self) -> Option<Vec<u8>> {
        self.0.lock().unwrap().clone()
    }

    /// Reads the response, assuming it has already arrived (valid
    /// immediately after a blocking `remote_task_create` call returns).
    ///
    /// # Panics
    /// Panics if no response has arrived yet.
    pub fn get(&self) -> Vec<u8> {
        self.0
            .lock()
            .unwrap()
            .clone()
            .expect("remote response requested before it arrived")
    }
}

/// The outbound/inbound queue pair a board and its external adapter
/// rendezvous through.
pub(crate) struct MessageQueues {
    outbound_tx: Mutex<Option<Sender<Arc<RemoteEnvelope>>>>,
    outbound_rx: Receiver<Arc<RemoteEnvelope>>,
    inbound_tx: Sender<Arc<RemoteEnvelope>>,
    inbound_rx: Receiver<Arc<RemoteEnvelope>>,
}

impl MessageQueues {
    pub fn new() -> Self {
        let (outbound_tx, outbound_rx) = unbounded();
        let (inbound_tx, inbound_rx) = unbounded();
        MessageQueues {
            outbound_tx: Mutex::new(Some(outbound_tx)),
            outbound_rx,
            inbound_tx,
            inbound_rx,
        }
    }

    pub fn send_outbound(&self, envelope: Arc<RemoteEnvelope>) {
        if let Some(tx) = self.outbound_tx.lock().unwrap().as_ref() {
            let _ = tx.send(envelope);
        }
    }

    /// A clone of the outbound receiver, handed to an external adapter.
    /// `crossbeam_channel::Receiver::recv` is the blocking wait for a new
    /// message.
    pub fn outbound_receiver(&self) -> Receiver<Arc<RemoteEnvelope>> {
        self.outbound_rx.clone()
    }

    pub fn inbound_sender(&self) -> Sender<Arc<RemoteEnvelope>> {
        self.inbound_tx.clone()
    }

    /// Non-blocking drain used by the sequencer, so it stays cheap to call
    /// once per dispatch iteration.
    pub fn try_recv_inbound(&self) -> Result<Arc<RemoteEnvelope>, TryRecvError> {
        self.inbound_rx.try_recv()
    }

    /// Closes the outbound queue so any adapter blocked in `recv()` wakes
    /// with an error and can exit.
    pub fn close(&self) {
        *self.outbound_tx.lock().unwrap() = None;
    }
}

/// External collaborator interface: drains the outbound queue, performs
/// I/O, and produces a response.
pub trait RemoteAdapter {
    fn handle(&mut self, message: &str) -> Vec<u8>;
}

/// Runs `adapter` against `outbound`/`inbound` until the outbound queue is
/// closed (board shutdown). A minimal, test-usable stand-in for whatever
/// real transport an embedding wires up instead.
pub fn run_adapter<A: RemoteAdapter>(
    outbound: Receiver<Arc<RemoteEnvelope>>,
    inbound: Sender<Arc<RemoteEnvelope>>,
    mut adapter: A,
) {
    loop {
        match outbound.recv() {
            Ok(envelope) => {
                let response = adapter.handle(&envelope.message);
                *envelope.response.lock().unwrap() = Some(response);
                if inbound.send(envelope).is_err() {
                    break;
                }
            }
            Err(RecvError) => break,
        }
    }
}

/// Drains every inbound envelope and, for each one with a parked
/// originator, hands it to `on_ready` for requeueing on its origin queue.
/// Non-blocking envelopes reaching here carry no parked task (the
/// originator already resumed at send time) and are simply dropped.
///
/// Free of any `Board` dependency so it can be unit-tested and invoked from
/// the executor loop without a circular module dependency; `Board` supplies
/// `on_ready` as its own origin-aware requeue routine.
pub(crate) fn drain_inbound(messages: &MessageQueues, mut on_ready: impl FnMut(Box<Task>)) {
    loop {
        match messages.try_recv_inbound() {
            Ok(envelope) => {
                if let Some(task) = envelope.parked.lock().unwrap().take() {
                    on_ready(task);
                }
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
        }
    }
}

/// An adapter that simply echoes the request bytes back, useful for tests
/// and for exercising the rendezvous without a real external transport.
pub struct EchoAdapter;

impl RemoteAdapter for EchoAdapter {
    fn handle(&mut self, message: &str) -> Vec<u8> {
        message.as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_truncates_overlong_messages() {
        let message = "x".repeat(MAX_MESSAGE_LEN + 50);
        let envelope = RemoteEnvelope::new(message, true);
        assert_eq!(envelope.message.len(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn queue_round_trips_through_adapter() {
        let queues = MessageQueues::new();
        let envelope = Arc::new(RemoteEnvelope::new("ping", false));
        queues.send_outbound(envelope.clone());

        let outbound_rx = queues.outbound_receiver();
        let inbound_tx = queues.inbound_sender();
        let popped = outbound_rx.recv().unwrap();
        assert_eq!(popped.message, "ping");
        *popped.response.lock().unwrap() = Some(b"pong".to_vec());
        inbound_tx.send(popped).unwrap();

        let drained = queues.try_recv_inbound().unwrap();
        assert_eq!(*drained.response.lock().unwrap(), Some(b"pong".to_vec()));
    }

    #[test]
    fn closing_outbound_unblocks_adapter() {
        let queues = MessageQueues::new();
        let outbound_rx = queues.outbound_receiver();
        queues.close();
        assert!(outbound_rx.recv().is_err());
    }
}
