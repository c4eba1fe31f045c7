//! Transport adapter (C9, §4.8): interface only. The core never implements the
//! underlying pub/sub network; a host wires in a concrete [`Transport`] (gossip
//! mesh, relay, test double) at [`crate::client::Client::open`].

use crate::message::Envelope;

/// The outcome of a single [`Transport::send`] attempt, reported to the optional
/// status callback (§4.8 "fire-and-report; no reply required for correctness").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Delivered,
    Failed,
}

pub type ReceiveSink = Box<dyn Fn(Envelope) + Send + Sync>;
pub type HealthSink = Box<dyn Fn(bool) + Send + Sync>;
pub type SyncSink = Box<dyn Fn() + Send + Sync>;
pub type StatusCallback = Box<dyn FnOnce(SendStatus) + Send>;

/// Interface only (§4.8): the core depends on this trait, never on a concrete
/// pub/sub implementation.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Fire-and-report: `status_cb`, if given, is invoked once the send attempt
    /// resolves. Correctness never depends on a reply — the message is already
    /// durable in the local replica by the time `send` is called.
    async fn send(&self, signed_message: Envelope, status_cb: Option<StatusCallback>);

    /// Registers a sink invoked for every message the transport receives from
    /// peers. Replacing a previously registered sink is implementation-defined.
    fn on_receive(&self, sink: ReceiveSink);

    /// Registers a liveness sink; health is a plain boolean (§4.8).
    fn on_health(&self, sink: HealthSink);

    /// Registers a sink invoked whenever the transport completes a sync phase.
    fn on_sync(&self, sink: SyncSink);

    /// Whether the transport is currently ready to send.
    fn is_ready(&self) -> bool;
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// An in-memory [`Transport`] double that records every sent message and lets
    /// tests drive `on_receive`/`on_health`/`on_sync` callbacks directly.
    #[derive(Default)]
    pub struct MemoryTransport {
        pub sent: Mutex<Vec<Envelope>>,
        ready: std::sync::atomic::AtomicBool,
        receive_sinks: Mutex<Vec<ReceiveSink>>,
        health_sinks: Mutex<Vec<HealthSink>>,
        sync_sinks: Mutex<Vec<SyncSink>>,
    }

    impl MemoryTransport {
        pub fn new(ready: bool) -> Self {
            MemoryTransport {
                sent: Mutex::new(Vec::new()),
                ready: std::sync::atomic::AtomicBool::new(ready),
                receive_sinks: Mutex::new(Vec::new()),
                health_sinks: Mutex::new(Vec::new()),
                sync_sinks: Mutex::new(Vec::new()),
            }
        }

        /// Delivers `envelope` to every registered receive sink, simulating an
        /// incoming message from a peer.
        pub fn deliver(&self, envelope: Envelope) {
            for sink in self.receive_sinks.lock().unwrap().iter() {
                sink(envelope.clone());
            }
        }
    }

    #[async_trait::async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, signed_message: Envelope, status_cb: Option<StatusCallback>) {
            self.sent.lock().unwrap().push(signed_message);
            if let Some(cb) = status_cb {
                cb(SendStatus::Delivered);
            }
        }

        fn on_receive(&self, sink: ReceiveSink) {
            self.receive_sinks.lock().unwrap().push(sink);
        }

        fn on_health(&self, sink: HealthSink) {
            self.health_sinks.lock().unwrap().push(sink);
        }

        fn on_sync(&self, sink: SyncSink) {
            self.sync_sinks.lock().unwrap().push(sink);
        }

        fn is_ready(&self) -> bool {
            self.ready.load(std::sync::atomic::Ordering::SeqCst)
        }
    }
}
