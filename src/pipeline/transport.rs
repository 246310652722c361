//! Bidirectional pair endpoints over bounded channels.
//!
//! A pair is the sole synchronization primitive between a server and
//! its peer: delivery is ordered and lossless per direction, `send`
//! blocks when the peer lags behind the channel bound (backpressure),
//! and a dropped peer surfaces as [`TransportError::Disconnected`].

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::error::TransportError;

/// One endpoint of a bidirectional typed channel: sends `S`, receives `R`.
#[derive(Debug)]
pub struct Pair<S, R> {
    tx: Sender<S>,
    rx: Receiver<R>,
}

/// Create a connected endpoint pair with the given per-direction bound.
pub fn pair<A, B>(capacity: usize) -> (Pair<A, B>, Pair<B, A>) {
    let (a_tx, a_rx) = bounded(capacity);
    let (b_tx, b_rx) = bounded(capacity);
    (
        Pair { tx: a_tx, rx: b_rx },
        Pair { tx: b_tx, rx: a_rx },
    )
}

impl<S, R> Pair<S, R> {
    /// Blocking send; waits while the channel is full.
    pub fn send(&self, msg: S) -> Result<(), TransportError> {
        self.tx.send(msg).map_err(|_| TransportError::Disconnected)
    }

    /// Non-blocking send, used for ephemeral messages that may be
    /// dropped when the peer is not draining.
    pub fn try_send(&self, msg: S) -> Result<bool, TransportError> {
        match self.tx.try_send(msg) {
            Ok(()) => Ok(true),
            Err(crossbeam_channel::TrySendError::Full(_)) => Ok(false),
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                Err(TransportError::Disconnected)
            }
        }
    }

    /// Blocking receive.
    pub fn recv(&self) -> Result<R, TransportError> {
        self.rx.recv().map_err(|_| TransportError::Disconnected)
    }

    pub fn try_recv(&self) -> Option<R> {
        self.rx.try_recv().ok()
    }

    /// Raw receiver handle, for use in `select!` loops.
    pub fn receiver(&self) -> &Receiver<R> {
        &self.rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bidirectional_roundtrip() {
        let (client, server) = pair::<u32, String>(4);
        client.send(7).unwrap();
        assert_eq!(server.recv().unwrap(), 7);
        server.send("ack".to_string()).unwrap();
        assert_eq!(client.recv().unwrap(), "ack".to_string());
    }

    #[test]
    fn test_disconnect_surfaces_as_error() {
        let (client, server) = pair::<u32, u32>(1);
        drop(server);
        assert_eq!(client.send(1), Err(TransportError::Disconnected));
        assert_eq!(client.recv(), Err(TransportError::Disconnected));
    }

    #[test]
    fn test_try_send_reports_full() {
        let (client, _server) = pair::<u32, u32>(1);
        assert!(client.try_send(1).unwrap());
        assert!(!client.try_send(2).unwrap());
    }

    #[test]
    fn test_order_preserved() {
        let (client, server) = pair::<u32, u32>(8);
        for i in 0..8 {
            client.send(i).unwrap();
        }
        for i in 0..8 {
            assert_eq!(server.recv().unwrap(), i);
        }
    }
}
