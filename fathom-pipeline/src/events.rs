//! Turn event channel.
//!
//! Every turn streams [`TurnEvent`]s to the caller over an unbounded
//! channel. The sender half never blocks; a closed receiver is the
//! cancellation signal the orchestrator polls between stages.

use fathom_core::TurnEvent;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Sending half of a turn's event stream.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<TurnEvent>,
}

impl EventSink {
    /// Emit one event. Returns `false` if the receiver is gone; the event
    /// is dropped in that case.
    pub fn emit(&self, event: TurnEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Whether the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a turn's event stream.
#[derive(Debug)]
pub struct TurnEvents {
    rx: mpsc::UnboundedReceiver<TurnEvent>,
}

impl TurnEvents {
    /// Receive the next event, or `None` once all senders are dropped.
    pub async fn next(&mut self) -> Option<TurnEvent> {
        self.rx.recv().await
    }

    /// Drain every remaining event. Completes only after all senders are
    /// dropped.
    pub async fn collect(mut self) -> Vec<TurnEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }

    /// Adapt into a [`tokio_stream::Stream`] of events.
    pub fn into_stream(self) -> UnboundedReceiverStream<TurnEvent> {
        UnboundedReceiverStream::new(self.rx)
    }
}

/// Create a connected sink/receiver pair for one turn.
pub fn event_channel() -> (EventSink, TurnEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, TurnEvents { rx })
}
