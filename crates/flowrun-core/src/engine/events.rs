//! Progress event delivery.
//!
//! The orchestrator writes into an [`EventSink`]. Production callers use the
//! bounded [`channel`] pair so a slow consumer applies backpressure to the
//! run; tests can hand in a plain `Vec` and inspect it afterwards.

use flowrun_types::event::ProgressEvent;
use futures_util::Stream;
use tokio::sync::mpsc;

/// Destination for the events of one run.
pub trait EventSink: Send {
    fn emit(&mut self, event: ProgressEvent) -> impl std::future::Future<Output = ()> + Send;
}

/// Collecting sink.
impl EventSink for Vec<ProgressEvent> {
    async fn emit(&mut self, event: ProgressEvent) {
        self.push(event);
    }
}

/// Create a bounded event channel.
pub fn channel(buffer: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (EventSender { tx }, EventReceiver { rx })
}

/// Producer half of a run's event channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<ProgressEvent>,
}

impl EventSink for EventSender {
    async fn emit(&mut self, event: ProgressEvent) {
        if self.tx.send(event).await.is_err() {
            // The run keeps going so its result can still be persisted.
            tracing::trace!("event receiver dropped");
        }
    }
}

/// Consumer half of a run's event channel.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<ProgressEvent>,
}

impl EventReceiver {
    /// Next event, or `None` once the run has finished and the channel drained.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.rx.recv().await
    }

    /// Drain every remaining event.
    pub async fn collect(mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }

    pub fn into_stream(mut self) -> impl Stream<Item = ProgressEvent> + Send + 'static {
        async_stream::stream! {
            while let Some(event) = self.rx.recv().await {
                yield event;
            }
        }
    }
}
