use std::time::Duration;

use futures_util::StreamExt;
use tokio::{sync::mpsc::UnboundedReceiver, time};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::Event;

/// Consuming end of a server's event queue.
///
/// Events are taken strictly in the order they were produced. A wait that
/// runs out of time, or a queue whose producers are all gone, both read as
/// [`Event::TimedOut`].
pub(crate) struct EventStream {
    inner: UnboundedReceiverStream<Event>,
}

impl EventStream {
    pub(crate) fn new(receiver: UnboundedReceiver<Event>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(receiver),
        }
    }

    pub(crate) async fn next_within(&mut self, wait: Duration) -> Event {
        match time::timeout(wait, self.inner.next()).await {
            Ok(Some(event)) => event,
            Ok(None) | Err(_) => Event::TimedOut,
        }
    }
}
