use std::sync::Arc;

use tokio::{net::TcpListener, select, sync::mpsc::UnboundedSender};
use tokio_util::sync::CancellationToken;

use super::Session;
use crate::Event;

/// Accepts client connections for one server.
///
/// The first connection becomes the session's connection; every later one
/// is announced as [`Event::SecondConnectionAttempted`] and dropped. The
/// listener closes when the loop exits.
pub(crate) struct Acceptor {
    pub(crate) listener: TcpListener,
    pub(crate) session: Arc<Session>,
    pub(crate) events: UnboundedSender<Event>,
    pub(crate) cancel_token: CancellationToken,
}

impl Acceptor {
    pub async fn run(self) {
        let port = self.session.port();
        loop {
            select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) if self.session.is_connected() => {
                        tracing::debug!(port, %peer, "rejecting second connection");
                        drop(stream);
                        let _ = self.events.send(Event::SecondConnectionAttempted);
                    }
                    Ok((stream, peer)) => {
                        tracing::debug!(port, %peer, "client connected");
                        self.session.attach(stream, &self.events).await;
                    }
                    Err(e) => {
                        tracing::warn!(port, error = %e, "accept failed");
                    }
                }
            }
        }
        tracing::trace!(port, "acceptor stopped");
    }
}
