use std::sync::Arc;

use tokio::{
    select,
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
};
use tokio_util::sync::CancellationToken;

use super::{Expectation, Session};
use crate::{Event, Label};

/// Runs server actions in declaration order.
///
/// Each action produces at most one event. Once a failure has been
/// recorded, remaining actions are discarded without running.
pub(crate) struct Executor {
    pub(crate) session: Arc<Session>,
    pub(crate) actions: UnboundedReceiver<Arc<Expectation>>,
    pub(crate) events: UnboundedSender<Event>,
    pub(crate) cancel_token: CancellationToken,
}

impl Executor {
    pub async fn run(mut self) {
        let port = self.session.port();
        loop {
            let expectation = select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                next = self.actions.recv() => match next {
                    Some(expectation) => expectation,
                    None => break,
                },
            };

            if self.session.has_failed() {
                tracing::trace!(port, step = %expectation, "discarding action after failure");
                continue;
            }

            tracing::trace!(port, step = %expectation, "performing");
            let event = select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                event = expectation.perform(&self.session) => event,
            };

            if let Some(event) = event {
                tracing::debug!(port, step = %expectation, event = %event.label(), "action finished");
                let _ = self.events.send(event);
            }
        }
        tracing::trace!(port, "executor stopped");
    }
}
