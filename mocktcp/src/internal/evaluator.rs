use std::sync::Arc;

use tokio::{
    select,
    sync::mpsc::{UnboundedReceiver, UnboundedSender},
};
use tokio_util::sync::CancellationToken;

use super::{EventStream, Expectation, Session};

/// Pairs declared expectations with the events they produce.
///
/// For every pending step the evaluator first hands the step's action to
/// the executor, then evaluates it against the next event. The first
/// mismatch is recorded on the session; from then on steps are only
/// counted off, never run. Every declared step is counted off exactly once,
/// including steps still queued when the loop is cancelled.
pub(crate) struct Evaluator {
    pub(crate) session: Arc<Session>,
    pub(crate) pending: UnboundedReceiver<Arc<Expectation>>,
    pub(crate) actions: UnboundedSender<Arc<Expectation>>,
    pub(crate) events: EventStream,
    pub(crate) cancel_token: CancellationToken,
}

impl Evaluator {
    pub async fn run(mut self) {
        let port = self.session.port();
        loop {
            let expectation = select! {
                biased;
                _ = self.cancel_token.cancelled() => break,
                next = self.pending.recv() => match next {
                    Some(expectation) => expectation,
                    None => break,
                },
            };

            if !self.session.has_failed() {
                let _ = self.actions.send(expectation.clone());
                let result = select! {
                    biased;
                    _ = self.cancel_token.cancelled() => {
                        self.session.finish_declaration();
                        break;
                    }
                    result = expectation.evaluate(&self.session, &mut self.events) => result,
                };
                match result {
                    Ok(()) => tracing::debug!(port, step = %expectation, "expectation met"),
                    Err(failure) => {
                        tracing::warn!(port, step = %expectation, %failure, "expectation failed");
                        self.session.record_failure(failure);
                    }
                }
            }

            self.session.finish_declaration();
        }

        // Steps still queued at shutdown will never run.
        while self.pending.try_recv().is_ok() {
            self.session.finish_declaration();
        }
        tracing::trace!(port, "evaluator stopped");
    }
}
