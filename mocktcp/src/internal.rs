mod acceptor;
mod evaluator;
mod event_stream;
mod executor;
mod expectation;
mod session;

pub(crate) use acceptor::Acceptor;
pub(crate) use evaluator::Evaluator;
pub(crate) use event_stream::EventStream;
pub(crate) use executor::Executor;
pub(crate) use expectation::Expectation;
pub(crate) use session::{ClientProbe, Connection, Session};
