use std::{fmt, future::Future, io, time::Duration};

use bytes::Bytes;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::MappedMutexGuard,
    time,
};

use super::{Connection, EventStream, Session};
use crate::{
    Event, Expected, Fault, Literal, Unexpected,
    framing::{self, ReadError},
};

/// One declared step of a server script.
///
/// A step may carry a server action (run by the executor, producing at most
/// one event) and an evaluation (run by the evaluator against the next
/// event). Steps without an expected event only perform their action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Expectation {
    Connect { timeout: Duration },
    IsConnected,
    Bytes { expected: Bytes, timeout: Duration },
    Frame { expected: Bytes, timeout: Duration },
    ReadZero { timeout: Duration },
    ClientClose { timeout: Duration },
    AllSentRead,
    ClientWaitClosed { timeout: Duration },
    SendBytes(Bytes),
    SendFrame(Bytes),
    Disconnect,
}

impl Expectation {
    /// The event this step waits for, if it waits for one.
    pub(crate) fn expected(&self) -> Option<Expected> {
        match self {
            Expectation::Connect { .. } => Some(Expected::Connected),
            Expectation::Bytes { expected, .. } => Some(Expected::BytesRead(expected.clone())),
            Expectation::Frame { expected, .. } => Some(Expected::FrameRead(expected.clone())),
            Expectation::ReadZero { .. } => Some(Expected::ReadZero),
            Expectation::ClientClose { .. } => Some(Expected::WriterCloseObserved),
            Expectation::AllSentRead => Some(Expected::NoRemainingSentData),
            Expectation::ClientWaitClosed { .. } => Some(Expected::WriterWaitClosedObserved),
            Expectation::IsConnected
            | Expectation::SendBytes(_)
            | Expectation::SendFrame(_)
            | Expectation::Disconnect => None,
        }
    }

    fn timeout(&self) -> Option<Duration> {
        match self {
            Expectation::Connect { timeout }
            | Expectation::Bytes { timeout, .. }
            | Expectation::Frame { timeout, .. }
            | Expectation::ReadZero { timeout }
            | Expectation::ClientClose { timeout }
            | Expectation::ClientWaitClosed { timeout } => Some(*timeout),
            _ => None,
        }
    }

    /// Run the server side of this step.
    pub(crate) async fn perform(&self, session: &Session) -> Option<Event> {
        match self {
            Expectation::Connect { .. } | Expectation::IsConnected => None,
            Expectation::Bytes { expected, timeout } => Some(
                within(*timeout, async {
                    let Some(mut conn) = session.connection().await else {
                        return Event::NotConnected;
                    };
                    read_outcome(
                        framing::read_exactly(&mut conn.reader, expected.len()).await,
                        Event::BytesRead,
                    )
                })
                .await,
            ),
            Expectation::Frame { timeout, .. } => Some(
                within(*timeout, async {
                    let Some(mut conn) = session.connection().await else {
                        return Event::NotConnected;
                    };
                    read_outcome(framing::read_frame(&mut conn.reader).await, Event::FrameRead)
                })
                .await,
            ),
            Expectation::ReadZero { timeout } => Some(
                within(*timeout, async {
                    let Some(mut conn) = session.connection().await else {
                        return Event::NotConnected;
                    };
                    let mut rest = Vec::new();
                    match conn.reader.read_to_end(&mut rest).await {
                        Ok(_) if rest.is_empty() => Event::ReadZero,
                        Ok(_) => Event::BytesRead(rest.into()),
                        Err(e) => match Fault::from(e) {
                            // A reset after the client closed still means it went away.
                            fault if fault.is_reset() => Event::ReadZero,
                            fault => Event::Exception(fault),
                        },
                    }
                })
                .await,
            ),
            Expectation::ClientClose { timeout } => Some(
                within(*timeout, async {
                    session.probe().close_called().await;
                    Event::WriterCloseObserved
                })
                .await,
            ),
            Expectation::AllSentRead => Some(match session.unread() {
                rest if rest.is_empty() => Event::NoRemainingSentData,
                rest => Event::UnreadSentBytes(rest),
            }),
            Expectation::ClientWaitClosed { timeout } => Some(
                within(*timeout, async {
                    session.probe().wait_closed_called().await;
                    Event::WriterWaitClosedObserved
                })
                .await,
            ),
            Expectation::SendBytes(data) => send(session, data.clone()).await,
            Expectation::SendFrame(payload) => match framing::encode(payload) {
                Ok(frame) => send(session, frame).await,
                Err(e) => Some(e.into()),
            },
            Expectation::Disconnect => disconnect(session).await,
        }
    }

    /// Check the outcome of this step against the next event.
    pub(crate) async fn evaluate(
        &self,
        session: &Session,
        events: &mut EventStream,
    ) -> Result<(), Unexpected> {
        if let Expectation::IsConnected = self {
            return if session.is_connected() {
                Ok(())
            } else {
                Err(Unexpected::new(Expected::Connected, Event::NotConnected))
            };
        }
        let Some(expected) = self.expected() else {
            return Ok(());
        };
        let wait = match self {
            // Connect has no action; its own timeout bounds the wait for the acceptor.
            Expectation::Connect { timeout } => *timeout,
            _ => self.timeout().unwrap_or_default() + session.config().evaluation_grace(),
        };
        let actual = events.next_within(wait).await;
        if expected.matches(&actual) {
            Ok(())
        } else {
            Err(Unexpected::new(expected, actual))
        }
    }
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Connect { timeout } => write!(f, "expect_connect({timeout:?})"),
            Expectation::IsConnected => f.write_str("is_connected"),
            Expectation::Bytes { expected, timeout } => {
                write!(f, "expect_bytes({}, {timeout:?})", Literal(expected))
            }
            Expectation::Frame { expected, timeout } => {
                write!(f, "expect_frame({}, {timeout:?})", Literal(expected))
            }
            Expectation::ReadZero { timeout } => write!(f, "read_zero({timeout:?})"),
            Expectation::ClientClose { timeout } => write!(f, "client_close({timeout:?})"),
            Expectation::AllSentRead => f.write_str("all_sent_read"),
            Expectation::ClientWaitClosed { timeout } => {
                write!(f, "client_wait_closed({timeout:?})")
            }
            Expectation::SendBytes(data) => write!(f, "send_bytes({})", Literal(data)),
            Expectation::SendFrame(payload) => write!(f, "send_frame({})", Literal(payload)),
            Expectation::Disconnect => f.write_str("disconnect"),
        }
    }
}

async fn within(timeout: Duration, action: impl Future<Output = Event>) -> Event {
    time::timeout(timeout, action)
        .await
        .unwrap_or(Event::TimedOut)
}

fn read_outcome(result: Result<Bytes, ReadError>, ok: fn(Bytes) -> Event) -> Event {
    match result {
        Ok(data) => ok(data),
        Err(ReadError::Incomplete { partial, .. }) => Event::IncompleteRead(partial),
        Err(ReadError::Io(e)) => e.into(),
    }
}

/// Write `data` to the client. Produces an event only when the write fails.
///
/// Only the wait for a client is bounded by the default timeout; a slow
/// reader is waited for. The sent ledger grows by what the socket accepted.
async fn send(session: &Session, data: Bytes) -> Option<Event> {
    let mut conn = match attached(session).await {
        Ok(conn) => conn,
        Err(e) => return Some(e.into()),
    };
    let Some(writer) = conn.writer.as_mut() else {
        return Some(
            io::Error::new(io::ErrorKind::NotConnected, "server already disconnected").into(),
        );
    };
    let mut rest = &data[..];
    while !rest.is_empty() {
        match writer.write(rest).await {
            Ok(0) => return Some(io::Error::from(io::ErrorKind::WriteZero).into()),
            Ok(n) => {
                session.record_sent(&rest[..n]);
                rest = &rest[n..];
            }
            Err(e) => return Some(e.into()),
        }
    }
    writer.flush().await.err().map(Event::from)
}

/// Half-close the server's writing side. The reading side stays open.
async fn disconnect(session: &Session) -> Option<Event> {
    let mut conn = match attached(session).await {
        Ok(conn) => conn,
        Err(e) => return Some(e.into()),
    };
    match conn.writer.take() {
        Some(mut writer) => writer.shutdown().await.err().map(Event::from),
        None => None,
    }
}

/// The client connection, waited for at most the default timeout.
async fn attached(session: &Session) -> io::Result<MappedMutexGuard<'_, Connection>> {
    match time::timeout(session.config().default_timeout(), session.connection()).await {
        Ok(Some(conn)) => Ok(conn),
        Ok(None) | Err(_) => Err(not_connected()),
    }
}

fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "no client connected")
}
