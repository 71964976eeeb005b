use std::{borrow::Cow, fmt, io};

use bytes::Bytes;

use crate::{Label, Literal};

/// Something that actually happened (or failed to happen) on a mock
/// server's connection.
///
/// Each completed server action produces at most one event, and the
/// acceptor produces one per accepted connection. Events flow through a
/// single FIFO stream per server; the Nth evaluation consumes the Nth
/// event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The first client connection was accepted.
    Connected,
    /// The session was asked whether a client is connected and none is.
    NotConnected,
    /// A client connected while another connection was already live.
    SecondConnectionAttempted,
    /// Bytes read from the client for an `expect_bytes`, or data that
    /// arrived while waiting for the client to disconnect.
    BytesRead(Bytes),
    /// A complete frame payload read from the client.
    FrameRead(Bytes),
    /// The action's deadline expired before anything happened.
    TimedOut,
    /// The stream ended in the middle of a read; carries what was read.
    IncompleteRead(Bytes),
    /// The client closed its side of the connection.
    ReadZero,
    /// The client called [`ClientStream::close`](crate::ClientStream::close).
    WriterCloseObserved,
    /// The client called [`ClientStream::wait_closed`](crate::ClientStream::wait_closed).
    WriterWaitClosedObserved,
    /// Every byte the server sent has been consumed by the client.
    NoRemainingSentData,
    /// Bytes the server sent that the client never consumed.
    UnreadSentBytes(Bytes),
    /// A socket operation failed.
    Exception(Fault),
}

impl Label for Event {
    fn label(&self) -> Cow<'static, str> {
        Cow::Borrowed(match self {
            Event::Connected => "Connected",
            Event::NotConnected => "NotConnected",
            Event::SecondConnectionAttempted => "SecondConnectionAttempted",
            Event::BytesRead(_) => "BytesRead",
            Event::FrameRead(_) => "FrameRead",
            Event::TimedOut => "TimedOut",
            Event::IncompleteRead(_) => "IncompleteRead",
            Event::ReadZero => "ReadZero",
            Event::WriterCloseObserved => "WriterCloseObserved",
            Event::WriterWaitClosedObserved => "WriterWaitClosedObserved",
            Event::NoRemainingSentData => "NoRemainingSentData",
            Event::UnreadSentBytes(_) => "UnreadSentBytes",
            Event::Exception(_) => "Exception",
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::BytesRead(b)
            | Event::FrameRead(b)
            | Event::IncompleteRead(b)
            | Event::UnreadSentBytes(b) => write!(f, "{}({})", self.label(), Literal(b)),
            Event::Exception(fault) => write!(f, "Exception({fault})"),
            _ => f.write_str(&self.label()),
        }
    }
}

/// A socket error captured as data.
///
/// `io::Error` is neither `Clone` nor comparable, so the kind and message
/// are kept instead. Two faults are equal when their kinds are.
#[derive(Debug, Clone)]
pub struct Fault {
    kind: io::ErrorKind,
    message: String,
}

impl Fault {
    pub fn new(kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the peer tore the connection down underneath us.
    pub fn is_reset(&self) -> bool {
        matches!(
            self.kind,
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
        )
    }
}

impl PartialEq for Fault {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Fault {}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<io::Error> for Fault {
    fn from(e: io::Error) -> Self {
        Fault::new(e.kind(), e.to_string())
    }
}

impl From<io::Error> for Event {
    fn from(e: io::Error) -> Self {
        Event::Exception(e.into())
    }
}
