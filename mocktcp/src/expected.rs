use std::{borrow::Cow, fmt};

use bytes::Bytes;

use crate::{Event, Label, Literal};

/// The events an expectation can ask for.
///
/// A strict subset of [`Event`]: outcomes such as `TimedOut` or
/// `IncompleteRead` can happen but are never *expected*. Keeping the set
/// closed lets diagnostics match every expectable kind exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expected {
    Connected,
    BytesRead(Bytes),
    FrameRead(Bytes),
    ReadZero,
    WriterCloseObserved,
    NoRemainingSentData,
    WriterWaitClosedObserved,
}

impl Expected {
    /// Whether `actual` satisfies this expectation.
    pub fn matches(&self, actual: &Event) -> bool {
        match (self, actual) {
            (Expected::Connected, Event::Connected) => true,
            (Expected::BytesRead(want), Event::BytesRead(got)) => want == got,
            (Expected::FrameRead(want), Event::FrameRead(got)) => want == got,
            (Expected::ReadZero, Event::ReadZero) => true,
            (Expected::WriterCloseObserved, Event::WriterCloseObserved) => true,
            (Expected::NoRemainingSentData, Event::NoRemainingSentData) => true,
            (Expected::WriterWaitClosedObserved, Event::WriterWaitClosedObserved) => true,
            _ => false,
        }
    }
}

impl Label for Expected {
    fn label(&self) -> Cow<'static, str> {
        Cow::Borrowed(match self {
            Expected::Connected => "Connected",
            Expected::BytesRead(_) => "BytesRead",
            Expected::FrameRead(_) => "FrameRead",
            Expected::ReadZero => "ReadZero",
            Expected::WriterCloseObserved => "WriterCloseObserved",
            Expected::NoRemainingSentData => "NoRemainingSentData",
            Expected::WriterWaitClosedObserved => "WriterWaitClosedObserved",
        })
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::BytesRead(b) | Expected::FrameRead(b) => {
                write!(f, "{}({})", self.label(), Literal(b))
            }
            _ => f.write_str(&self.label()),
        }
    }
}
