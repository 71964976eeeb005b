use std::fmt;

use crate::{Event, Expected, Literal};

/// An expectation that was not met: what was expected and what actually
/// happened instead.
///
/// `Display` interprets the pair into one diagnostic sentence. Every
/// [`Expected`] kind has dedicated sentences for the outcomes it commonly
/// meets plus its own catch-all naming the actual event, so there is no
/// anonymous fallback.
///
/// ```rust
/// use mocktcp::{Event, Expected, Unexpected};
///
/// let failure = Unexpected::new(Expected::Connected, Event::TimedOut);
/// assert_eq!(failure.to_string(), "Timed out waiting for client to connect.");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unexpected {
    expected: Expected,
    actual: Event,
}

impl Unexpected {
    pub fn new(expected: Expected, actual: Event) -> Self {
        Self { expected, actual }
    }

    pub fn expected(&self) -> &Expected {
        &self.expected
    }

    pub fn actual(&self) -> &Event {
        &self.actual
    }
}

impl fmt::Display for Unexpected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expected {
            Expected::Connected => connected(f, &self.actual),
            Expected::BytesRead(want) => bytes_read(f, want, &self.actual),
            Expected::FrameRead(want) => frame_read(f, want, &self.actual),
            Expected::ReadZero => read_zero(f, &self.actual),
            Expected::WriterCloseObserved => match &self.actual {
                Event::TimedOut => {
                    write!(f, "Timed out waiting for client to call `close()`.")
                }
                actual => write!(f, "Expected client to call `close()` but got {actual}."),
            },
            Expected::NoRemainingSentData => match &self.actual {
                Event::UnreadSentBytes(rest) => write!(
                    f,
                    "There is data sent by server that was not read by client: unread_bytes={}.",
                    Literal(rest)
                ),
                actual => write!(
                    f,
                    "Expected client to have read all data sent by server but got {actual}."
                ),
            },
            Expected::WriterWaitClosedObserved => match &self.actual {
                Event::TimedOut => write!(
                    f,
                    "Timed out waiting for client to call `wait_closed()`."
                ),
                actual => write!(
                    f,
                    "Expected client to call `wait_closed()` but got {actual}."
                ),
            },
        }
    }
}

impl std::error::Error for Unexpected {}

fn connected(f: &mut fmt::Formatter<'_>, actual: &Event) -> fmt::Result {
    match actual {
        Event::TimedOut => write!(f, "Timed out waiting for client to connect."),
        Event::NotConnected => write!(
            f,
            "Client is not connected. Did you forget to call `connect()`?"
        ),
        Event::SecondConnectionAttempted => write!(
            f,
            "A second connection was attempted while waiting for client to connect."
        ),
        actual => write!(f, "Expected client to connect but got {actual}."),
    }
}

fn bytes_read(f: &mut fmt::Formatter<'_>, want: &[u8], actual: &Event) -> fmt::Result {
    let want = Literal(want);
    match actual {
        Event::TimedOut => write!(f, "Timed out waiting for {want}"),
        Event::Connected => {
            write!(f, "Missing `expect_connect()` before `expect_bytes({want})`")
        }
        Event::BytesRead(got) => {
            write!(f, "Expected to read {want} but actually read {}", Literal(got))
        }
        Event::IncompleteRead(partial) => write!(
            f,
            "Expected to read {want} but only read {} before the connection was closed.",
            Literal(partial)
        ),
        Event::SecondConnectionAttempted => write!(
            f,
            "While waiting for {want} a second connection was attempted."
        ),
        Event::Exception(fault) => {
            write!(f, "Connection failed while waiting for {want}: {fault}.")
        }
        actual => write!(f, "Expected to read {want} but got {actual}."),
    }
}

fn frame_read(f: &mut fmt::Formatter<'_>, want: &[u8], actual: &Event) -> fmt::Result {
    let want = Literal(want);
    match actual {
        Event::TimedOut => write!(f, "Timed out waiting for frame {want}"),
        Event::Connected => {
            write!(f, "Missing `expect_connect()` before `expect_frame({want})`")
        }
        Event::FrameRead(got) => write!(
            f,
            "Expected to get frame {want} but actually got frame {}",
            Literal(got)
        ),
        Event::IncompleteRead(partial) => write!(
            f,
            "Expected to get frame {want} but only read {} before the connection was closed.",
            Literal(partial)
        ),
        Event::SecondConnectionAttempted => write!(
            f,
            "While waiting for frame {want} a second connection was attempted."
        ),
        Event::Exception(fault) => {
            write!(f, "Connection failed while waiting for frame {want}: {fault}.")
        }
        actual => write!(f, "Expected to get frame {want} but got {actual}."),
    }
}

fn read_zero(f: &mut fmt::Formatter<'_>, actual: &Event) -> fmt::Result {
    match actual {
        Event::SecondConnectionAttempted => write!(
            f,
            "While waiting for client to disconnect a second connection was attempted."
        ),
        Event::TimedOut => write!(
            f,
            "Timed out waiting for client to disconnect. Remember to call `close()`."
        ),
        Event::BytesRead(data) => write!(
            f,
            "Received unexpected data while waiting for client to disconnect. Data is {}.",
            Literal(data)
        ),
        // Reads fold resets into ReadZero, so this arm is reached through a
        // fault left behind by an earlier send or disconnect.
        Event::Exception(fault) if fault.is_reset() => write!(
            f,
            "Connection was reset. Did client close writer prematurely?"
        ),
        Event::Exception(fault) => write!(
            f,
            "Connection failed while waiting for client to disconnect: {fault}."
        ),
        actual => write!(f, "Expected client to disconnect but got {actual}."),
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use bytes::Bytes;

    use super::*;
    use crate::Fault;

    fn message(expected: Expected, actual: Event) -> String {
        Unexpected::new(expected, actual).to_string()
    }

    #[test]
    fn connect_diagnostics() {
        assert_eq!(
            message(Expected::Connected, Event::TimedOut),
            "Timed out waiting for client to connect."
        );
        assert_eq!(
            message(Expected::Connected, Event::NotConnected),
            "Client is not connected. Did you forget to call `connect()`?"
        );
        assert_eq!(
            message(Expected::Connected, Event::ReadZero),
            "Expected client to connect but got ReadZero."
        );
    }

    #[test]
    fn bytes_diagnostics() {
        let want = || Expected::BytesRead("Bonjour".into());
        assert_eq!(
            message(want(), Event::BytesRead("Goodbye".into())),
            "Expected to read b'Bonjour' but actually read b'Goodbye'"
        );
        assert_eq!(
            message(want(), Event::TimedOut),
            "Timed out waiting for b'Bonjour'"
        );
        assert_eq!(
            message(Expected::BytesRead("Hello, world".into()), Event::Connected),
            "Missing `expect_connect()` before `expect_bytes(b'Hello, world')`"
        );
        assert_eq!(
            message(
                Expected::BytesRead("Hello, world".into()),
                Event::IncompleteRead(Bytes::new())
            ),
            "Expected to read b'Hello, world' but only read b'' before the connection was closed."
        );
    }

    #[test]
    fn frame_diagnostics() {
        assert_eq!(
            message(
                Expected::FrameRead("Bonjour".into()),
                Event::FrameRead("Goodbye, world".into())
            ),
            "Expected to get frame b'Bonjour' but actually got frame b'Goodbye, world'"
        );
        assert_eq!(
            message(Expected::FrameRead("Goodbye, world".into()), Event::TimedOut),
            "Timed out waiting for frame b'Goodbye, world'"
        );
        assert_eq!(
            message(
                Expected::FrameRead("Client hello 2".into()),
                Event::FrameRead(Bytes::new())
            ),
            "Expected to get frame b'Client hello 2' but actually got frame b''"
        );
    }

    #[test]
    fn disconnect_diagnostics() {
        assert_eq!(
            message(Expected::ReadZero, Event::SecondConnectionAttempted),
            "While waiting for client to disconnect a second connection was attempted."
        );
        assert_eq!(
            message(Expected::ReadZero, Event::TimedOut),
            "Timed out waiting for client to disconnect. Remember to call `close()`."
        );
        assert_eq!(
            message(Expected::ReadZero, Event::BytesRead("Hello".into())),
            "Received unexpected data while waiting for client to disconnect. Data is b'Hello'."
        );
        assert_eq!(
            message(
                Expected::ReadZero,
                Event::Exception(Fault::new(io::ErrorKind::ConnectionReset, "reset"))
            ),
            "Connection was reset. Did client close writer prematurely?"
        );
        assert_eq!(
            message(Expected::WriterCloseObserved, Event::TimedOut),
            "Timed out waiting for client to call `close()`."
        );
        assert_eq!(
            message(Expected::WriterWaitClosedObserved, Event::TimedOut),
            "Timed out waiting for client to call `wait_closed()`."
        );
        assert_eq!(
            message(
                Expected::NoRemainingSentData,
                Event::UnreadSentBytes("Hola!".into())
            ),
            "There is data sent by server that was not read by client: unread_bytes=b'Hola!'."
        );
    }

    #[test]
    fn catch_all_names_actual_event() {
        assert_eq!(
            message(Expected::WriterCloseObserved, Event::ReadZero),
            "Expected client to call `close()` but got ReadZero."
        );
        assert_eq!(
            message(Expected::ReadZero, Event::FrameRead("x".into())),
            "Expected client to disconnect but got FrameRead(b'x')."
        );
    }
}
