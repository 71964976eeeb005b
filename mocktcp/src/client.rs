use std::{
    io,
    net::SocketAddr,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll, ready},
};

use bytes::{Buf, BytesMut};
use tokio::{
    io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
};
use tokio_util::io::poll_read_buf;

use crate::internal::ClientProbe;

const READ_CHUNK: usize = 8 * 1024;

/// Client end of a connection to a [`MockServer`](crate::MockServer).
///
/// Behaves like a plain TCP stream ([`AsyncRead`], [`AsyncBufRead`],
/// [`AsyncWrite`]) and additionally reports to the server:
///
/// - every byte handed to the caller, so the server can tell whether
///   everything it sent was read;
/// - calls to [`close`](Self::close) and [`wait_closed`](Self::wait_closed),
///   which `expect_disconnect` waits for.
///
/// Only bytes actually delivered count as read. Data buffered internally by
/// [`AsyncBufRead::poll_fill_buf`] is credited once it is consumed.
///
/// Only the first stream dialed against a server is instrumented; later
/// streams are plain connections.
#[derive(Debug)]
pub struct ClientStream {
    reader: OwnedReadHalf,
    writer: Option<OwnedWriteHalf>,
    buffer: BytesMut,
    probe: Option<Arc<ClientProbe>>,
}

impl ClientStream {
    pub(crate) fn new(stream: TcpStream, probe: Option<Arc<ClientProbe>>) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader,
            writer: Some(writer),
            buffer: BytesMut::new(),
            probe,
        }
    }

    /// Whether this stream reports to its server.
    pub fn is_instrumented(&self) -> bool {
        self.probe.is_some()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.reader.local_addr()
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.reader.peer_addr()
    }

    /// Close the writing side.
    ///
    /// The server sees end of stream. Reading remains possible, and further
    /// writes fail with [`io::ErrorKind::BrokenPipe`].
    pub fn close(&mut self) {
        if let Some(probe) = &self.probe {
            probe.mark_close_called();
        }
        self.writer.take();
    }

    /// Wait until the writing side is fully shut down.
    ///
    /// Call after [`close`](Self::close); calling it alone also shuts the
    /// writer down.
    pub async fn wait_closed(&mut self) -> io::Result<()> {
        if let Some(probe) = &self.probe {
            probe.mark_wait_closed_called();
        }
        match self.writer.take() {
            Some(mut writer) => writer.shutdown().await,
            None => Ok(()),
        }
    }

    fn credit(&self, n: usize) {
        if let Some(probe) = &self.probe {
            probe.credit(n);
        }
    }
}

impl AsyncRead for ClientStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.buffer.is_empty() {
            let n = this.buffer.len().min(buf.remaining());
            buf.put_slice(&this.buffer[..n]);
            this.buffer.advance(n);
            this.credit(n);
            return Poll::Ready(Ok(()));
        }
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.reader).poll_read(cx, buf))?;
        this.credit(buf.filled().len() - before);
        Poll::Ready(Ok(()))
    }
}

impl AsyncBufRead for ClientStream {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        let this = self.get_mut();
        if this.buffer.is_empty() {
            this.buffer.reserve(READ_CHUNK);
            ready!(poll_read_buf(Pin::new(&mut this.reader), cx, &mut this.buffer))?;
        }
        Poll::Ready(Ok(&this.buffer[..]))
    }

    fn consume(self: Pin<&mut Self>, amt: usize) {
        let this = self.get_mut();
        let amt = amt.min(this.buffer.len());
        this.buffer.advance(amt);
        this.credit(amt);
    }
}

impl AsyncWrite for ClientStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut().writer.as_mut() {
            Some(writer) => Pin::new(writer).poll_write(cx, buf),
            None => Poll::Ready(Err(closed())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().writer.as_mut() {
            Some(writer) => Pin::new(writer).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().writer.as_mut() {
            Some(writer) => Pin::new(writer).poll_shutdown(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client writer is closed")
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncBufReadExt, AsyncReadExt},
        net::TcpListener,
    };

    use super::*;

    async fn pair() -> (ClientStream, TcpStream, Arc<ClientProbe>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        let probe = Arc::new(ClientProbe::default());
        (ClientStream::new(client, Some(probe.clone())), server, probe)
    }

    #[tokio::test]
    async fn reads_are_credited() {
        let (mut client, mut server, probe) = pair().await;
        server.write_all(b"Hello, world").await.unwrap();
        let mut buf = [0u8; 5];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(probe.consumed(), 5);
    }

    #[tokio::test]
    async fn buffered_lines_are_credited_when_consumed() {
        let (mut client, mut server, probe) = pair().await;
        server.write_all(b"One\nTwo\n").await.unwrap();
        server.shutdown().await.unwrap();
        let mut line = String::new();
        client.read_line(&mut line).await.unwrap();
        assert_eq!(line, "One\n");
        assert_eq!(probe.consumed(), 4);

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"Two\n");
        assert_eq!(probe.consumed(), 8);
    }

    #[tokio::test]
    async fn close_sends_eof_and_blocks_writes() {
        let (mut client, mut server, _) = pair().await;
        client.write_all(b"bye").await.unwrap();
        client.close();
        let mut got = Vec::new();
        server.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, b"bye");

        let err = client.write_all(b"more").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        client.wait_closed().await.unwrap();
    }

    #[tokio::test]
    async fn close_calls_are_latched() {
        let (mut client, _server, probe) = pair().await;
        client.close();
        client.wait_closed().await.unwrap();
        probe.close_called().await;
        probe.wait_closed_called().await;
    }
}
