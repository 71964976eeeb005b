use std::{future::Future, io};

use crate::ClientStream;

/// Opens client connections to mock servers by port.
///
/// Code under test can be written against a `Dialer` instead of a concrete
/// address, so the same client logic runs against a single
/// [`MockServer`](crate::MockServer) or any server of a
/// [`ServerFactory`](crate::ServerFactory). The returned stream is
/// instrumented when it is the first one dialed against that server.
///
/// ```rust,no_run
/// use mocktcp::{Dialer, framing};
///
/// async fn greet(dialer: &impl Dialer, port: u16) -> std::io::Result<()> {
///     let mut stream = dialer.dial(port).await?;
///     framing::write_frame(&mut stream, b"Client hello").await?;
///     stream.close();
///     stream.wait_closed().await
/// }
/// ```
pub trait Dialer {
    fn dial(&self, port: u16) -> impl Future<Output = io::Result<ClientStream>> + Send;
}
