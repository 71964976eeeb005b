use std::{
    io, mem,
    sync::{Mutex, MutexGuard, PoisonError},
};

use futures_util::future::join_all;

use crate::{ClientStream, Config, Dialer, Error, MockServer, Result};

/// Creates and tears down any number of [`MockServer`]s.
///
/// Servers are kept in creation order and looked up by port. Dialing a
/// port through the factory reaches the server listening on it.
///
/// ```rust,no_run
/// use mocktcp::{Config, Dialer, ServerFactory};
///
/// # async fn run() -> mocktcp::Result {
/// let factory = ServerFactory::new(Config::default());
/// let a = factory.spawn().await?;
/// let b = factory.spawn().await?;
/// a.expect_connect()?;
/// b.expect_connect()?;
///
/// let mut ca = factory.dial(a.port()).await?;
/// let mut cb = factory.dial(b.port()).await?;
/// for client in [&mut ca, &mut cb] {
///     client.close();
///     client.wait_closed().await?;
/// }
///
/// factory.stop().await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ServerFactory {
    config: Config,
    servers: Mutex<Vec<MockServer>>,
}

impl ServerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            servers: Mutex::new(Vec::new()),
        }
    }

    /// Start a new server configured like the factory.
    pub async fn spawn(&self) -> Result<MockServer> {
        let server = MockServer::start(self.config.clone()).await?;
        tracing::debug!(port = server.port(), "spawned mock server");
        self.servers().push(server.clone());
        Ok(server)
    }

    /// The server listening on `port`, if this factory created it.
    pub fn server(&self, port: u16) -> Option<MockServer> {
        self.servers().iter().find(|s| s.port() == port).cloned()
    }

    pub fn len(&self) -> usize {
        self.servers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers().is_empty()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop every server concurrently.
    ///
    /// Every server is stopped even if some fail. The error returned is the
    /// one from the earliest created server that failed. Servers spawned
    /// afterwards are not affected.
    pub async fn stop(&self) -> Result {
        let servers = mem::take(&mut *self.servers());
        let results = join_all(servers.iter().map(MockServer::stop)).await;
        results.into_iter().collect()
    }

    fn servers(&self) -> MutexGuard<'_, Vec<MockServer>> {
        self.servers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Dialer for ServerFactory {
    async fn dial(&self, port: u16) -> io::Result<ClientStream> {
        let Some(server) = self.server(port) else {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                Error::UnknownPort(port),
            ));
        };
        server.connect().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::framing;

    fn factory() -> ServerFactory {
        ServerFactory::new(
            Config::default()
                .with_default_timeout(Duration::from_millis(200))
                .with_evaluation_grace(Duration::from_millis(200)),
        )
    }

    fn script(server: &MockServer, n: u8) {
        server.expect_connect().unwrap();
        server.expect_frame(format!("Client hello {n}")).unwrap();
        server.send_frame(format!("Server hello {n}")).unwrap();
        server.expect_disconnect().unwrap();
    }

    #[tokio::test]
    async fn two_servers_succeed() {
        let factory = factory();
        let servers = [factory.spawn().await.unwrap(), factory.spawn().await.unwrap()];
        assert_ne!(servers[0].port(), servers[1].port());

        for (n, server) in (1..).zip(&servers) {
            script(server, n);
            let mut client = factory.dial(server.port()).await.unwrap();
            framing::write_frame(&mut client, format!("Client hello {n}").as_bytes())
                .await
                .unwrap();
            let reply = framing::read_frame(&mut client).await.unwrap();
            assert_eq!(reply, format!("Server hello {n}").as_bytes());
            client.close();
            client.wait_closed().await.unwrap();
        }

        factory.stop().await.unwrap();
        assert!(factory.is_empty());
    }

    #[tokio::test]
    async fn one_of_two_servers_fails() {
        let factory = factory();
        let first = factory.spawn().await.unwrap();
        let second = factory.spawn().await.unwrap();
        script(&first, 1);
        script(&second, 2);

        let mut client = factory.dial(first.port()).await.unwrap();
        framing::write_frame(&mut client, b"Client hello 1").await.unwrap();
        framing::read_frame(&mut client).await.unwrap();
        client.close();
        client.wait_closed().await.unwrap();

        let mut client = factory.dial(second.port()).await.unwrap();
        client.close();
        client.wait_closed().await.unwrap();

        first.join().await.unwrap();
        assert_eq!(
            second.join().await.unwrap_err().to_string(),
            "Expected to get frame b'Client hello 2' but actually got frame b''"
        );
        factory.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_reports_earliest_failure() {
        let factory = factory();
        let quiet = factory.spawn().await.unwrap();
        let late = factory.spawn().await.unwrap();
        quiet.expect_connect_within(Duration::from_millis(20)).unwrap();
        late.expect_connect_within(Duration::from_millis(80)).unwrap();

        let err = factory.stop().await.unwrap_err();
        assert_eq!(err.to_string(), "Timed out waiting for client to connect.");
        assert_eq!(quiet.expect_connect(), Err(Error::Stopped(quiet.port())));
        assert_eq!(late.expect_connect(), Err(Error::Stopped(late.port())));
    }

    #[tokio::test]
    async fn unknown_port_is_refused() {
        let factory = factory();
        let server = factory.spawn().await.unwrap();
        let err = factory
            .dial(server.port().wrapping_add(1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
        assert!(factory.server(server.port()).is_some());

        server.expect_connect().unwrap();
        let mut client = factory.dial(server.port()).await.unwrap();
        client.close();
        client.wait_closed().await.unwrap();
        factory.stop().await.unwrap();
    }
}
