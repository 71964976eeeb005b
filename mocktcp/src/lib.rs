#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mocktcp
//!
//! A scripted TCP peer for testing client protocol code against real sockets.
//!
//! A [`MockServer`] listens on an OS-assigned loopback port. You declare, in
//! order, what it should observe from the client and what it should send
//! back; the code under test then connects and talks to it, and
//! [`join()`](MockServer::join) tells you whether the conversation went as
//! scripted. Failures come back as one readable sentence, e.g.
//! `Expected to read b'Bonjour' but actually read b'Goodbye'`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mocktcp::{Config, MockServer, framing};
//!
//! #[tokio::main]
//! async fn main() -> mocktcp::Result {
//!     let server = MockServer::start(Config::default()).await?;
//!     server.expect_connect()?;
//!     server.expect_frame(b"Bonjour")?;
//!     server.send_frame(b"Hola!")?;
//!     server.expect_disconnect()?;
//!
//!     // The client under test.
//!     let mut client = server.connect().await?;
//!     framing::write_frame(&mut client, b"Bonjour").await?;
//!     let reply = framing::read_frame(&mut client).await.map_err(std::io::Error::other)?;
//!     assert_eq!(reply, "Hola!");
//!     client.close();
//!     client.wait_closed().await?;
//!
//!     server.join().await?;
//!     server.stop().await
//! }
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`MockServer`] | One scripted server: declarations, `join`, `stop` |
//! | [`ServerFactory`] | Creates any number of servers and stops them together |
//! | [`ClientStream`] | Client connection the server can observe |
//! | [`Dialer`] | Connects to a server by port |
//! | [`Event`] | What actually happened on a connection |
//! | [`Expected`] | What a declaration waits for |
//! | [`Unexpected`] | A failed expectation and its diagnostic |
//! | [`Config`] | Timeouts and bind address |
//!
//! ## How a script runs
//!
//! Each declaration is queued and returns immediately. Two background loops
//! work through the queue: one performs the server side of each step
//! (reading, sending, disconnecting) and produces at most one [`Event`],
//! the other pairs each step with the next event and checks it. After the
//! first mismatch, remaining steps are counted off without running, so
//! `join()` returns promptly with that first failure.
//!
//! Each server accepts exactly one client. A second connection attempt is
//! itself reported as a failure of whatever was being waited for.
//!
//! ## Disconnect checks
//!
//! [`expect_disconnect()`](MockServer::expect_disconnect) checks that the
//! client closed its side without sending anything more, called
//! [`ClientStream::close`] and [`ClientStream::wait_closed`], and read
//! every byte the server sent. [`stop()`](MockServer::stop) performs the
//! same check when the script did not declare one.
//!
//! ## Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `serde` | `Serialize`/`Deserialize` for [`Config`] |

mod client;
mod config;
mod dialer;
mod error;
mod event;
mod expected;
mod factory;
mod label;
mod literal;
mod server;
mod unexpected;

mod internal;

pub mod framing;

pub use client::ClientStream;
pub use config::Config;
pub use dialer::Dialer;
pub use error::Error;
pub use event::{Event, Fault};
pub use expected::Expected;
pub use factory::ServerFactory;
pub use label::Label;
pub use literal::Literal;
pub use server::MockServer;
pub use unexpected::Unexpected;

/// Convenience alias for `Result<T, mocktcp::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;
