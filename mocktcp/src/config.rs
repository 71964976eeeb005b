use std::{
    net::{IpAddr, Ipv4Addr},
    time::Duration,
};

/// Runtime configuration for mock servers.
///
/// Controls default timeouts and the address listeners bind to. Use the
/// builder methods to customize, or [`Default`] for sensible defaults.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use mocktcp::Config;
///
/// let config = Config::default()
///     .with_default_timeout(Duration::from_millis(250))   // Faster failures
///     .with_evaluation_grace(Duration::from_millis(500)); // Less slack per check
///
/// assert_eq!(config.default_timeout(), Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Timeout applied by declarations that don't take one explicitly.
    /// Default: 1s
    default_timeout: Duration,

    /// Extra time an evaluation waits for its paired event on top of the
    /// expectation's own timeout. Every event-producing action finishes
    /// within its timeout, so this only has to cover scheduling delay.
    /// Default: 1s
    evaluation_grace: Duration,

    /// Address listeners bind to and dialers connect to. The port is always
    /// picked by the OS.
    /// Default: 127.0.0.1
    bind_addr: IpAddr,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_timeout: Duration::from_secs(1),
            evaluation_grace: Duration::from_secs(1),
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

impl Config {
    /// Set the timeout used by `expect_*` declarations without an explicit one.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Returns the default expectation timeout.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Set how long an evaluation waits past its expectation's timeout.
    pub fn with_evaluation_grace(mut self, grace: Duration) -> Self {
        self.evaluation_grace = grace;
        self
    }

    /// Returns the evaluation grace period.
    pub fn evaluation_grace(&self) -> Duration {
        self.evaluation_grace
    }

    /// Set the address listeners bind to.
    pub fn with_bind_addr(mut self, addr: impl Into<IpAddr>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Returns the listener bind address.
    pub fn bind_addr(&self) -> IpAddr {
        self.bind_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.default_timeout(), Duration::from_secs(1));
        assert_eq!(config.evaluation_grace(), Duration::from_secs(1));
        assert_eq!(config.bind_addr(), IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn builder_overrides() {
        let config = Config::default()
            .with_default_timeout(Duration::from_millis(100))
            .with_evaluation_grace(Duration::from_millis(50))
            .with_bind_addr(Ipv4Addr::UNSPECIFIED);
        assert_eq!(config.default_timeout(), Duration::from_millis(100));
        assert_eq!(config.evaluation_grace(), Duration::from_millis(50));
        assert_eq!(config.bind_addr(), IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let config = Config::default().with_default_timeout(Duration::from_millis(300));
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
