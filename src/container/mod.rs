//! Declarative container definitions and their live handles.
//!
//! A [`ContainerDefinitionBuilder`] records options; [`ContainerDefinitionBuilder::finish`]
//! validates them without touching the engine; [`ContainerDefinition::build`]
//! realises the definition and returns a [`LiveContainer`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use scenariopod::cancellation::CancellationSignal;
//! use scenariopod::container::ContainerDefinition;
//! use scenariopod::engine::EngineConnector;
//! use scenariopod::network::{AddressMode, NetworkDefinition};
//!
//! # async fn demo() -> scenariopod::error::Result<()> {
//! let engine = EngineConnector::connect_and_verify_async("unix:///var/run/docker.sock").await?;
//! let network = Arc::new(NetworkDefinition::new().with_alias("db-net"));
//! let postgres = ContainerDefinition::builder()
//!     .with_image("postgres:16")
//!     .with_env_vars([("POSTGRES_PASSWORD", "secret")])
//!     .with_exposed_ports(["5432"])
//!     .with_network(Arc::clone(&network))
//!     .with_wait_for_port("5432", Duration::from_secs(10))
//!     .finish()?;
//!
//! let live = postgres.build(&engine, &CancellationSignal::new()).await?;
//! let address = live.endpoint(5432_u16, AddressMode::External)?;
//! println!("{address}");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;

use crate::error::ConfigError;

mod build;
mod definition;
mod handle;

pub use definition::{ContainerDefinition, ContainerDefinitionBuilder};
pub use handle::LiveContainer;

pub use crate::engine::FilePayload;

/// Where a container's image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A registry reference such as `postgres:16`.
    Image(String),
    /// A host directory holding a `Dockerfile`, built before creation.
    BuildContext(Utf8PathBuf),
}

/// Transport protocol of a container port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
}

impl Protocol {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

/// A port declared inside a container, for example `5432/tcp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerPort {
    number: u16,
    protocol: Protocol,
}

impl ContainerPort {
    /// A TCP port.
    #[must_use]
    pub const fn tcp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Tcp,
        }
    }

    /// A UDP port.
    #[must_use]
    pub const fn udp(number: u16) -> Self {
        Self {
            number,
            protocol: Protocol::Udp,
        }
    }

    /// The port number.
    #[must_use]
    pub const fn number(&self) -> u16 {
        self.number
    }

    /// The protocol.
    #[must_use]
    pub const fn protocol(&self) -> Protocol {
        self.protocol
    }
}

impl From<u16> for ContainerPort {
    fn from(number: u16) -> Self {
        Self::tcp(number)
    }
}

/// Engine notation: `<number>/<protocol>`.
impl fmt::Display for ContainerPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol.as_str())
    }
}

impl FromStr for ContainerPort {
    type Err = ConfigError;

    /// Accepts `5432`, `5432/tcp`, and `53/udp`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: String::from("port"),
            reason: format!("'{value}' {reason}"),
        };

        let trimmed = value.trim();
        let (number_text, protocol) = match trimmed.split_once('/') {
            None => (trimmed, Protocol::Tcp),
            Some((number_part, "tcp")) => (number_part, Protocol::Tcp),
            Some((number_part, "udp")) => (number_part, Protocol::Udp),
            Some(_) => return Err(invalid("has an unsupported protocol")),
        };

        let number = number_text
            .parse::<u16>()
            .map_err(|_| invalid("is not a port number"))?;
        if number == 0 {
            return Err(invalid("is not a usable port"));
        }

        Ok(Self { number, protocol })
    }
}

#[cfg(test)]
mod tests;
