//! Handles to started containers.

use std::collections::BTreeMap;

use super::ContainerPort;
use crate::error::{ConfigError, HarnessError, ProvisioningError};
use crate::network::{AddressMode, Endpoint};

/// A started container and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveContainer {
    id: String,
    host: String,
    mapped_ports: BTreeMap<ContainerPort, u16>,
    network_alias: Option<String>,
}

impl LiveContainer {
    /// Describe a started container.
    ///
    /// `mapped_ports` maps each declared port to the host port the engine
    /// published it on.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        host: impl Into<String>,
        mapped_ports: BTreeMap<ContainerPort, u16>,
        network_alias: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            mapped_ports,
            network_alias,
        }
    }

    /// Engine container ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Engine-reported host for published ports.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Declared ports.
    pub fn ports(&self) -> impl Iterator<Item = ContainerPort> + '_ {
        self.mapped_ports.keys().copied()
    }

    /// Alias under which other containers on the network reach this one.
    #[must_use]
    pub fn network_alias(&self) -> Option<&str> {
        self.network_alias.as_deref()
    }

    /// Host port published for `port`.
    ///
    /// # Errors
    ///
    /// Returns `ProvisioningError::PortNotMapped` when `port` was not
    /// declared or the engine did not publish it.
    pub fn mapped_port(&self, port: impl Into<ContainerPort>) -> Result<u16, HarnessError> {
        let declared = port.into();
        self.mapped_ports.get(&declared).copied().ok_or_else(|| {
            HarnessError::from(ProvisioningError::PortNotMapped {
                container_id: self.id.clone(),
                port: declared.to_string(),
            })
        })
    }

    /// Address of `port` as seen from the test process
    /// ([`AddressMode::External`]) or from a sibling container on the same
    /// network ([`AddressMode::Internal`]).
    ///
    /// # Errors
    ///
    /// External mode fails like [`Self::mapped_port`]. Internal mode returns
    /// `ConfigError::MissingRequired` (`network`) when the container is not
    /// attached to a network.
    pub fn endpoint(
        &self,
        port: impl Into<ContainerPort>,
        mode: AddressMode,
    ) -> Result<Endpoint, HarnessError> {
        let declared = port.into();
        match mode {
            AddressMode::External => Ok(Endpoint::new(self.host.clone(), self.mapped_port(declared)?)),
            AddressMode::Internal => {
                let alias = self.network_alias.as_deref().ok_or_else(|| {
                    HarnessError::from(ConfigError::MissingRequired {
                        field: String::from("network"),
                    })
                })?;
                Ok(Endpoint::new(alias, declared.number()))
            }
        }
    }
}
