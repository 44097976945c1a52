//! Realising a container definition against an engine.
//!
//! Order: image build (when a context is given), network, create, file
//! upload, start, inspect, readiness, post-start delay. Once the container exists, any later
//! failure removes it again before the error is returned.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use bollard::models::{
    ContainerCreateBody, ContainerInspectResponse, EndpointSettings, HostConfig, NetworkingConfig,
};
use bollard::query_parameters::{
    BuildImageOptionsBuilder, CreateContainerOptionsBuilder, UploadToContainerOptionsBuilder,
};
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tracing::{debug, info, warn};

use super::{ContainerDefinition, ContainerPort, ImageSource, LiveContainer};
use crate::cancellation::CancellationSignal;
use crate::engine::{ContainerEngine, build_context_archive, payload_archive};
use crate::error::{FilesystemError, HarnessError, ProvisioningError, Result};
use crate::network::LiveNetwork;
use crate::readiness::{ReadinessPolicy, ReadinessWaiter};

const DOCKERFILE: &str = "Dockerfile";

static NEXT_BUILD: AtomicU64 = AtomicU64::new(1);

impl ContainerDefinition {
    /// Create, start, and wait for the container.
    ///
    /// Readiness is polled at the default interval; use
    /// [`Self::build_with_waiter`] to choose another.
    ///
    /// # Errors
    ///
    /// Returns `ProvisioningError` for engine failures, `ReadinessError` when
    /// the container never becomes ready, `FilesystemError` when the build
    /// context cannot be read, and `HarnessError::Cancelled` when the run is
    /// cancelled. The container is removed before any post-create error is
    /// returned.
    pub async fn build<E>(
        &self,
        engine: &E,
        cancellation: &CancellationSignal,
    ) -> Result<LiveContainer>
    where
        E: ContainerEngine + ?Sized,
    {
        self.build_with_waiter(engine, cancellation, ReadinessWaiter::default())
            .await
    }

    /// [`Self::build`] with a caller-supplied readiness waiter.
    ///
    /// # Errors
    ///
    /// As for [`Self::build`].
    pub async fn build_with_waiter<E>(
        &self,
        engine: &E,
        cancellation: &CancellationSignal,
        mut waiter: ReadinessWaiter,
    ) -> Result<LiveContainer>
    where
        E: ContainerEngine + ?Sized,
    {
        let image = self.resolve_image(engine, cancellation).await?;
        let network = match &self.network {
            Some(definition) => Some(definition.build(engine, cancellation).await?),
            None => None,
        };

        let body = self.create_body(&image, network);
        let options = self
            .name
            .as_deref()
            .map(|name| CreateContainerOptionsBuilder::new().name(name).build());
        cancellation.check("create container")?;
        // Not raced against the signal; a container created after
        // cancellation is removed below.
        let created = engine
            .create_container(options, body)
            .await
            .map_err(|e| ProvisioningError::CreateFailed {
                message: e.to_string(),
            })?;
        let container_id = created.id;
        info!(container_id = %container_id, image = %image, "created container");

        let started = async {
            cancellation.check("create container")?;
            self.start_created(engine, cancellation, &container_id, network, &mut waiter)
                .await
        }
        .await;

        match started {
            Ok(live) => Ok(live),
            Err(error) => {
                discard(engine, &container_id).await;
                Err(error)
            }
        }
    }

    /// Blocking form of [`Self::build`] for synchronous test code.
    ///
    /// Must not be called from within an async context driven by `runtime`.
    ///
    /// # Errors
    ///
    /// As for [`Self::build`].
    pub fn build_blocking<E>(
        &self,
        runtime: &tokio::runtime::Handle,
        engine: &E,
        cancellation: &CancellationSignal,
    ) -> Result<LiveContainer>
    where
        E: ContainerEngine + ?Sized,
    {
        runtime.block_on(self.build(engine, cancellation))
    }

    async fn start_created<E>(
        &self,
        engine: &E,
        cancellation: &CancellationSignal,
        container_id: &str,
        network: Option<&LiveNetwork>,
        waiter: &mut ReadinessWaiter,
    ) -> Result<LiveContainer>
    where
        E: ContainerEngine + ?Sized,
    {
        if !self.files.is_empty() {
            let archive = payload_archive(&self.files).map_err(|e| ProvisioningError::UploadFailed {
                container_id: String::from(container_id),
                message: e.to_string(),
            })?;
            let options = UploadToContainerOptionsBuilder::new().path("/").build();
            cancellation
                .guard("upload files", async {
                    engine
                        .upload_to_container(container_id, Some(options), archive)
                        .await
                })
                .await?
                .map_err(|e| ProvisioningError::UploadFailed {
                    container_id: String::from(container_id),
                    message: e.to_string(),
                })?;
            debug!(container_id, files = self.files.len(), "uploaded files");
        }

        cancellation
            .guard("start container", async {
                engine.start_container(container_id).await
            })
            .await?
            .map_err(|e| ProvisioningError::StartFailed {
                container_id: String::from(container_id),
                message: e.to_string(),
            })?;

        let inspected = cancellation
            .guard("inspect container", async {
                engine.inspect_container(container_id).await
            })
            .await?
            .map_err(|e| ProvisioningError::InspectFailed {
                container_id: String::from(container_id),
                message: e.to_string(),
            })?;
        let mapped_ports = self.mapped_ports(container_id, &inspected)?;

        let live = LiveContainer::new(
            container_id,
            engine.host(),
            mapped_ports,
            network.map(|attached| String::from(attached.alias())),
        );
        info!(container_id, host = %live.host(), "started container");

        if let Some(policy) = &self.readiness {
            waiter.wait(engine, cancellation, &live, policy).await?;
        }
        if let Some(delay) = self.post_start_delay {
            waiter
                .wait(engine, cancellation, &live, &ReadinessPolicy::FixedDelay(delay))
                .await?;
        }
        Ok(live)
    }

    async fn resolve_image<E>(&self, engine: &E, cancellation: &CancellationSignal) -> Result<String>
    where
        E: ContainerEngine + ?Sized,
    {
        let context = match &self.image {
            ImageSource::Image(reference) => return Ok(reference.clone()),
            ImageSource::BuildContext(context) => context,
        };

        let archive = read_context(context)?;
        let tag = format!(
            "scenariopod-build-{}-{}",
            std::process::id(),
            NEXT_BUILD.fetch_add(1, Ordering::Relaxed)
        );
        let options = BuildImageOptionsBuilder::new()
            .dockerfile(DOCKERFILE)
            .t(&tag)
            .rm(true)
            .build();

        cancellation
            .guard("build image", async { engine.build_image(options, archive).await })
            .await?
            .map_err(|e| ProvisioningError::ImageBuildFailed {
                context: context.to_string(),
                message: e.to_string(),
            })?;

        info!(image = %tag, context = %context, "built image");
        Ok(tag)
    }

    fn create_body(&self, image: &str, network: Option<&LiveNetwork>) -> ContainerCreateBody {
        let env = (!self.env.is_empty()).then(|| {
            self.env
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect()
        });
        let exposed_ports = (!self.exposed_ports.is_empty())
            .then(|| self.exposed_ports.iter().map(ToString::to_string).collect());
        let networking_config = network.map(|attached| NetworkingConfig {
            endpoints_config: Some(HashMap::from([(
                String::from(attached.name()),
                EndpointSettings {
                    aliases: Some(vec![String::from(attached.alias())]),
                    ..EndpointSettings::default()
                },
            )])),
        });

        ContainerCreateBody {
            image: Some(String::from(image)),
            env,
            cmd: self.cmd.clone(),
            exposed_ports,
            host_config: Some(HostConfig {
                publish_all_ports: Some(true),
                network_mode: network.map(|attached| String::from(attached.name())),
                ..HostConfig::default()
            }),
            networking_config,
            ..ContainerCreateBody::default()
        }
    }

    fn mapped_ports(
        &self,
        container_id: &str,
        inspected: &ContainerInspectResponse,
    ) -> Result<BTreeMap<ContainerPort, u16>> {
        let published = inspected
            .network_settings
            .as_ref()
            .and_then(|settings| settings.ports.as_ref());

        self.exposed_ports
            .iter()
            .map(|port| {
                published
                    .and_then(|ports| ports.get(&port.to_string()))
                    .and_then(Option::as_ref)
                    .and_then(|bindings| {
                        bindings
                            .iter()
                            .filter_map(|binding| binding.host_port.as_deref())
                            .find_map(|host_port| host_port.parse::<u16>().ok())
                    })
                    .map(|host_port| (*port, host_port))
                    .ok_or_else(|| {
                        HarnessError::from(ProvisioningError::PortNotMapped {
                            container_id: String::from(container_id),
                            port: port.to_string(),
                        })
                    })
            })
            .collect()
    }
}

fn read_context(context: &Utf8Path) -> Result<Vec<u8>> {
    let dir = Dir::open_ambient_dir(context, ambient_authority())
        .map_err(|e| FilesystemError::from_io(context.as_std_path(), &e))?;
    build_context_archive(&dir)
        .map_err(|e| HarnessError::from(FilesystemError::from_io(context.as_std_path(), &e)))
}

async fn discard<E>(engine: &E, container_id: &str)
where
    E: ContainerEngine + ?Sized,
{
    match engine.remove_container(container_id).await {
        Ok(()) => debug!(container_id, "removed container after failed startup"),
        Err(e) => warn!(
            container_id,
            error = %e,
            "failed to remove container after failed startup"
        ),
    }
}
