//! Container engine capability trait and its `bollard` implementation.
//!
//! Everything above this module talks to the engine through
//! [`ContainerEngine`], so definitions, readiness, and teardown can be
//! exercised against a mock without a running daemon.

use std::future::Future;
use std::pin::Pin;

use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, ContainerInspectResponse, NetworkCreateRequest,
    NetworkCreateResponse,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, LogsOptionsBuilder, RemoveContainerOptionsBuilder,
    UploadToContainerOptions,
};
use bollard::{Docker, body_full};
use futures_util::TryStreamExt;

/// Boxed future returned by every [`ContainerEngine`] capability.
pub type EngineFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, bollard::errors::Error>> + Send + 'a>>;

/// Capabilities the harness needs from a container engine.
///
/// The trait is object-safe; all futures are `Send` so definitions can be
/// built from any Tokio worker.
pub trait ContainerEngine: Send + Sync {
    /// Host name under which published container ports are reachable from the
    /// test process.
    fn host(&self) -> String;

    /// Create (but do not start) a container.
    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        body: ContainerCreateBody,
    ) -> EngineFuture<'_, ContainerCreateResponse>;

    /// Start a created container.
    fn start_container(&self, container_id: &str) -> EngineFuture<'_, ()>;

    /// Extract a tar archive into a container's filesystem.
    fn upload_to_container(
        &self,
        container_id: &str,
        options: Option<UploadToContainerOptions>,
        archive_bytes: Vec<u8>,
    ) -> EngineFuture<'_, ()>;

    /// Inspect a container, including its published port bindings.
    fn inspect_container(&self, container_id: &str) -> EngineFuture<'_, ContainerInspectResponse>;

    /// Return the combined stdout and stderr produced so far.
    fn container_logs(&self, container_id: &str) -> EngineFuture<'_, Vec<u8>>;

    /// Force-remove a container together with its anonymous volumes.
    fn remove_container(&self, container_id: &str) -> EngineFuture<'_, ()>;

    /// Create a network.
    fn create_network(
        &self,
        request: NetworkCreateRequest,
    ) -> EngineFuture<'_, NetworkCreateResponse>;

    /// Remove a network by name or ID.
    fn remove_network(&self, network: &str) -> EngineFuture<'_, ()>;

    /// Build an image from a tar-encoded build context.
    fn build_image(
        &self,
        options: BuildImageOptions,
        context_archive: Vec<u8>,
    ) -> EngineFuture<'_, ()>;
}

/// [`ContainerEngine`] backed by a `bollard` Docker API client.
///
/// Works against Docker and Podman's Docker-compatible API.
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
    host: String,
}

impl DockerEngine {
    /// Wrap `docker`, publishing container ports on `host`.
    #[must_use]
    pub fn new(docker: Docker, host: impl Into<String>) -> Self {
        Self {
            docker,
            host: host.into(),
        }
    }

    /// Borrow the underlying client.
    #[must_use]
    pub const fn docker(&self) -> &Docker {
        &self.docker
    }
}

impl ContainerEngine for DockerEngine {
    fn host(&self) -> String {
        self.host.clone()
    }

    fn create_container(
        &self,
        options: Option<CreateContainerOptions>,
        body: ContainerCreateBody,
    ) -> EngineFuture<'_, ContainerCreateResponse> {
        Box::pin(async move { self.docker.create_container(options, body).await })
    }

    fn start_container(&self, container_id: &str) -> EngineFuture<'_, ()> {
        let id = String::from(container_id);
        Box::pin(async move { self.docker.start_container(&id, None).await })
    }

    fn upload_to_container(
        &self,
        container_id: &str,
        options: Option<UploadToContainerOptions>,
        archive_bytes: Vec<u8>,
    ) -> EngineFuture<'_, ()> {
        let id = String::from(container_id);
        Box::pin(async move {
            self.docker
                .upload_to_container(&id, options, body_full(archive_bytes.into()))
                .await
        })
    }

    fn inspect_container(&self, container_id: &str) -> EngineFuture<'_, ContainerInspectResponse> {
        let id = String::from(container_id);
        Box::pin(async move { self.docker.inspect_container(&id, None).await })
    }

    fn container_logs(&self, container_id: &str) -> EngineFuture<'_, Vec<u8>> {
        let id = String::from(container_id);
        Box::pin(async move {
            let options = LogsOptionsBuilder::new()
                .follow(false)
                .stdout(true)
                .stderr(true)
                .build();
            let chunks: Vec<_> = self.docker.logs(&id, Some(options)).try_collect().await?;
            Ok(chunks.into_iter().flat_map(|chunk| chunk.into_bytes()).collect())
        })
    }

    fn remove_container(&self, container_id: &str) -> EngineFuture<'_, ()> {
        let id = String::from(container_id);
        Box::pin(async move {
            let options = RemoveContainerOptionsBuilder::new()
                .force(true)
                .v(true)
                .build();
            self.docker.remove_container(&id, Some(options)).await
        })
    }

    fn create_network(
        &self,
        request: NetworkCreateRequest,
    ) -> EngineFuture<'_, NetworkCreateResponse> {
        Box::pin(async move { self.docker.create_network(request).await })
    }

    fn remove_network(&self, network: &str) -> EngineFuture<'_, ()> {
        let name = String::from(network);
        Box::pin(async move { self.docker.remove_network(&name).await })
    }

    fn build_image(
        &self,
        options: BuildImageOptions,
        context_archive: Vec<u8>,
    ) -> EngineFuture<'_, ()> {
        Box::pin(async move {
            let progress: Vec<_> = self
                .docker
                .build_image(options, None, Some(body_full(context_archive.into())))
                .try_collect()
                .await?;

            let failure = progress
                .into_iter()
                .filter_map(|info| info.error_detail)
                .find_map(|detail| detail.message);

            failure.map_or(Ok(()), |error| {
                Err(bollard::errors::Error::DockerStreamError { error })
            })
        })
    }
}
