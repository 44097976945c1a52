//! Container engine boundary.
//!
//! The rest of the crate depends only on the [`ContainerEngine`] trait.
//! [`DockerEngine`] implements it over `bollard`, reaching whichever endpoint
//! [`EngineConnector`] resolves:
//!
//! 1. Explicit configuration (`--engine-socket`, `engine_socket` in TOML, or
//!    `SCENARIOPOD_ENGINE_SOCKET`)
//! 2. `DOCKER_HOST`
//! 3. `CONTAINER_HOST`
//! 4. `PODMAN_HOST`
//! 5. Platform default (`/var/run/docker.sock` on Unix)

mod archive;
mod client;
mod connection;

pub use archive::{
    EXECUTABLE_MODE, FILE_MODE, FilePayload, build_context_archive, payload_archive,
};
pub use client::{ContainerEngine, DockerEngine, EngineFuture};
pub use connection::{EngineConnector, SocketResolver};
