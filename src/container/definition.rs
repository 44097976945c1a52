//! Option recording and validation for container definitions.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;

use super::{ContainerPort, ImageSource};
use crate::engine::{EXECUTABLE_MODE, FILE_MODE, FilePayload};
use crate::error::{ConfigError, FilesystemError, HarnessError};
use crate::network::NetworkDefinition;
use crate::readiness::ReadinessPolicy;

#[derive(Debug, Clone)]
enum FileRequest {
    Host {
        option: &'static str,
        base_path: Utf8PathBuf,
        sources: Vec<Utf8PathBuf>,
        mode: u32,
    },
    Payloads(Vec<FilePayload>),
}

#[derive(Debug, Clone)]
enum ReadinessRequest {
    Log { pattern: String, timeout: Duration },
    Port { port: String, timeout: Duration },
}

/// Records container options. Each setter overwrites whatever an earlier
/// setter stored in the same field.
///
/// Shared fields: `with_image` and `with_build_context` set the image source;
/// `with_files`, `with_executable_files`, and `with_file_payloads` set the
/// injected files; `with_wait_for_log` and `with_wait_for_port` set the
/// readiness policy. `with_fixed_delay` has its own field and runs after
/// that policy succeeds.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ContainerDefinitionBuilder {
    image: Option<ImageSource>,
    exposed_ports: Vec<String>,
    env: BTreeMap<String, String>,
    network: Option<Arc<NetworkDefinition>>,
    files: Option<FileRequest>,
    readiness: Option<ReadinessRequest>,
    post_start_delay: Option<Duration>,
    name: Option<String>,
    cmd: Option<Vec<String>>,
}

impl ContainerDefinitionBuilder {
    /// Run a registry image.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(ImageSource::Image(image.into()));
        self
    }

    /// Build the image from a host directory containing a `Dockerfile`.
    pub fn with_build_context(mut self, context: impl Into<Utf8PathBuf>) -> Self {
        self.image = Some(ImageSource::BuildContext(context.into()));
        self
    }

    /// Declare ports to publish on random host ports.
    pub fn with_exposed_ports<I, S>(mut self, ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exposed_ports = ports.into_iter().map(Into::into).collect();
        self
    }

    /// Set environment variables. Within one call a repeated key keeps its
    /// last value.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    /// Attach to `network` under its alias. The network is built first if
    /// needed.
    pub fn with_network(mut self, network: Arc<NetworkDefinition>) -> Self {
        self.network = Some(network);
        self
    }

    /// Copy host files to `base_path/<file name>` with mode `0o644`.
    pub fn with_files<I, P>(mut self, base_path: impl Into<Utf8PathBuf>, sources: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.files = Some(FileRequest::Host {
            option: "with_files",
            base_path: base_path.into(),
            sources: sources.into_iter().map(Into::into).collect(),
            mode: FILE_MODE,
        });
        self
    }

    /// Copy host files to `base_path/<file name>` with mode `0o755`.
    pub fn with_executable_files<I, P>(
        mut self,
        base_path: impl Into<Utf8PathBuf>,
        sources: I,
    ) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Utf8PathBuf>,
    {
        self.files = Some(FileRequest::Host {
            option: "with_executable_files",
            base_path: base_path.into(),
            sources: sources.into_iter().map(Into::into).collect(),
            mode: EXECUTABLE_MODE,
        });
        self
    }

    /// Inject in-memory payloads.
    pub fn with_file_payloads(mut self, payloads: impl IntoIterator<Item = FilePayload>) -> Self {
        self.files = Some(FileRequest::Payloads(payloads.into_iter().collect()));
        self
    }

    /// Ready once the container output contains `pattern`.
    pub fn with_wait_for_log(mut self, pattern: impl Into<String>, timeout: Duration) -> Self {
        self.readiness = Some(ReadinessRequest::Log {
            pattern: pattern.into(),
            timeout,
        });
        self
    }

    /// Ready once `port` accepts TCP connections on its mapped host port.
    pub fn with_wait_for_port(mut self, port: impl Into<String>, timeout: Duration) -> Self {
        self.readiness = Some(ReadinessRequest::Port {
            port: port.into(),
            timeout,
        });
        self
    }

    /// Sleep `delay` after start, once any log or port wait has succeeded.
    ///
    /// Independent of `with_wait_for_log` and `with_wait_for_port`.
    pub fn with_fixed_delay(mut self, delay: Duration) -> Self {
        self.post_start_delay = Some(delay);
        self
    }

    /// Name the container instead of letting the engine pick one.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Override the image command.
    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = Some(cmd.into_iter().map(Into::into).collect());
        self
    }

    /// Validate the recorded options.
    ///
    /// No engine call is made. Host files named by `with_files` or
    /// `with_executable_files` are read here.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingRequired` (`image`) when no image source is set
    ///   or the image reference is blank.
    /// - `ConfigError::EmptyFileList` when a file option received no files.
    /// - `ConfigError::InvalidValue` (`port`) for an unparseable port.
    /// - `FilesystemError` when a host file cannot be read.
    pub fn finish(self) -> Result<ContainerDefinition, HarnessError> {
        let image = match self.image {
            Some(ImageSource::Image(reference)) if reference.trim().is_empty() => {
                return Err(missing_image());
            }
            Some(source) => source,
            None => return Err(missing_image()),
        };

        let files = match self.files {
            None => vec![],
            Some(request) => load_files(request)?,
        };

        let mut exposed_ports = self
            .exposed_ports
            .iter()
            .map(|port| port.parse::<ContainerPort>())
            .collect::<Result<Vec<_>, _>>()?;

        let readiness = match self.readiness {
            None => None,
            Some(ReadinessRequest::Log { pattern, timeout }) => {
                Some(ReadinessPolicy::LogPattern { pattern, timeout })
            }
            Some(ReadinessRequest::Port { port, timeout }) => {
                let parsed = port.parse::<ContainerPort>()?;
                if !exposed_ports.contains(&parsed) {
                    exposed_ports.push(parsed);
                }
                Some(ReadinessPolicy::PortListening {
                    port: parsed,
                    timeout,
                })
            }
        };
        exposed_ports.sort_unstable();
        exposed_ports.dedup();

        Ok(ContainerDefinition {
            image,
            exposed_ports,
            env: self.env,
            network: self.network,
            files,
            readiness,
            post_start_delay: self.post_start_delay.filter(|delay| !delay.is_zero()),
            name: self.name.filter(|name| !name.trim().is_empty()),
            cmd: self.cmd,
        })
    }
}

fn missing_image() -> HarnessError {
    HarnessError::from(ConfigError::MissingRequired {
        field: String::from("image"),
    })
}

fn load_files(request: FileRequest) -> Result<Vec<FilePayload>, HarnessError> {
    match request {
        FileRequest::Payloads(payloads) if payloads.is_empty() => {
            Err(ConfigError::EmptyFileList {
                option: "with_file_payloads",
            }
            .into())
        }
        FileRequest::Payloads(payloads) => Ok(payloads),
        FileRequest::Host { option, sources, .. } if sources.is_empty() => {
            Err(ConfigError::EmptyFileList { option }.into())
        }
        FileRequest::Host {
            base_path,
            sources,
            mode,
            ..
        } => sources
            .iter()
            .map(|source| read_host_file(&base_path, source, mode))
            .collect(),
    }
}

fn read_host_file(
    base_path: &Utf8Path,
    source: &Utf8Path,
    mode: u32,
) -> Result<FilePayload, HarnessError> {
    let file_name = source.file_name().ok_or_else(|| ConfigError::InvalidValue {
        field: String::from("files"),
        reason: format!("'{source}' does not name a file"),
    })?;
    let parent = source
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));

    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|e| FilesystemError::from_io(source.as_std_path(), &e))?;
    let contents = dir
        .read(file_name)
        .map_err(|e| FilesystemError::from_io(source.as_std_path(), &e))?;

    Ok(FilePayload::new(base_path.join(file_name), mode, contents))
}

/// A validated, immutable container description.
#[derive(Debug, Clone)]
pub struct ContainerDefinition {
    pub(super) image: ImageSource,
    pub(super) exposed_ports: Vec<ContainerPort>,
    pub(super) env: BTreeMap<String, String>,
    pub(super) network: Option<Arc<NetworkDefinition>>,
    pub(super) files: Vec<FilePayload>,
    pub(super) readiness: Option<ReadinessPolicy>,
    pub(super) post_start_delay: Option<Duration>,
    pub(super) name: Option<String>,
    pub(super) cmd: Option<Vec<String>>,
}

impl ContainerDefinition {
    /// Start recording options.
    pub fn builder() -> ContainerDefinitionBuilder {
        ContainerDefinitionBuilder::default()
    }

    /// The image source.
    #[must_use]
    pub const fn image(&self) -> &ImageSource {
        &self.image
    }

    /// Declared ports, sorted.
    #[must_use]
    pub fn exposed_ports(&self) -> &[ContainerPort] {
        &self.exposed_ports
    }

    /// Environment variables.
    #[must_use]
    pub const fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// The attached network, if any.
    #[must_use]
    pub fn network(&self) -> Option<&Arc<NetworkDefinition>> {
        self.network.as_ref()
    }

    /// Files injected before start.
    #[must_use]
    pub fn files(&self) -> &[FilePayload] {
        &self.files
    }

    /// The readiness policy, if any.
    #[must_use]
    pub const fn readiness(&self) -> Option<&ReadinessPolicy> {
        self.readiness.as_ref()
    }

    /// The fixed sleep applied after readiness, if any.
    #[must_use]
    pub const fn post_start_delay(&self) -> Option<Duration> {
        self.post_start_delay
    }

    /// The requested container name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The command override.
    #[must_use]
    pub fn cmd(&self) -> Option<&[String]> {
        self.cmd.as_deref()
    }
}
