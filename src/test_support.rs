//! Shared mock engine and helpers for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bollard::models::{
    ContainerCreateBody, ContainerCreateResponse, ContainerInspectResponse, NetworkCreateRequest,
    NetworkCreateResponse, NetworkSettings, PortBinding,
};
use bollard::query_parameters::{
    BuildImageOptions, CreateContainerOptions, UploadToContainerOptions,
};
use mockall::mock;

use crate::engine::{ContainerEngine, EngineFuture};

mock! {
    #[derive(Debug)]
    pub Engine {}

    impl ContainerEngine for Engine {
        fn host(&self) -> String;

        fn create_container(
            &self,
            options: Option<CreateContainerOptions>,
            body: ContainerCreateBody,
        ) -> EngineFuture<'_, ContainerCreateResponse>;

        fn start_container(&self, container_id: &str) -> EngineFuture<'_, ()>;

        fn upload_to_container(
            &self,
            container_id: &str,
            options: Option<UploadToContainerOptions>,
            archive_bytes: Vec<u8>,
        ) -> EngineFuture<'_, ()>;

        fn inspect_container(&self, container_id: &str) -> EngineFuture<'_, ContainerInspectResponse>;

        fn container_logs(&self, container_id: &str) -> EngineFuture<'_, Vec<u8>>;

        fn remove_container(&self, container_id: &str) -> EngineFuture<'_, ()>;

        fn create_network(
            &self,
            request: NetworkCreateRequest,
        ) -> EngineFuture<'_, NetworkCreateResponse>;

        fn remove_network(&self, network: &str) -> EngineFuture<'_, ()>;

        fn build_image(
            &self,
            options: BuildImageOptions,
            context_archive: Vec<u8>,
        ) -> EngineFuture<'_, ()>;
    }
}

/// Ordered record of engine calls, shared between a mock and its test.
pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn call_log() -> CallLog {
    Arc::new(Mutex::new(vec![]))
}

pub(crate) fn record(log: &CallLog, call: impl Into<String>) {
    log.lock().expect("call log lock should succeed").push(call.into());
}

pub(crate) fn calls(log: &CallLog) -> Vec<String> {
    log.lock().expect("call log lock should succeed").clone()
}

pub(crate) fn engine_error(message: &str) -> bollard::errors::Error {
    bollard::errors::Error::DockerResponseServerError {
        status_code: 500,
        message: String::from(message),
    }
}

/// Inspect response publishing each `(container_port, host_port)` pair on
/// `0.0.0.0`.
pub(crate) fn inspect_with_ports(bindings: &[(&str, &str)]) -> ContainerInspectResponse {
    let ports: HashMap<String, Option<Vec<PortBinding>>> = bindings
        .iter()
        .map(|(container_port, host_port)| {
            (
                String::from(*container_port),
                Some(vec![PortBinding {
                    host_ip: Some(String::from("0.0.0.0")),
                    host_port: Some(String::from(*host_port)),
                }]),
            )
        })
        .collect();

    ContainerInspectResponse {
        network_settings: Some(NetworkSettings {
            ports: Some(ports),
            ..NetworkSettings::default()
        }),
        ..ContainerInspectResponse::default()
    }
}

/// Mock engine that accepts every container lifecycle call, records it in
/// `log`, and publishes `bindings` on inspect.
pub(crate) fn lifecycle_engine(
    log: &CallLog,
    container_id: &str,
    bindings: &[(&str, &str)],
) -> MockEngine {
    let mut engine = MockEngine::new();
    let id = String::from(container_id);
    let inspect = inspect_with_ports(bindings);

    engine.expect_host().return_const(String::from("127.0.0.1"));

    let create_log = Arc::clone(log);
    engine
        .expect_create_container()
        .returning(move |_, _| {
            record(&create_log, "create");
            let response = ContainerCreateResponse {
                id: id.clone(),
                warnings: vec![],
            };
            Box::pin(async move { Ok(response) })
        });

    let upload_log = Arc::clone(log);
    engine
        .expect_upload_to_container()
        .returning(move |container_id, _, _| {
            record(&upload_log, format!("upload {container_id}"));
            Box::pin(async { Ok(()) })
        });

    let start_log = Arc::clone(log);
    engine.expect_start_container().returning(move |container_id| {
        record(&start_log, format!("start {container_id}"));
        Box::pin(async { Ok(()) })
    });

    let inspect_log = Arc::clone(log);
    engine
        .expect_inspect_container()
        .returning(move |container_id| {
            record(&inspect_log, format!("inspect {container_id}"));
            let response = inspect.clone();
            Box::pin(async move { Ok(response) })
        });

    let remove_log = Arc::clone(log);
    engine
        .expect_remove_container()
        .returning(move |container_id| {
            record(&remove_log, format!("remove {container_id}"));
            Box::pin(async { Ok(()) })
        });

    engine
}

pub(crate) fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
