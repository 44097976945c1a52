//! Unit tests for container definitions, ports, and the build flow.


use rstest::rstest;

use super::*;
use crate::error::{ConfigError, HarnessError};

#[rstest]
#[case("5432", ContainerPort::tcp(5432))]
#[case("5432/tcp", ContainerPort::tcp(5432))]
#[case("53/udp", ContainerPort::udp(53))]
#[case(" 8080 ", ContainerPort::tcp(8080))]
fn ports_parse_from_engine_notation(#[case] text: &str, #[case] expected: ContainerPort) {
    assert_eq!(text.parse::<ContainerPort>().ok(), Some(expected));
}

#[rstest]
#[case("postgres")]
#[case("5432/sctp")]
#[case("70000")]
#[case("0")]
#[case("")]
fn invalid_ports_are_rejected(#[case] text: &str) {
    assert!(matches!(
        text.parse::<ContainerPort>(),
        Err(ConfigError::InvalidValue { ref field, .. }) if field == "port"
    ));
}

#[rstest]
#[case(ContainerPort::tcp(5432), "5432/tcp")]
#[case(ContainerPort::udp(53), "53/udp")]
fn ports_render_in_engine_notation(#[case] port: ContainerPort, #[case] expected: &str) {
    assert_eq!(port.to_string(), expected);
}

#[rstest]
fn live_container_derives_both_address_modes() -> Result<(), HarnessError> {
    let live = LiveContainer::new(
        "c-1",
        "127.0.0.1",
        [(ContainerPort::tcp(5432), 54321)].into_iter().collect(),
        Some(String::from("db-net")),
    );

    let external = live.endpoint(5432_u16, crate::network::AddressMode::External)?;
    let internal = live.endpoint(5432_u16, crate::network::AddressMode::Internal)?;

    assert_eq!(external.to_string(), "host=127.0.0.1 port=54321");
    assert_eq!(internal.to_string(), "host=db-net port=5432");
    Ok(())
}

#[rstest]
fn internal_address_requires_a_network() {
    let live = LiveContainer::new(
        "c-1",
        "127.0.0.1",
        [(ContainerPort::tcp(6379), 50000)].into_iter().collect(),
        None,
    );

    assert!(matches!(
        live.endpoint(6379_u16, crate::network::AddressMode::Internal),
        Err(HarnessError::Config(ConfigError::MissingRequired { ref field })) if field == "network"
    ));
}

#[rstest]
fn undeclared_ports_are_not_mapped() {
    let live = LiveContainer::new("c-1", "localhost", std::collections::BTreeMap::new(), None);
    assert!(matches!(
        live.mapped_port(9000_u16),
        Err(HarnessError::Provisioning(crate::error::ProvisioningError::PortNotMapped { ref port, .. }))
            if port == "9000/tcp"
    ));
}
