//! Blocking client for a WAPI-speaking DDI appliance.
//!
//! # Overview
//! [`WapiClient`] is the only component that performs requests. It builds
//! plain-data `HttpRequest` values, hands them to a [`Transport`] and maps the
//! resulting `HttpResponse` to a [`Payload`] or an [`Error`]. The DNS, DHCP
//! and IPAM managers sit on top and convert payloads into typed domain
//! objects.
//!
//! # Design
//! - The transport is a trait object, so the same client drives a real
//!   appliance ([`HttpTransport`]) or the mock server in-process.
//! - Retry and error classification live in one loop inside `WapiClient`;
//!   managers only shape requests and unmarshal responses.
//! - Domain types are defined independently from the mock-server crate;
//!   integration tests catch schema drift.

pub mod client;
pub mod config;
pub mod dhcp;
pub mod dns;
pub mod error;
pub mod http;
pub mod ipam;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::{Payload, WapiClient};
pub use config::ClientConfig;
pub use dhcp::DhcpManager;
pub use dns::DnsManager;
pub use error::{Error, Result, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use ipam::IpamManager;
pub use transport::{HttpTransport, Transport};
pub use types::{
    DhcpNetwork, DhcpRange, DhcpReservation, DnsRecord, IpAllocation, IpStatus, IpamNetwork,
    ObjectRef, RecordData, RecordType, WireDnsRecord,
};
