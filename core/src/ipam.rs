//! IP address management: networks, next-available lookups, allocations.
//!
//! Requesting the next available address and allocating it are separate
//! calls. The lookup is only a hint; nothing is reserved until
//! [`IpamManager::allocate_ip`] commits it, and another caller may take the
//! same address in between.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{filters, WapiClient};
use crate::error::Result;
use crate::types::{IpAllocation, IpStatus, IpamNetwork, ObjectRef};

const NETWORK: &str = "network";
const IPV4_ADDRESS: &str = "ipv4address";
const REQUEST: &str = "request";

#[derive(Serialize)]
struct NextAvailableRequest<'a> {
    network: &'a str,
}

#[derive(Deserialize)]
struct NextAvailableResponse {
    ipv4addr: String,
}

#[derive(Serialize)]
struct AllocateRequest<'a> {
    ip_address: &'a str,
    network: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    names: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct IpamManager {
    client: WapiClient,
}

impl IpamManager {
    pub fn new(client: WapiClient) -> Self {
        Self { client }
    }

    pub fn create_network(&self, network: &str, comment: Option<&str>) -> Result<IpamNetwork> {
        info!(network, "creating IPAM network");
        let sent = IpamNetwork {
            reference: None,
            network: network.to_string(),
            comment: comment.map(str::to_string),
        };
        self.client.post(NETWORK, &sent)?.merge_into(&sent)
    }

    pub fn get_networks(&self, network: Option<&str>) -> Result<Vec<IpamNetwork>> {
        self.client
            .get(NETWORK, &filters(&[("network", network)]))?
            .into_typed()
    }

    pub fn list_all_networks(&self) -> Result<Vec<IpamNetwork>> {
        self.get_networks(None)
    }

    pub fn delete_network(&self, reference: &ObjectRef) -> Result<bool> {
        info!(reference = %reference, "deleting IPAM network");
        self.client.delete_ref(reference)
    }

    /// Lowest free host address in `network`, or `None` once it is full.
    ///
    /// Does not allocate; repeated calls return the same address until it
    /// is taken.
    pub fn get_next_available_ip(&self, network: &str) -> Result<Option<String>> {
        info!(network, "requesting next available IP");
        match self.client.post(REQUEST, &NextAvailableRequest { network }) {
            Ok(payload) => Ok(payload
                .into_first::<NextAvailableResponse>()?
                .map(|next| next.ipv4addr)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Record `ip` as used inside `network`.
    pub fn allocate_ip(
        &self,
        network: &str,
        ip: &str,
        name: Option<&str>,
        comment: Option<&str>,
    ) -> Result<IpAllocation> {
        info!(ip, network, "allocating IP");
        let body = AllocateRequest {
            ip_address: ip,
            network,
            names: name.into_iter().collect(),
            comment,
        };
        let expected = IpAllocation {
            reference: None,
            ipv4addr: ip.to_string(),
            network: network.to_string(),
            status: IpStatus::Used,
            names: name.map(str::to_string).into_iter().collect(),
            comment: comment.map(str::to_string),
        };
        self.client.post(IPV4_ADDRESS, &body)?.merge_into(&expected)
    }

    /// Current allocation of `ip`, or `None` if it has none.
    pub fn get_ip_status(&self, ip: &str) -> Result<Option<IpAllocation>> {
        match self.client.get(IPV4_ADDRESS, &filters(&[("ip_address", Some(ip))])) {
            Ok(payload) => payload.into_first(),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Drop the allocation of `ip` so the address becomes available again.
    ///
    /// Returns `false` without touching anything when `ip` has no
    /// allocation.
    pub fn release_ip(&self, ip: &str) -> Result<bool> {
        info!(ip, "releasing IP");
        match self.get_ip_status(ip)? {
            Some(IpAllocation {
                reference: Some(reference),
                ..
            }) => self.client.delete_ref(&reference),
            _ => Ok(false),
        }
    }
}
