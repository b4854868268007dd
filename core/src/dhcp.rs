//! DHCP networks, ranges and fixed-address reservations.

use tracing::info;

use crate::client::{filters, WapiClient};
use crate::error::Result;
use crate::types::{DhcpNetwork, DhcpRange, DhcpReservation, ObjectRef};

const NETWORK: &str = "network";
const RANGE: &str = "range";
const FIXED_ADDRESS: &str = "fixedaddress";

#[derive(Debug, Clone)]
pub struct DhcpManager {
    client: WapiClient,
}

impl DhcpManager {
    pub fn new(client: WapiClient) -> Self {
        Self { client }
    }

    pub fn create_network(&self, network: &str, comment: Option<&str>) -> Result<DhcpNetwork> {
        info!(network, "creating DHCP network");
        let sent = DhcpNetwork {
            reference: None,
            network: network.to_string(),
            comment: comment.map(str::to_string),
        };
        self.client.post(NETWORK, &sent)?.merge_into(&sent)
    }

    pub fn get_networks(&self, network: Option<&str>) -> Result<Vec<DhcpNetwork>> {
        self.client
            .get(NETWORK, &filters(&[("network", network)]))?
            .into_typed()
    }

    pub fn delete_network(&self, reference: &ObjectRef) -> Result<bool> {
        info!(reference = %reference, "deleting DHCP network");
        self.client.delete_ref(reference)
    }

    /// Create a pool from `start_ip` to `end_ip` inside `network`.
    ///
    /// Bounds are checked by the appliance, not here.
    pub fn create_range(
        &self,
        start_ip: &str,
        end_ip: &str,
        network: &str,
        comment: Option<&str>,
    ) -> Result<DhcpRange> {
        info!(start_ip, end_ip, network, "creating DHCP range");
        let sent = DhcpRange {
            reference: None,
            start_ip: start_ip.to_string(),
            end_ip: end_ip.to_string(),
            network: network.to_string(),
            comment: comment.map(str::to_string),
        };
        self.client.post(RANGE, &sent)?.merge_into(&sent)
    }

    pub fn get_ranges(&self, network: Option<&str>) -> Result<Vec<DhcpRange>> {
        self.client
            .get(RANGE, &filters(&[("network", network)]))?
            .into_typed()
    }

    pub fn delete_range(&self, reference: &ObjectRef) -> Result<bool> {
        info!(reference = %reference, "deleting DHCP range");
        self.client.delete_ref(reference)
    }

    /// Bind `mac` to `ipv4addr` with a fixed address.
    pub fn create_reservation(
        &self,
        ipv4addr: &str,
        mac: &str,
        name: Option<&str>,
        comment: Option<&str>,
    ) -> Result<DhcpReservation> {
        info!(ipv4addr, mac, "creating DHCP reservation");
        let sent = DhcpReservation {
            reference: None,
            ipv4addr: ipv4addr.to_string(),
            mac: mac.to_string(),
            name: name.map(str::to_string),
            comment: comment.map(str::to_string),
        };
        self.client.post(FIXED_ADDRESS, &sent)?.merge_into(&sent)
    }

    pub fn get_reservations(
        &self,
        ipv4addr: Option<&str>,
        mac: Option<&str>,
    ) -> Result<Vec<DhcpReservation>> {
        self.client
            .get(FIXED_ADDRESS, &filters(&[("ipv4addr", ipv4addr), ("mac", mac)]))?
            .into_typed()
    }

    pub fn delete_reservation(&self, reference: &ObjectRef) -> Result<bool> {
        info!(reference = %reference, "deleting DHCP reservation");
        self.client.delete_ref(reference)
    }
}
