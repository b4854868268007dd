//! In-memory resource store backing the mock appliance.
//!
//! # Design
//! Every object kind lives in its own arena keyed by the counter value that
//! was current when it was created, so listings come back in creation order.
//! The same counter feeds the object reference, which therefore is never
//! reused, even after a delete. A ref index maps each live ref to its arena
//! slot, which lets a single `delete` serve every resource type.
//!
//! IP allocations follow the same scheme, with a second index from address
//! to arena slot: a new allocation of an address replaces the previous one
//! (last write wins) and lists after everything allocated before it.
//!
//! The store itself does no locking. The server shares it as
//! [`SharedStore`], so every mutation goes through one write lock.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Store handle shared by the router and in-process transports.
pub type SharedStore = Arc<RwLock<Store>>;

/// Exact-match query filters, keyed by field name.
pub type Filters = HashMap<String, String>;

/// Object reference shaped `type/Z<n>:qualifier/default`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ref(String);

impl Ref {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource type the ref was issued for.
    pub fn object_type(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Ref {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Ref {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A stored object together with the ref it was assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    #[serde(rename = "_ref")]
    pub reference: Ref,
    #[serde(flatten)]
    pub object: T,
}

/// Field lookup used by exact-match filtering.
pub trait Filterable {
    /// `None` when `key` is not a field of this object kind; `Some(None)`
    /// when it is a field but unset.
    fn field(&self, key: &str) -> Option<Option<Cow<'_, str>>>;
}

impl<T: Filterable> Stored<T> {
    /// AND across all filters. Unknown keys constrain nothing.
    pub fn matches(&self, filters: &Filters) -> bool {
        filters.iter().all(|(key, expected)| {
            let actual = if key == "_ref" {
                Some(Some(Cow::Borrowed(self.reference.as_str())))
            } else {
                self.object.field(key)
            };
            match actual {
                None => true,
                Some(value) => value.as_deref() == Some(expected.as_str()),
            }
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    #[default]
    #[serde(rename = "A", alias = "a")]
    A,
    #[serde(rename = "AAAA", alias = "aaaa")]
    Aaaa,
    #[serde(rename = "CNAME", alias = "cname")]
    Cname,
    #[serde(rename = "PTR", alias = "ptr")]
    Ptr,
}

impl RecordType {
    pub fn object_type(&self) -> &'static str {
        match self {
            RecordType::A => "record:a",
            RecordType::Aaaa => "record:aaaa",
            RecordType::Cname => "record:cname",
            RecordType::Ptr => "record:ptr",
        }
    }

    /// Fields a create request must carry.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            RecordType::A => &["name", "ipv4addr"],
            RecordType::Aaaa => &["name", "ipv6addr"],
            RecordType::Cname => &["name", "canonical"],
            RecordType::Ptr => &["ptrdname", "ipv4addr"],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(default)]
    pub record_type: RecordType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ptrdname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl DnsRecord {
    fn qualifier(&self) -> &str {
        let target = match self.record_type {
            RecordType::Ptr => self.ptrdname.as_deref(),
            _ => self.name.as_deref(),
        };
        target.unwrap_or_default()
    }
}

impl Filterable for DnsRecord {
    fn field(&self, key: &str) -> Option<Option<Cow<'_, str>>> {
        let value = match key {
            "name" => self.name.as_deref(),
            "ipv4addr" => self.ipv4addr.as_deref(),
            "ipv6addr" => self.ipv6addr.as_deref(),
            "canonical" => self.canonical.as_deref(),
            "ptrdname" => self.ptrdname.as_deref(),
            "comment" => self.comment.as_deref(),
            "ttl" => return Some(self.ttl.map(|ttl| Cow::Owned(ttl.to_string()))),
            _ => return None,
        };
        Some(value.map(Cow::Borrowed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Filterable for Network {
    fn field(&self, key: &str) -> Option<Option<Cow<'_, str>>> {
        match key {
            "network" => Some(Some(Cow::Borrowed(&self.network))),
            "comment" => Some(self.comment.as_deref().map(Cow::Borrowed)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_ip: String,
    pub end_ip: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Filterable for Range {
    fn field(&self, key: &str) -> Option<Option<Cow<'_, str>>> {
        match key {
            "start_ip" => Some(Some(Cow::Borrowed(&self.start_ip))),
            "end_ip" => Some(Some(Cow::Borrowed(&self.end_ip))),
            "network" => Some(Some(Cow::Borrowed(&self.network))),
            "comment" => Some(self.comment.as_deref().map(Cow::Borrowed)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedAddress {
    pub ipv4addr: String,
    pub mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Filterable for FixedAddress {
    fn field(&self, key: &str) -> Option<Option<Cow<'_, str>>> {
        match key {
            "ipv4addr" => Some(Some(Cow::Borrowed(&self.ipv4addr))),
            "mac" => Some(Some(Cow::Borrowed(&self.mac))),
            "name" => Some(self.name.as_deref().map(Cow::Borrowed)),
            "comment" => Some(self.comment.as_deref().map(Cow::Borrowed)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IpStatus {
    Used,
    Available,
    Reserved,
}

impl IpStatus {
    fn as_str(&self) -> &'static str {
        match self {
            IpStatus::Used => "USED",
            IpStatus::Available => "AVAILABLE",
            IpStatus::Reserved => "RESERVED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub ipv4addr: String,
    pub network: String,
    pub status: IpStatus,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Filterable for Allocation {
    fn field(&self, key: &str) -> Option<Option<Cow<'_, str>>> {
        match key {
            "ip_address" | "ipv4addr" => Some(Some(Cow::Borrowed(&self.ipv4addr))),
            "network" => Some(Some(Cow::Borrowed(&self.network))),
            "status" => Some(Some(Cow::Borrowed(self.status.as_str()))),
            "comment" => Some(self.comment.as_deref().map(Cow::Borrowed)),
            _ => None,
        }
    }
}

/// Business rules the mock can be asked to enforce.
///
/// All off by default: the mock accepts anything that carries its required
/// fields and leaves these checks to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Reject a network that overlaps an existing one.
    pub reject_overlapping_networks: bool,
    /// Reject a fixed address whose MAC is already reserved.
    pub reject_duplicate_macs: bool,
    /// Reject ranges with start > end or outside their network, and
    /// allocations outside their network.
    pub enforce_address_bounds: bool,
}

impl ValidationPolicy {
    pub fn strict() -> Self {
        Self {
            reject_overlapping_networks: true,
            reject_duplicate_macs: true,
            enforce_address_bounds: true,
        }
    }
}

/// A create request refused by an enabled [`ValidationPolicy`] rule.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PolicyViolation(pub String);

#[derive(Debug, Clone)]
enum Slot {
    DnsRecord(u64),
    Network(u64),
    Range(u64),
    FixedAddress(u64),
    Allocation(u64),
}

#[derive(Debug, Default)]
pub struct Store {
    next_id: u64,
    policy: ValidationPolicy,
    dns_records: BTreeMap<u64, Stored<DnsRecord>>,
    networks: BTreeMap<u64, Stored<Network>>,
    ranges: BTreeMap<u64, Stored<Range>>,
    fixed_addresses: BTreeMap<u64, Stored<FixedAddress>>,
    allocations: BTreeMap<u64, Stored<Allocation>>,
    allocation_ids: HashMap<String, u64>,
    index: HashMap<Ref, Slot>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ValidationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Number of live objects of every kind.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    fn issue_ref(&mut self, object_type: &str, qualifier: &str) -> (u64, Ref) {
        self.next_id += 1;
        let id = self.next_id;
        (id, Ref(format!("{object_type}/Z{id}:{qualifier}/default")))
    }

    pub fn add_dns_record(&mut self, record: DnsRecord) -> Stored<DnsRecord> {
        let (id, reference) = self.issue_ref(record.record_type.object_type(), record.qualifier());
        let stored = Stored {
            reference: reference.clone(),
            object: record,
        };
        self.index.insert(reference, Slot::DnsRecord(id));
        self.dns_records.insert(id, stored.clone());
        debug!(reference = %stored.reference, "stored DNS record");
        stored
    }

    /// Records of `record_type` matching every filter.
    pub fn dns_records(&self, record_type: RecordType, filters: &Filters) -> Vec<Stored<DnsRecord>> {
        self.dns_records
            .values()
            .filter(|stored| stored.object.record_type == record_type && stored.matches(filters))
            .cloned()
            .collect()
    }

    pub fn add_network(&mut self, network: Network) -> Result<Stored<Network>, PolicyViolation> {
        if self.policy.reject_overlapping_networks {
            if let Ok(candidate) = network.network.parse::<Ipv4Net>() {
                let clash = self.networks.values().find(|existing| {
                    existing
                        .object
                        .network
                        .parse::<Ipv4Net>()
                        .map(|net| overlaps(net, candidate))
                        .unwrap_or(false)
                });
                if let Some(existing) = clash {
                    return Err(violation(format!(
                        "network {} overlaps existing network {}",
                        network.network, existing.object.network
                    )));
                }
            }
        }

        let (id, reference) = self.issue_ref("network", &network.network);
        let stored = Stored {
            reference: reference.clone(),
            object: network,
        };
        self.index.insert(reference, Slot::Network(id));
        self.networks.insert(id, stored.clone());
        Ok(stored)
    }

    pub fn networks(&self, filters: &Filters) -> Vec<Stored<Network>> {
        select(&self.networks, filters)
    }

    pub fn add_range(&mut self, range: Range) -> Result<Stored<Range>, PolicyViolation> {
        if self.policy.enforce_address_bounds {
            check_range_bounds(&range)?;
        }

        let qualifier = format!("{}-{}", range.start_ip, range.end_ip);
        let (id, reference) = self.issue_ref("range", &qualifier);
        let stored = Stored {
            reference: reference.clone(),
            object: range,
        };
        self.index.insert(reference, Slot::Range(id));
        self.ranges.insert(id, stored.clone());
        Ok(stored)
    }

    pub fn ranges(&self, filters: &Filters) -> Vec<Stored<Range>> {
        select(&self.ranges, filters)
    }

    pub fn add_fixed_address(
        &mut self,
        fixed: FixedAddress,
    ) -> Result<Stored<FixedAddress>, PolicyViolation> {
        if self.policy.reject_duplicate_macs
            && self
                .fixed_addresses
                .values()
                .any(|existing| existing.object.mac.eq_ignore_ascii_case(&fixed.mac))
        {
            return Err(violation(format!("MAC {} already has a reservation", fixed.mac)));
        }

        let (id, reference) = self.issue_ref("fixedaddress", &fixed.ipv4addr);
        let stored = Stored {
            reference: reference.clone(),
            object: fixed,
        };
        self.index.insert(reference, Slot::FixedAddress(id));
        self.fixed_addresses.insert(id, stored.clone());
        Ok(stored)
    }

    pub fn fixed_addresses(&self, filters: &Filters) -> Vec<Stored<FixedAddress>> {
        select(&self.fixed_addresses, filters)
    }

    /// First usable host of `network` that is unallocated or AVAILABLE.
    ///
    /// Hosts are scanned in ascending order, skipping the network and
    /// broadcast addresses. An unparsable CIDR or a full network yields
    /// `None`. Read-only, so repeated calls agree until something is
    /// allocated.
    pub fn next_available_ip(&self, network: &str) -> Option<Ipv4Addr> {
        let net = network.parse::<Ipv4Net>().ok()?.trunc();
        net.hosts()
            .find(|host| match self.ip_status(&host.to_string()) {
                None => true,
                Some(existing) => existing.object.status == IpStatus::Available,
            })
    }

    /// Mark `ip` USED in `network`, replacing any earlier allocation of it.
    pub fn allocate_ip(
        &mut self,
        network: &str,
        ip: &str,
        names: Vec<String>,
        comment: Option<String>,
    ) -> Result<Stored<Allocation>, PolicyViolation> {
        if self.policy.enforce_address_bounds {
            check_inside(ip, network)?;
        }

        if let Some(previous) = self.allocation_ids.remove(ip) {
            if let Some(stored) = self.allocations.remove(&previous) {
                self.index.remove(&stored.reference);
            }
        }

        let (id, reference) = self.issue_ref("ipv4address", ip);
        let stored = Stored {
            reference: reference.clone(),
            object: Allocation {
                ipv4addr: ip.to_string(),
                network: network.to_string(),
                status: IpStatus::Used,
                names,
                comment,
            },
        };
        self.index.insert(reference, Slot::Allocation(id));
        self.allocation_ids.insert(ip.to_string(), id);
        self.allocations.insert(id, stored.clone());
        debug!(ip, network, "allocated IP");
        Ok(stored)
    }

    pub fn ip_status(&self, ip: &str) -> Option<&Stored<Allocation>> {
        self.allocation_ids
            .get(ip)
            .and_then(|id| self.allocations.get(id))
    }

    pub fn allocations(&self, filters: &Filters) -> Vec<Stored<Allocation>> {
        select(&self.allocations, filters)
    }

    /// Remove the allocation of `ip`; `false` if it has none.
    pub fn release_ip(&mut self, ip: &str) -> bool {
        match self.ip_status(ip).map(|stored| stored.reference.clone()) {
            Some(reference) => self.delete(&reference),
            None => false,
        }
    }

    /// Remove whatever object `reference` names. `false` if it is unknown.
    pub fn delete(&mut self, reference: &Ref) -> bool {
        let Some(slot) = self.index.remove(reference) else {
            return false;
        };
        let removed = match slot {
            Slot::DnsRecord(id) => self.dns_records.remove(&id).is_some(),
            Slot::Network(id) => self.networks.remove(&id).is_some(),
            Slot::Range(id) => self.ranges.remove(&id).is_some(),
            Slot::FixedAddress(id) => self.fixed_addresses.remove(&id).is_some(),
            Slot::Allocation(id) => match self.allocations.remove(&id) {
                Some(stored) => {
                    self.allocation_ids.remove(&stored.object.ipv4addr);
                    true
                }
                None => false,
            },
        };
        if !removed {
            warn!(reference = %reference, "ref index pointed at a missing object");
        }
        removed
    }
}

fn select<T: Filterable + Clone>(arena: &BTreeMap<u64, Stored<T>>, filters: &Filters) -> Vec<Stored<T>> {
    arena
        .values()
        .filter(|stored| stored.matches(filters))
        .cloned()
        .collect()
}

fn violation(msg: String) -> PolicyViolation {
    warn!(%msg, "rejected by validation policy");
    PolicyViolation(msg)
}

fn overlaps(a: Ipv4Net, b: Ipv4Net) -> bool {
    a.contains(&b.network()) || b.contains(&a.network())
}

fn parse_net(network: &str) -> Result<Ipv4Net, PolicyViolation> {
    network
        .parse::<Ipv4Net>()
        .map(|net| net.trunc())
        .map_err(|_| violation(format!("invalid network {network}")))
}

fn parse_ip(ip: &str) -> Result<Ipv4Addr, PolicyViolation> {
    ip.parse()
        .map_err(|_| violation(format!("invalid IPv4 address {ip}")))
}

fn check_inside(ip: &str, network: &str) -> Result<(), PolicyViolation> {
    let net = parse_net(network)?;
    let addr = parse_ip(ip)?;
    if !net.contains(&addr) {
        return Err(violation(format!("{ip} is outside network {network}")));
    }
    Ok(())
}

fn check_range_bounds(range: &Range) -> Result<(), PolicyViolation> {
    let start = parse_ip(&range.start_ip)?;
    let end = parse_ip(&range.end_ip)?;
    if start > end {
        return Err(violation(format!(
            "range start {} is after end {}",
            range.start_ip, range.end_ip
        )));
    }
    check_inside(&range.start_ip, &range.network)?;
    check_inside(&range.end_ip, &range.network)
}
