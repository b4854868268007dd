//! Domain objects for the DNS, DHCP and IPAM resource families.
//!
//! # Design
//! These types mirror the appliance's wire schema but are defined
//! independently of the mock-server crate; the integration tests catch any
//! drift between the two. Optional wire fields are `Option` and are omitted
//! from request bodies when unset. DNS records are the exception: the wire
//! shape is flat, while [`DnsRecord`] carries its target in [`RecordData`] so
//! exactly one target exists and it always matches the record type.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Opaque, self-describing object reference assigned by the appliance.
///
/// Shaped `type/opaque-id:qualifier/scope`, e.g.
/// `record:a/Z1:web.example.com/default`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRef(String);

impl ObjectRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource type embedded in the reference (`record:a`, `network`, ...).
    pub fn object_type(&self) -> &str {
        self.0.split('/').next().unwrap_or_default()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ObjectRef {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// DNS record types served by the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Ptr,
}

impl RecordType {
    /// WAPI resource path for this record type.
    pub fn endpoint(&self) -> &'static str {
        match self {
            RecordType::A => "record:a",
            RecordType::Aaaa => "record:aaaa",
            RecordType::Cname => "record:cname",
            RecordType::Ptr => "record:ptr",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Ptr => "PTR",
        };
        f.write_str(name)
    }
}

/// Type-specific payload of a DNS record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A { ipv4addr: String },
    Aaaa { ipv6addr: String },
    Cname { canonical: String },
    /// Reverse mapping from `ipv4addr` to `ptrdname`.
    Ptr { ipv4addr: String, ptrdname: String },
}

impl RecordData {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordData::A { .. } => RecordType::A,
            RecordData::Aaaa { .. } => RecordType::Aaaa,
            RecordData::Cname { .. } => RecordType::Cname,
            RecordData::Ptr { .. } => RecordType::Ptr,
        }
    }

    /// Address, canonical name or PTR domain name, depending on the type.
    pub fn target(&self) -> &str {
        match self {
            RecordData::A { ipv4addr } => ipv4addr,
            RecordData::Aaaa { ipv6addr } => ipv6addr,
            RecordData::Cname { canonical } => canonical,
            RecordData::Ptr { ptrdname, .. } => ptrdname,
        }
    }
}

/// A DNS record of any supported type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Owner name. PTR records are addressed by their IP and may omit it.
    pub name: Option<String>,
    pub data: RecordData,
    pub comment: Option<String>,
    pub ttl: Option<u32>,
    pub reference: Option<ObjectRef>,
}

impl DnsRecord {
    pub fn new(name: Option<String>, data: RecordData) -> Self {
        Self {
            name,
            data,
            comment: None,
            ttl: None,
            reference: None,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }

    pub fn target(&self) -> &str {
        self.data.target()
    }

    pub fn to_wire(&self) -> WireDnsRecord {
        let mut wire = WireDnsRecord {
            name: self.name.clone(),
            comment: self.comment.clone(),
            ttl: self.ttl,
            reference: self.reference.clone(),
            ..WireDnsRecord::default()
        };
        match &self.data {
            RecordData::A { ipv4addr } => wire.ipv4addr = Some(ipv4addr.clone()),
            RecordData::Aaaa { ipv6addr } => wire.ipv6addr = Some(ipv6addr.clone()),
            RecordData::Cname { canonical } => wire.canonical = Some(canonical.clone()),
            RecordData::Ptr { ipv4addr, ptrdname } => {
                wire.ipv4addr = Some(ipv4addr.clone());
                wire.ptrdname = Some(ptrdname.clone());
            }
        }
        wire
    }

    /// Interpret a flat wire record fetched from the `record_type` endpoint.
    pub fn from_wire(record_type: RecordType, wire: WireDnsRecord) -> Result<Self> {
        fn required(field: Option<String>, name: &str, record_type: RecordType) -> Result<String> {
            field.ok_or_else(|| {
                Error::Deserialization(format!("{record_type} record is missing `{name}`"))
            })
        }

        let data = match record_type {
            RecordType::A => RecordData::A {
                ipv4addr: required(wire.ipv4addr, "ipv4addr", record_type)?,
            },
            RecordType::Aaaa => RecordData::Aaaa {
                ipv6addr: required(wire.ipv6addr, "ipv6addr", record_type)?,
            },
            RecordType::Cname => RecordData::Cname {
                canonical: required(wire.canonical, "canonical", record_type)?,
            },
            RecordType::Ptr => RecordData::Ptr {
                ipv4addr: required(wire.ipv4addr, "ipv4addr", record_type)?,
                ptrdname: required(wire.ptrdname, "ptrdname", record_type)?,
            },
        };
        Ok(Self {
            name: wire.name,
            data,
            comment: wire.comment,
            ttl: wire.ttl,
            reference: wire.reference,
        })
    }
}

/// Flat JSON shape shared by every `record:*` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDnsRecord {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ObjectRef>,
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

/// A network as seen by the DHCP manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpNetwork {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ObjectRef>,
    /// CIDR, e.g. `192.168.1.0/24`.
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A dynamic address pool inside a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpRange {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ObjectRef>,
    pub start_ip: String,
    pub end_ip: String,
    /// Parent network CIDR.
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A fixed address binding a MAC to an IP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpReservation {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ObjectRef>,
    pub ipv4addr: String,
    pub mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A network as seen by the IPAM manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpamNetwork {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ObjectRef>,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Allocation state of a single address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IpStatus {
    Used,
    Available,
    Reserved,
    #[serde(other)]
    Unknown,
}

/// An IPAM allocation record, keyed by address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAllocation {
    #[serde(rename = "_ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<ObjectRef>,
    pub ipv4addr: String,
    pub network: String,
    pub status: IpStatus,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
