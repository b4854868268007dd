//! DNS record management.

use tracing::info;

use crate::client::{filters, WapiClient};
use crate::error::Result;
use crate::types::{DnsRecord, ObjectRef, RecordData, RecordType, WireDnsRecord};

/// Creates, queries and deletes `record:*` objects.
#[derive(Debug, Clone)]
pub struct DnsManager {
    client: WapiClient,
}

impl DnsManager {
    pub fn new(client: WapiClient) -> Self {
        Self { client }
    }

    pub fn create_a_record(
        &self,
        name: &str,
        ipv4addr: &str,
        comment: Option<&str>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord> {
        let data = RecordData::A {
            ipv4addr: ipv4addr.to_string(),
        };
        self.create(Some(name), data, comment, ttl)
    }

    pub fn create_aaaa_record(
        &self,
        name: &str,
        ipv6addr: &str,
        comment: Option<&str>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord> {
        let data = RecordData::Aaaa {
            ipv6addr: ipv6addr.to_string(),
        };
        self.create(Some(name), data, comment, ttl)
    }

    /// Create an alias `name` pointing at `canonical`.
    pub fn create_cname(
        &self,
        name: &str,
        canonical: &str,
        comment: Option<&str>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord> {
        let data = RecordData::Cname {
            canonical: canonical.to_string(),
        };
        self.create(Some(name), data, comment, ttl)
    }

    /// Create a reverse mapping from `ipv4addr` to `ptrdname`.
    pub fn create_ptr_record(
        &self,
        ipv4addr: &str,
        ptrdname: &str,
        comment: Option<&str>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord> {
        let data = RecordData::Ptr {
            ipv4addr: ipv4addr.to_string(),
            ptrdname: ptrdname.to_string(),
        };
        self.create(None, data, comment, ttl)
    }

    pub fn get_a_records(&self, name: Option<&str>, ipv4addr: Option<&str>) -> Result<Vec<DnsRecord>> {
        self.query(RecordType::A, &[("name", name), ("ipv4addr", ipv4addr)])
    }

    pub fn get_aaaa_records(&self, name: Option<&str>, ipv6addr: Option<&str>) -> Result<Vec<DnsRecord>> {
        self.query(RecordType::Aaaa, &[("name", name), ("ipv6addr", ipv6addr)])
    }

    pub fn get_cname_records(
        &self,
        name: Option<&str>,
        canonical: Option<&str>,
    ) -> Result<Vec<DnsRecord>> {
        self.query(RecordType::Cname, &[("name", name), ("canonical", canonical)])
    }

    pub fn get_ptr_records(
        &self,
        ipv4addr: Option<&str>,
        ptrdname: Option<&str>,
    ) -> Result<Vec<DnsRecord>> {
        self.query(RecordType::Ptr, &[("ipv4addr", ipv4addr), ("ptrdname", ptrdname)])
    }

    /// Delete a record by reference. Returns `false` if the appliance does
    /// not know the ref.
    pub fn delete_record(&self, reference: &ObjectRef) -> Result<bool> {
        info!(reference = %reference, "deleting DNS record");
        self.client.delete_ref(reference)
    }

    /// All A and CNAME records owned by `name`, A records first.
    ///
    /// Issues one query per record type and concatenates the results.
    pub fn search_records(&self, name: &str) -> Result<Vec<DnsRecord>> {
        let mut records = self.get_a_records(Some(name), None)?;
        records.extend(self.get_cname_records(Some(name), None)?);
        Ok(records)
    }

    fn create(
        &self,
        name: Option<&str>,
        data: RecordData,
        comment: Option<&str>,
        ttl: Option<u32>,
    ) -> Result<DnsRecord> {
        let record_type = data.record_type();
        info!(%record_type, name = name.unwrap_or("-"), target = data.target(), "creating DNS record");

        let mut record = DnsRecord::new(name.map(str::to_string), data);
        record.comment = comment.map(str::to_string);
        record.ttl = ttl;

        let sent = record.to_wire();
        let created = self.client.post(record_type.endpoint(), &sent)?.merge_into(&sent)?;
        DnsRecord::from_wire(record_type, created)
    }

    fn query(&self, record_type: RecordType, pairs: &[(&str, Option<&str>)]) -> Result<Vec<DnsRecord>> {
        self.client
            .get(record_type.endpoint(), &filters(pairs))?
            .into_typed::<WireDnsRecord>()?
            .into_iter()
            .map(|wire| DnsRecord::from_wire(record_type, wire))
            .collect()
    }
}
