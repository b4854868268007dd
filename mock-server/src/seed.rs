//! Startup dataset loaded into the store before the server accepts requests.
//!
//! ```json
//! {
//!   "networks": [{"network": "192.168.1.0/24", "comment": "office"}],
//!   "dns_records": [{"record_type": "A", "name": "web.example.com", "ipv4addr": "192.168.1.10"}],
//!   "dhcp_ranges": [{"start_ip": "192.168.1.100", "end_ip": "192.168.1.200", "network": "192.168.1.0/24"}]
//! }
//! ```
//!
//! Every section is optional. `record_type` defaults to `A`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::store::{DnsRecord, Network, PolicyViolation, Range, Store};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid seed file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("seed rejected: {0}")]
    Rejected(#[from] PolicyViolation),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub dns_records: Vec<DnsRecord>,
    #[serde(default)]
    pub dhcp_ranges: Vec<Range>,
}

impl Seed {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SeedError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SeedError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`Seed::from_path`], but a missing file is `Ok(None)`.
    pub fn from_path_if_exists(path: impl AsRef<Path>) -> Result<Option<Self>, SeedError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        Self::from_path(path).map(Some)
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty() && self.dns_records.is_empty() && self.dhcp_ranges.is_empty()
    }

    /// Insert every object through the normal create paths, networks first.
    pub fn apply(&self, store: &mut Store) -> Result<(), SeedError> {
        for network in &self.networks {
            store.add_network(network.clone())?;
        }
        for record in &self.dns_records {
            store.add_dns_record(record.clone());
        }
        for range in &self.dhcp_ranges {
            store.add_range(range.clone())?;
        }
        info!(
            networks = self.networks.len(),
            dns_records = self.dns_records.len(),
            dhcp_ranges = self.dhcp_ranges.len(),
            "loaded seed data"
        );
        Ok(())
    }
}
