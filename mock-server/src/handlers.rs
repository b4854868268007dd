//! Request handlers for the `/wapi/<version>` resources.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::store::{
    Allocation, DnsRecord, Filters, FixedAddress, Network, Range, RecordType, Ref, SharedStore,
    Stored,
};

/// A JSON body, or the reason it could not be read.
pub type Body = Result<Json<Value>, JsonRejection>;
type Created<T> = Result<(StatusCode, Json<Stored<T>>), ApiError>;

/// Unpack a JSON object body and check that `required` fields carry a value.
///
/// Absent, `null` and empty-string fields all count as missing.
fn require(body: Body, required: &[&str]) -> Result<Map<String, Value>, ApiError> {
    let object = match body {
        Ok(Json(Value::Object(object))) => object,
        Ok(Json(_)) => Map::new(),
        Err(rejection) => return Err(ApiError::BadRequest(rejection.body_text())),
    };

    let missing: Vec<String> = required
        .iter()
        .filter(|field| match object.get(**field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        })
        .map(|field| field.to_string())
        .collect();

    if missing.is_empty() {
        Ok(object)
    } else {
        debug!(?missing, "rejecting request with missing fields");
        Err(ApiError::MissingFields(missing))
    }
}

fn parse<T: DeserializeOwned>(object: Map<String, Value>) -> Result<T, ApiError> {
    serde_json::from_value(Value::Object(object)).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn created<T>(stored: Stored<T>) -> Created<T> {
    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "Mock WAPI" }))
}

pub fn wapi_info(version: &str) -> Json<Value> {
    Json(json!({ "version": version.trim_start_matches('v'), "type": "mock" }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".into())
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[derive(Deserialize)]
struct DnsRecordBody {
    name: Option<String>,
    ipv4addr: Option<String>,
    ipv6addr: Option<String>,
    canonical: Option<String>,
    ptrdname: Option<String>,
    comment: Option<String>,
    ttl: Option<u32>,
}

impl DnsRecordBody {
    /// Keep only the fields that belong to `record_type`.
    fn into_record(self, record_type: RecordType) -> DnsRecord {
        let mut record = DnsRecord {
            record_type,
            comment: self.comment,
            ttl: self.ttl,
            ..DnsRecord::default()
        };
        match record_type {
            RecordType::A => {
                record.name = self.name;
                record.ipv4addr = self.ipv4addr;
            }
            RecordType::Aaaa => {
                record.name = self.name;
                record.ipv6addr = self.ipv6addr;
            }
            RecordType::Cname => {
                record.name = self.name;
                record.canonical = self.canonical;
            }
            RecordType::Ptr => {
                record.ipv4addr = self.ipv4addr;
                record.ptrdname = self.ptrdname;
            }
        }
        record
    }
}

pub async fn list_dns_records(
    State(store): State<SharedStore>,
    Query(filters): Query<Filters>,
    record_type: RecordType,
) -> Json<Vec<Stored<DnsRecord>>> {
    Json(store.read().await.dns_records(record_type, &filters))
}

pub async fn create_dns_record(
    State(store): State<SharedStore>,
    body: Body,
    record_type: RecordType,
) -> Created<DnsRecord> {
    let object = require(body, record_type.required_fields())?;
    let record = parse::<DnsRecordBody>(object)?.into_record(record_type);
    let stored = store.write().await.add_dns_record(record);
    info!(reference = %stored.reference, "created DNS record");
    created(stored)
}

pub async fn list_networks(
    State(store): State<SharedStore>,
    Query(filters): Query<Filters>,
) -> Json<Vec<Stored<Network>>> {
    Json(store.read().await.networks(&filters))
}

pub async fn create_network(State(store): State<SharedStore>, body: Body) -> Created<Network> {
    let network: Network = parse(require(body, &["network"])?)?;
    let stored = store.write().await.add_network(network)?;
    info!(reference = %stored.reference, "created network");
    created(stored)
}

pub async fn list_ranges(
    State(store): State<SharedStore>,
    Query(filters): Query<Filters>,
) -> Json<Vec<Stored<Range>>> {
    Json(store.read().await.ranges(&filters))
}

pub async fn create_range(State(store): State<SharedStore>, body: Body) -> Created<Range> {
    let range: Range = parse(require(body, &["start_ip", "end_ip", "network"])?)?;
    let stored = store.write().await.add_range(range)?;
    info!(reference = %stored.reference, "created DHCP range");
    created(stored)
}

pub async fn list_fixed_addresses(
    State(store): State<SharedStore>,
    Query(filters): Query<Filters>,
) -> Json<Vec<Stored<FixedAddress>>> {
    Json(store.read().await.fixed_addresses(&filters))
}

pub async fn create_fixed_address(
    State(store): State<SharedStore>,
    body: Body,
) -> Created<FixedAddress> {
    let fixed: FixedAddress = parse(require(body, &["ipv4addr", "mac"])?)?;
    let stored = store.write().await.add_fixed_address(fixed)?;
    info!(reference = %stored.reference, "created fixed address");
    created(stored)
}

#[derive(Deserialize)]
struct NextAvailableBody {
    network: String,
}

pub async fn next_available_ip(
    State(store): State<SharedStore>,
    body: Body,
) -> Result<Json<Value>, ApiError> {
    let NextAvailableBody { network } = parse(require(body, &["network"])?)?;
    let next = store.read().await.next_available_ip(&network);
    match next {
        Some(ip) => {
            debug!(%network, %ip, "next available IP");
            Ok(Json(json!({ "ipv4addr": ip.to_string() })))
        }
        None => Err(ApiError::NotFound("No available IPs".into())),
    }
}

#[derive(Deserialize)]
struct AllocateBody {
    ip_address: String,
    network: String,
    #[serde(default)]
    names: Vec<String>,
    comment: Option<String>,
}

pub async fn list_allocations(
    State(store): State<SharedStore>,
    Query(filters): Query<Filters>,
) -> Json<Vec<Stored<Allocation>>> {
    Json(store.read().await.allocations(&filters))
}

pub async fn allocate_ip(State(store): State<SharedStore>, body: Body) -> Created<Allocation> {
    let body: AllocateBody = parse(require(body, &["ip_address", "network"])?)?;
    let stored = store.write().await.allocate_ip(
        &body.network,
        &body.ip_address,
        body.names,
        body.comment,
    )?;
    info!(reference = %stored.reference, "allocated IP");
    created(stored)
}

pub async fn delete_object(
    State(store): State<SharedStore>,
    Path(reference): Path<String>,
) -> Result<StatusCode, ApiError> {
    let reference = Ref::from(reference);
    if store.write().await.delete(&reference) {
        info!(%reference, "deleted object");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("{reference} not found")))
    }
}
