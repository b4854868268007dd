//! In-memory mock of a WAPI DDI appliance.
//!
//! Serves the same `/wapi/<version>` resources as a real appliance, backed by
//! a [`Store`] shared behind one `RwLock`. The router can be served over TCP
//! with [`run`] or driven in-process through [`MockTransport`].

use std::env;
use std::path::Path;

use axum::extract::{Query, State};
use axum::routing::{delete, get, post, MethodRouter};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

pub mod error;
pub mod handlers;
pub mod seed;
pub mod store;
pub mod transport;

pub use error::{ApiError, Error};
pub use seed::{Seed, SeedError};
pub use store::{
    Allocation, DnsRecord, Filters, FixedAddress, IpStatus, Network, PolicyViolation, Range,
    RecordType, Ref, SharedStore, Store, Stored, ValidationPolicy,
};
pub use transport::MockTransport;

pub const DEFAULT_WAPI_VERSION: &str = "v2.12";

/// Seed file loaded when `MOCK_WAPI_SEED` is unset, relative to the working
/// directory. A missing file means an empty store.
pub const DEFAULT_SEED_PATH: &str = "config/mock_data.json";

/// Everything needed to build a router: API version, policy and seed data.
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub wapi_version: String,
    pub policy: ValidationPolicy,
    pub seed: Option<Seed>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            wapi_version: DEFAULT_WAPI_VERSION.to_string(),
            policy: ValidationPolicy::default(),
            seed: None,
        }
    }
}

impl MockConfig {
    /// Read `WAPI_VERSION`, `MOCK_WAPI_SEED` and the policy toggles
    /// `MOCK_WAPI_REJECT_OVERLAPS`, `MOCK_WAPI_UNIQUE_MACS` and
    /// `MOCK_WAPI_ENFORCE_BOUNDS`.
    ///
    /// Without `MOCK_WAPI_SEED` the store is seeded from
    /// [`DEFAULT_SEED_PATH`] when that file exists. An empty
    /// `MOCK_WAPI_SEED` disables seeding.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok(), Path::new(DEFAULT_SEED_PATH))
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `var`
    /// and falling back to `default_seed`.
    pub fn from_lookup(
        var: impl Fn(&str) -> Option<String>,
        default_seed: &Path,
    ) -> Result<Self, Error> {
        let flag = |name: &'static str| match var(name) {
            None => Ok(false),
            Some(value) => parse_flag(&value).ok_or(Error::Setting { name, value }),
        };
        let policy = ValidationPolicy {
            reject_overlapping_networks: flag("MOCK_WAPI_REJECT_OVERLAPS")?,
            reject_duplicate_macs: flag("MOCK_WAPI_UNIQUE_MACS")?,
            enforce_address_bounds: flag("MOCK_WAPI_ENFORCE_BOUNDS")?,
        };
        let seed = match var("MOCK_WAPI_SEED") {
            Some(path) if path.is_empty() => None,
            Some(path) => Some(Seed::from_path(path)?),
            None => Seed::from_path_if_exists(default_seed)?,
        };
        Ok(Self {
            wapi_version: var("WAPI_VERSION").unwrap_or_else(|| DEFAULT_WAPI_VERSION.to_string()),
            policy,
            seed,
        })
    }

    pub fn with_policy(mut self, policy: ValidationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_seed(mut self, seed: Seed) -> Self {
        self.seed = Some(seed);
        self
    }

    /// A fresh store with the policy applied and the seed loaded.
    pub fn build_store(&self) -> Result<SharedStore, Error> {
        let mut store = Store::with_policy(self.policy);
        if let Some(seed) = &self.seed {
            seed.apply(&mut store)?;
        }
        Ok(store.into_shared())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Some(false),
        "1" | "true" | "yes" | "on" => Some(true),
        _ => None,
    }
}

/// Router over an empty store with the default version.
pub fn app() -> Router {
    app_with_store(Store::new().into_shared(), DEFAULT_WAPI_VERSION)
}

pub fn app_with_store(store: SharedStore, wapi_version: &str) -> Router {
    let base = format!("/wapi/{wapi_version}");
    let info = handlers::wapi_info(wapi_version);

    Router::new()
        .route("/", get(handlers::health))
        .route(&base, get(move || async move { info }))
        .route(&format!("{base}/record:a"), dns_routes(RecordType::A))
        .route(&format!("{base}/record:aaaa"), dns_routes(RecordType::Aaaa))
        .route(&format!("{base}/record:cname"), dns_routes(RecordType::Cname))
        .route(&format!("{base}/record:ptr"), dns_routes(RecordType::Ptr))
        .route(
            &format!("{base}/network"),
            get(handlers::list_networks).post(handlers::create_network),
        )
        .route(
            &format!("{base}/range"),
            get(handlers::list_ranges).post(handlers::create_range),
        )
        .route(
            &format!("{base}/fixedaddress"),
            get(handlers::list_fixed_addresses).post(handlers::create_fixed_address),
        )
        .route(&format!("{base}/request"), post(handlers::next_available_ip))
        .route(
            &format!("{base}/ipv4address"),
            get(handlers::list_allocations).post(handlers::allocate_ip),
        )
        .route(
            &format!("{base}/{{*reference}}"),
            delete(handlers::delete_object).fallback(handlers::not_found),
        )
        .fallback(handlers::not_found)
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .with_state(store)
}

fn dns_routes(record_type: RecordType) -> MethodRouter<SharedStore> {
    get(move |state: State<SharedStore>, query: Query<Filters>| {
        handlers::list_dns_records(state, query, record_type)
    })
    .post(move |state: State<SharedStore>, body: handlers::Body| {
        handlers::create_dns_record(state, body, record_type)
    })
}

pub async fn run(listener: TcpListener, config: MockConfig) -> Result<(), Error> {
    let store = config.build_store()?;
    let router = app_with_store(store, &config.wapi_version);
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, version = %config.wapi_version, "mock WAPI serving");
    }
    axum::serve(listener, router).await?;
    Ok(())
}
