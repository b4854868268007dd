//! Drive the mock router without a socket.

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use http_body_util::BodyExt;
use tokio::runtime::{Builder, Runtime};
use tower::ServiceExt;
use tracing::trace;
use wapi_core::{HttpRequest, HttpResponse, Transport, TransportError};

use crate::error::Error;
use crate::store::SharedStore;
use crate::{app_with_store, MockConfig};

/// Base URL to pair with [`MockTransport`]. Only the path reaches the router.
pub const MOCK_BASE_URL: &str = "http://mock-wapi.local";

/// A [`Transport`] that feeds each request straight into the mock router.
///
/// Requests run on a private current-thread runtime, so this is usable from
/// plain synchronous code. Do not call it from inside another runtime.
pub struct MockTransport {
    router: Router,
    store: SharedStore,
    runtime: Runtime,
}

impl MockTransport {
    pub fn new() -> Result<Self, Error> {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Result<Self, Error> {
        let store = config.build_store()?;
        let router = app_with_store(store.clone(), &config.wapi_version);
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            router,
            store,
            runtime,
        })
    }

    /// The store behind the router, for arranging or inspecting state.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport").finish_non_exhaustive()
    }
}

impl Transport for MockTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let http_request = builder
            .body(Body::from(request.body.clone().unwrap_or_default()))
            .map_err(|e| TransportError::new(e.to_string()))?;

        trace!(method = %request.method, url = %request.url, "dispatching to mock router");
        self.runtime.block_on(async {
            let response = match self.router.clone().oneshot(http_request).await {
                Ok(response) => response,
                Err(never) => match never {},
            };
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();
            let bytes = response
                .into_body()
                .collect()
                .await
                .map_err(|e| TransportError::new(e.to_string()))?
                .to_bytes();
            Ok(HttpResponse {
                status,
                headers,
                body: String::from_utf8_lossy(&bytes).into_owned(),
            })
        })
    }
}
