//! Transport-agnostic WAPI client.
//!
//! # Design
//! `WapiClient` is the single choke point for outbound calls. Every operation
//! is split the same way: [`WapiClient::build_request`] turns an endpoint,
//! query filters and an optional JSON body into a plain-data `HttpRequest`;
//! the configured [`Transport`] executes it; [`parse_response`] turns a 2xx
//! `HttpResponse` into a [`Payload`]. The retry loop between the two owns the
//! error taxonomy: 401 fails at once, 5xx and transport failures are retried
//! up to `max_retries` attempts, any other status fails after one attempt.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use ureq::http::Uri;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{HttpTransport, Transport};
use crate::types::ObjectRef;

/// Normalized body of a successful response.
///
/// 204 and empty bodies are `Empty`; a bare list is kept as-is and a single
/// object becomes a one-element list, so callers never branch on shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Empty,
    Items(Vec<Value>),
}

impl Payload {
    pub fn from_body(body: &str) -> Result<Self> {
        if body.trim().is_empty() {
            return Ok(Payload::Empty);
        }
        let value: Value =
            serde_json::from_str(body).map_err(|e| Error::Deserialization(e.to_string()))?;
        Ok(match value {
            Value::Null => Payload::Empty,
            Value::Array(items) => Payload::Items(items),
            single => Payload::Items(vec![single]),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn items(&self) -> &[Value] {
        match self {
            Payload::Empty => &[],
            Payload::Items(items) => items,
        }
    }

    pub fn into_items(self) -> Vec<Value> {
        match self {
            Payload::Empty => Vec::new(),
            Payload::Items(items) => items,
        }
    }

    /// Deserialize every item into `T`.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        self.into_items()
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(|e| Error::Deserialization(e.to_string())))
            .collect()
    }

    /// Deserialize the first item into `T`, if there is one.
    pub fn into_first<T: DeserializeOwned>(self) -> Result<Option<T>> {
        match self.into_items().into_iter().next() {
            Some(item) => serde_json::from_value(item)
                .map(Some)
                .map_err(|e| Error::Deserialization(e.to_string())),
            None => Ok(None),
        }
    }

    /// Overlay the first returned object onto `fallback`.
    ///
    /// Fields the appliance echoed win; fields it left out keep the value
    /// that was sent. Used to build the result of a create call.
    pub fn merge_into<T: Serialize + DeserializeOwned>(self, fallback: &T) -> Result<T> {
        let mut merged = to_json(fallback)?;
        if let (Value::Object(base), Some(Value::Object(echoed))) =
            (&mut merged, self.into_items().into_iter().next())
        {
            base.extend(echoed);
        }
        serde_json::from_value(merged).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

/// Blocking client for the WAPI REST surface.
///
/// Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct WapiClient {
    wapi_url: String,
    authorization: String,
    max_retries: u32,
    retry_delay: Duration,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for WapiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WapiClient")
            .field("wapi_url", &self.wapi_url)
            .field("authorization", &"<REDACTED>")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl WapiClient {
    /// Build a client that talks HTTP to `config.base_url`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config));
        Self::with_transport(config, transport)
    }

    /// Build a client on an explicit transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        if config.use_mock {
            tracing::info!(url = %config.base_url, "using mock WAPI server");
        }
        let credentials = STANDARD.encode(format!("{}:{}", config.username, config.password));
        Ok(Self {
            wapi_url: config.wapi_url(),
            authorization: format!("Basic {credentials}"),
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            transport,
        })
    }

    /// `<base_url>/wapi/<version>`
    pub fn wapi_url(&self) -> &str {
        &self.wapi_url
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn build_request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        params: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<HttpRequest> {
        let mut url = format!("{}/{}", self.wapi_url, encode_path(endpoint));
        if !params.is_empty() {
            let query =
                serde_urlencoded::to_string(params).map_err(|e| Error::Serialization(e.to_string()))?;
            url.push('?');
            url.push_str(&query);
        }
        if let Err(e) = Uri::try_from(url.as_str()) {
            return Err(Error::InvalidRequest(format!("{url}: {e}")));
        }

        let mut headers = vec![
            ("authorization".to_string(), self.authorization.clone()),
            ("accept".to_string(), "application/json".to_string()),
        ];
        let body = match body {
            Some(value) => {
                headers.push(("content-type".to_string(), "application/json".to_string()));
                Some(serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))?)
            }
            None => None,
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
        })
    }

    pub fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Payload> {
        let request = self.build_request(HttpMethod::Get, endpoint, params, None)?;
        self.send(request)
    }

    pub fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Payload> {
        let body = to_json(body)?;
        let request = self.build_request(HttpMethod::Post, endpoint, &[], Some(&body))?;
        self.send(request)
    }

    pub fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Payload> {
        let body = to_json(body)?;
        let request = self.build_request(HttpMethod::Put, endpoint, &[], Some(&body))?;
        self.send(request)
    }

    /// DELETE an object; `endpoint` is usually its `_ref`.
    pub fn delete(&self, endpoint: &str) -> Result<Payload> {
        let request = self.build_request(HttpMethod::Delete, endpoint, &[], None)?;
        self.send(request)
    }

    /// DELETE by reference, reporting an unknown ref as `false`.
    pub fn delete_ref(&self, reference: &ObjectRef) -> Result<bool> {
        match self.delete(reference.as_str()) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                warn!(reference = %reference, "object not found, nothing deleted");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn send(&self, request: HttpRequest) -> Result<Payload> {
        let mut attempt = 1;
        loop {
            debug!(method = %request.method, url = %request.url, attempt, "sending WAPI request");

            let failure = match self.transport.execute(&request) {
                Ok(response) if response.is_success() => return parse_response(&response),
                Ok(response) if response.status == 401 => {
                    return Err(Error::Authentication(response.body));
                }
                Ok(response) if response.status >= 500 => Error::Api {
                    status: response.status,
                    body: response.body,
                },
                Ok(response) => {
                    return Err(Error::Api {
                        status: response.status,
                        body: response.body,
                    });
                }
                Err(e) => Error::Connection {
                    attempts: attempt,
                    message: e.to_string(),
                },
            };

            if attempt >= self.max_retries {
                return Err(failure);
            }
            warn!(
                attempt,
                max_retries = self.max_retries,
                error = %failure,
                "request failed, retrying"
            );
            if !self.retry_delay.is_zero() {
                std::thread::sleep(self.retry_delay);
            }
            attempt += 1;
        }
    }
}

/// Interpret a successful response.
pub fn parse_response(response: &HttpResponse) -> Result<Payload> {
    if response.status == 204 {
        return Ok(Payload::Empty);
    }
    Payload::from_body(&response.body)
}

/// Characters escaped inside one path segment. `:` stays literal because
/// resource names and refs use it.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encode each `/`-separated segment of an endpoint or ref.
fn encode_path(endpoint: &str) -> String {
    endpoint
        .trim_start_matches('/')
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| Error::Serialization(e.to_string()))
}

/// Query parameters for the filters that were actually supplied.
pub(crate) fn filters<'a>(pairs: &[(&'a str, Option<&'a str>)]) -> Vec<(&'a str, &'a str)> {
    pairs
        .iter()
        .filter_map(|(key, value)| value.map(|value| (*key, value)))
        .collect()
}
