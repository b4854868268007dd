use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_wapi::{app, app_with_store, Store, ValidationPolicy};
use serde_json::{json, Value};
use tower::ServiceExt;

const BASE: &str = "/wapi/v2.12";

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

fn delete(uri: &str) -> Request<String> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(String::new())
        .unwrap()
}

async fn post(app: &Router, resource: &str, body: Value) -> (StatusCode, Value) {
    let resp = app
        .clone()
        .oneshot(json_request("POST", &format!("{BASE}/{resource}"), body))
        .await
        .unwrap();
    let status = resp.status();
    (status, body_json(resp).await)
}

async fn list(app: &Router, resource_and_query: &str) -> Vec<Value> {
    let resp = app
        .clone()
        .oneshot(get(&format!("{BASE}/{resource_and_query}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    match body_json(resp).await {
        Value::Array(items) => items,
        other => panic!("expected a list, got {other}"),
    }
}

fn reference(object: &Value) -> String {
    object["_ref"].as_str().unwrap().to_string()
}

// --- health ---

#[tokio::test]
async fn health_endpoint() {
    let resp = app().oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"status": "ok", "service": "Mock WAPI"}));
}

#[tokio::test]
async fn wapi_info_endpoint() {
    let resp = app().oneshot(get(BASE)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await, json!({"version": "2.12", "type": "mock"}));
}

#[tokio::test]
async fn unknown_path_returns_json_404() {
    let resp = app().oneshot(get("/wapi/v2.12/zone_auth")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await, json!({"error": "Not found"}));
}

#[tokio::test]
async fn unsupported_method_returns_json_405() {
    let app = app();
    let requests = [
        json_request("PUT", &format!("{BASE}/record:a"), json!({"name": "x"})),
        delete(&format!("{BASE}/record:a")),
        get(&format!("{BASE}/request")),
    ];
    for request in requests {
        let uri = request.uri().clone();
        let resp = app.clone().oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED, "{uri}");
        assert_eq!(body_json(resp).await, json!({"error": "Method not allowed"}));
    }
}

#[tokio::test]
async fn other_version_is_not_served() {
    let resp = app().oneshot(get("/wapi/v1.0/record:a")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- DNS ---

#[tokio::test]
async fn create_a_record_returns_201_with_ref() {
    let app = app();
    let (status, body) = post(
        &app,
        "record:a",
        json!({"name": "web.example.com", "ipv4addr": "192.168.1.10", "comment": "Web server"}),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(reference(&body).starts_with("record:a/"));
    assert_eq!(body["name"], "web.example.com");
    assert_eq!(body["ipv4addr"], "192.168.1.10");
    assert_eq!(body["comment"], "Web server");
}

#[tokio::test]
async fn create_a_record_missing_fields_returns_400() {
    let app = app();
    let (status, body) = post(&app, "record:a", json!({"name": "web.example.com"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["missing"], json!(["ipv4addr"]));
    assert!(body["error"].as_str().unwrap().contains("ipv4addr"));
    assert!(list(&app, "record:a").await.is_empty());
}

#[tokio::test]
async fn empty_string_counts_as_missing() {
    let app = app();
    let (status, body) = post(&app, "record:cname", json!({"name": "", "canonical": null})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["missing"], json!(["name", "canonical"]));
}

#[tokio::test]
async fn malformed_json_returns_400() {
    let resp = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("{BASE}/network"))
                .header(http::header::CONTENT_TYPE, "application/json")
                .body("{ not json".to_string())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
async fn ptr_record_requires_ptrdname_and_address() {
    let app = app();
    let (status, _) = post(&app, "record:ptr", json!({"ipv4addr": "10.0.0.5"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post(
        &app,
        "record:ptr",
        json!({"ipv4addr": "10.0.0.5", "ptrdname": "host.example.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.get("name").is_none());
}

#[tokio::test]
async fn a_record_ignores_foreign_fields() {
    let app = app();
    let (_, body) = post(
        &app,
        "record:a",
        json!({"name": "web.example.com", "ipv4addr": "10.0.0.1", "canonical": "other.example.com"}),
    )
    .await;
    assert!(body.get("canonical").is_none());
}

#[tokio::test]
async fn list_filters_by_name_and_ignores_unknown_keys() {
    let app = app();
    post(&app, "record:a", json!({"name": "web.example.com", "ipv4addr": "192.168.1.10"})).await;
    post(&app, "record:a", json!({"name": "db.example.com", "ipv4addr": "192.168.1.20"})).await;

    let all = list(&app, "record:a").await;
    assert_eq!(all.len(), 2);

    let web = list(&app, "record:a?name=web.example.com").await;
    assert_eq!(web.len(), 1);
    assert_eq!(web[0]["ipv4addr"], "192.168.1.10");

    let anded = list(&app, "record:a?name=web.example.com&ipv4addr=192.168.1.20").await;
    assert!(anded.is_empty());

    let unknown = list(&app, "record:a?_max_results=5").await;
    assert_eq!(unknown.len(), 2);
}

#[tokio::test]
async fn record_types_do_not_leak_into_each_other() {
    let app = app();
    post(&app, "record:a", json!({"name": "app.example.com", "ipv4addr": "10.0.0.1"})).await;
    post(
        &app,
        "record:cname",
        json!({"name": "www.example.com", "canonical": "app.example.com"}),
    )
    .await;

    assert_eq!(list(&app, "record:a").await.len(), 1);
    assert_eq!(list(&app, "record:cname").await.len(), 1);
    assert!(list(&app, "record:aaaa").await.is_empty());
}

#[tokio::test]
async fn delete_record_returns_204_then_404() {
    let app = app();
    let (_, body) = post(&app, "record:a", json!({"name": "web.example.com", "ipv4addr": "10.0.0.1"})).await;
    let uri = format!("{BASE}/{}", reference(&body));

    let resp = app.clone().oneshot(delete(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
    assert!(list(&app, "record:a").await.is_empty());

    let resp = app.clone().oneshot(delete(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn refs_are_unique_across_types() {
    let app = app();
    let mut refs = Vec::new();
    for name in ["a.example.com", "b.example.com"] {
        let (_, body) = post(&app, "record:a", json!({"name": name, "ipv4addr": "10.0.0.1"})).await;
        refs.push(reference(&body));
    }
    let (_, body) = post(&app, "network", json!({"network": "10.0.0.0/24"})).await;
    refs.push(reference(&body));

    let mut deduped = refs.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), refs.len());
}

// --- DHCP ---

#[tokio::test]
async fn network_range_and_fixed_address_flow() {
    let app = app();
    let (status, network) = post(&app, "network", json!({"network": "192.168.1.0/24", "comment": "office"})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(network["comment"], "office");

    let (status, range) = post(
        &app,
        "range",
        json!({"start_ip": "192.168.1.100", "end_ip": "192.168.1.200", "network": "192.168.1.0/24"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(reference(&range).starts_with("range/"));

    let (status, fixed) = post(
        &app,
        "fixedaddress",
        json!({"ipv4addr": "192.168.1.50", "mac": "00:11:22:33:44:55", "name": "printer"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(fixed["name"], "printer");

    assert_eq!(list(&app, "range?network=192.168.1.0%2F24").await.len(), 1);
    assert!(list(&app, "range?network=10.0.0.0%2F8").await.is_empty());
    assert_eq!(list(&app, "fixedaddress?mac=00:11:22:33:44:55").await.len(), 1);
    assert_eq!(list(&app, "network").await.len(), 1);
}

#[tokio::test]
async fn range_requires_all_bounds() {
    let app = app();
    let (status, body) = post(&app, "range", json!({"start_ip": "10.0.0.1"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["missing"], json!(["end_ip", "network"]));
}

// --- IPAM ---

#[tokio::test]
async fn next_available_ip_does_not_allocate() {
    let app = app();
    let (status, first) = post(&app, "request", json!({"network": "192.168.1.0/24"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, json!({"ipv4addr": "192.168.1.1"}));

    let (_, second) = post(&app, "request", json!({"network": "192.168.1.0/24"})).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn allocate_status_release_cycle() {
    let app = app();
    let (status, allocation) = post(
        &app,
        "ipv4address",
        json!({"ip_address": "192.168.1.1", "network": "192.168.1.0/24", "names": ["web-server"]}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(allocation["status"], "USED");
    assert_eq!(allocation["names"], json!(["web-server"]));

    let (_, next) = post(&app, "request", json!({"network": "192.168.1.0/24"})).await;
    assert_eq!(next["ipv4addr"], "192.168.1.2");

    let found = list(&app, "ipv4address?ip_address=192.168.1.1").await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["network"], "192.168.1.0/24");

    let uri = format!("{BASE}/{}", reference(&allocation));
    let resp = app.clone().oneshot(delete(&uri)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    assert!(list(&app, "ipv4address?ip_address=192.168.1.1").await.is_empty());
    let (_, next) = post(&app, "request", json!({"network": "192.168.1.0/24"})).await;
    assert_eq!(next["ipv4addr"], "192.168.1.1");
}

#[tokio::test]
async fn exhausted_network_returns_404() {
    let app = app();
    for ip in ["10.0.0.1", "10.0.0.2"] {
        post(&app, "ipv4address", json!({"ip_address": ip, "network": "10.0.0.0/30"})).await;
    }
    let (status, body) = post(&app, "request", json!({"network": "10.0.0.0/30"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "No available IPs"}));
}

#[tokio::test]
async fn invalid_network_has_no_available_ips() {
    let app = app();
    let (status, _) = post(&app, "request", json!({"network": "not-a-cidr"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = post(&app, "request", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["missing"], json!(["network"]));
}

// --- policy ---

#[tokio::test]
async fn permissive_by_default() {
    let app = app();
    post(&app, "network", json!({"network": "10.0.0.0/8"})).await;
    let (status, _) = post(&app, "network", json!({"network": "10.1.0.0/16"})).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = post(
        &app,
        "range",
        json!({"start_ip": "10.0.0.200", "end_ip": "10.0.0.100", "network": "10.0.0.0/24"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn strict_policy_rejects_with_400() {
    let store = Store::with_policy(ValidationPolicy::strict()).into_shared();
    let app = app_with_store(store, "v2.12");

    post(&app, "network", json!({"network": "10.0.0.0/8"})).await;
    let (status, body) = post(&app, "network", json!({"network": "10.1.0.0/16"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("overlaps"));

    post(&app, "fixedaddress", json!({"ipv4addr": "10.0.0.5", "mac": "aa:bb:cc:dd:ee:ff"})).await;
    let (status, _) = post(
        &app,
        "fixedaddress",
        json!({"ipv4addr": "10.0.0.6", "mac": "aa:bb:cc:dd:ee:ff"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(list(&app, "fixedaddress").await.len(), 1);
}

#[tokio::test]
async fn custom_version_prefix() {
    let app = app_with_store(Store::new().into_shared(), "v2.13");
    let resp = app.clone().oneshot(get("/wapi/v2.13/network")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(get("/wapi/v2.12/network")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
