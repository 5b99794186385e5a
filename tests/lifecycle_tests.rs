//! Resource lifecycle against a mocked Taikun API.

mod common;

use common::*;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hemmer_provider_taikun::error::NOT_FOUND_AFTER_CREATE_OR_UPDATE;
use hemmer_provider_taikun::testing::{
    assert_error_contains, assert_no_errors, assert_warning_count, ProviderTester,
};
use hemmer_provider_taikun::{ProviderError, ProviderService, TaikunProvider};

const BILLING: &str = "taikun_billing_credential";
const BILLING_LIST: &str = "/api/OperationCredentials/list";
const BILLING_LOCK: &str = "/api/OperationCredentials/lockmanager";

fn billing_config(lock: bool) -> Value {
    json!({
        "name": "billing-a",
        "prometheus_username": "u",
        "prometheus_password": "p",
        "prometheus_url": "https://p/",
        "lock": lock,
    })
}

fn billing_record(locked: bool) -> Value {
    json!({
        "id": 42,
        "name": "billing-a",
        "prometheusUsername": "u",
        "prometheusUrl": "https://p/",
        "organizationId": 3,
        "organizationName": "acme",
        "isLocked": locked,
        "isDefault": false,
        "createdBy": "admin",
    })
}

async fn mount_billing_list(server: &MockServer, locked: bool) {
    Mock::given(method("GET"))
        .and(path(BILLING_LIST))
        .and(query_param("id", "42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(list_body(vec![billing_record(locked)], 1)),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_locks_then_reads_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/OperationCredentials/create"))
        .and(header("Authorization", "Bearer test-token"))
        .and(body_partial_json(json!({
            "name": "billing-a",
            "prometheusUsername": "u",
            "prometheusPassword": "p",
            "prometheusUrl": "https://p/",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BILLING_LOCK))
        .and(body_json(json!({"id": 42, "mode": "Locked"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    mount_billing_list(&server, true).await;

    let tester = ProviderTester::new(provider(&server));
    let result = tester
        .create_result(BILLING, billing_config(true))
        .await
        .unwrap();

    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    let state = result.state.unwrap();
    assert_eq!(state["id"], "42");
    assert_eq!(state["is_locked"], true);
    assert_eq!(state["name"], "billing-a");
    assert_eq!(state["organization_id"], "3");
    assert_eq!(state["prometheus_password"], "p");
}

#[tokio::test]
async fn test_unlocking_only_calls_the_lock_manager() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(BILLING_LOCK))
        .and(body_json(json!({"id": 42, "mode": "Unlocked"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BILLING_LOCK))
        .and(body_json(json!({"id": 42, "mode": "Locked"})))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_billing_list(&server, false).await;

    let mut prior = billing_config(true);
    prior["id"] = json!("42");
    prior["is_locked"] = json!(true);
    prior["organization_id"] = json!("3");

    let tester = ProviderTester::new(provider(&server));
    let state = tester
        .lifecycle_update(BILLING, prior, billing_config(false))
        .await
        .unwrap();

    assert_eq!(state["id"], "42");
    assert_eq!(state["is_locked"], false);
    assert_eq!(state["lock"], false);
}

#[tokio::test]
async fn test_create_retries_until_record_is_listed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/Openstack/create"))
        .and(body_partial_json(json!({"name": "os-a", "openStackUser": "admin"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7})))
        .expect(1)
        .mount(&server)
        .await;

    let record = json!({
        "id": 7,
        "name": "os-a",
        "organizationId": 3,
        "user": "admin",
        "domain": "Default",
        "tenantName": "proj",
        "tenantId": "b1f3",
        "publicNetwork": "public",
        "region": "RegionOne",
        "volumeType": "ssd",
    });
    let dashboard = Sequence::new(vec![
        ResponseTemplate::new(200)
            .set_body_json(json!({"openstack": [], "totalCountOpenstack": 0})),
        ResponseTemplate::new(200)
            .set_body_json(json!({"openstack": [record], "totalCountOpenstack": 1})),
    ]);
    let calls = dashboard.calls();
    Mock::given(method("GET"))
        .and(path("/api/CloudCredentials/list"))
        .and(query_param("id", "7"))
        .respond_with(dashboard)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let result = tester
        .create_result(
            "taikun_cloud_credential_openstack",
            json!({
                "name": "os-a",
                "user": "admin",
                "password": "secret",
                "url": "https://keystone.example.com:5000/v3",
                "domain": "Default",
                "project_name": "proj",
                "public_network_name": "public",
                "region": "RegionOne",
            }),
        )
        .await
        .unwrap();

    assert_no_errors(&result.diagnostics);
    assert_warning_count(&result.diagnostics, NOT_FOUND_AFTER_CREATE_OR_UPDATE, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let state = result.state.unwrap();
    assert_eq!(state["id"], "7");
    assert_eq!(state["project_id"], "b1f3");
    assert_eq!(state["volume_type_name"], "ssd");
    assert_eq!(state["password"], "secret");
}

#[tokio::test]
async fn test_read_of_missing_object_clears_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/KubernetesProfiles/list"))
        .and(query_param("id", "99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(vec![], 0)))
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let result = tester
        .read_result(
            "taikun_kubernetes_profile",
            json!({"id": "99", "name": "k8s-a"}),
        )
        .await
        .unwrap();

    assert!(result.state.is_none());
    assert!(result.diagnostics.is_empty());
}

#[tokio::test]
async fn test_failed_lock_keeps_created_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/OperationCredentials/create"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BILLING_LOCK))
        .respond_with(ResponseTemplate::new(500).set_body_string("lock service down"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(BILLING_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(vec![], 0)))
        .expect(0)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let result = tester
        .create_result(BILLING, billing_config(true))
        .await
        .unwrap();

    assert_eq!(result.state.as_ref().unwrap()["id"], "42");
    assert!(result.has_errors());
    assert_error_contains(&result.diagnostics, "lock service down");
}

#[tokio::test]
async fn test_configure_logs_in_with_access_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/Auth/token"))
        .and(body_json(json!({"accessKey": "ak", "secretKey": "sk"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "issued"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(BILLING_LIST))
        .and(header("Authorization", "Bearer issued"))
        .and(query_param("id", "42"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(list_body(vec![billing_record(false)], 1)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(TaikunProvider::new().with_env(|_: &str| None));
    tester
        .configure(json!({"api_host": server.uri(), "access_key": "ak", "secret_key": "sk"}))
        .await
        .unwrap();

    let imported = tester.import_resource(BILLING, "42").await.unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].resource_type, BILLING);
    assert_eq!(imported[0].state["name"], "billing-a");
    assert_eq!(imported[0].state["lock"], false);
}

#[tokio::test]
async fn test_import_of_unknown_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(BILLING_LIST))
        .respond_with(ResponseTemplate::new(200).set_body_json(list_body(vec![], 0)))
        .mount(&server)
        .await;

    let provider = provider(&server);
    let ctx = hemmer_provider_taikun::OperationContext::background();
    let err = provider.import_resource(&ctx, BILLING, "404").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));

    let err = provider.import_resource(&ctx, BILLING, "abc").await.unwrap_err();
    assert!(matches!(err, ProviderError::Conversion(_)));
}

#[tokio::test]
async fn test_delete_calls_family_route() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/OperationCredentials/delete/42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    tester
        .delete(BILLING, json!({"id": "42", "name": "billing-a"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_read_gives_up_at_the_read_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(BILLING_LIST))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(list_body(vec![billing_record(false)], 1))
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let timeouts = hemmer_provider_taikun::OperationTimeouts {
        read: std::time::Duration::from_millis(50),
        ..Default::default()
    };
    let tester = ProviderTester::new(provider(&server).with_timeouts(timeouts));
    let err = tester
        .read_result(BILLING, json!({"id": "42", "name": "billing-a"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
}

#[tokio::test]
async fn test_host_deadline_wins_over_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(5)))
        .mount(&server)
        .await;

    let ctx = hemmer_provider_taikun::OperationContext::background()
        .with_timeout(std::time::Duration::from_millis(50));
    let tester = ProviderTester::new(provider(&server)).with_context(ctx);
    assert!(tester.context().deadline().is_some());
    let err = tester
        .delete(BILLING, json!({"id": "42", "name": "billing-a"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
}

const OPENSTACK: &str = "taikun_cloud_credential_openstack";
const DASHBOARD: &str = "/api/CloudCredentials/list";
const CLOUD_LOCK: &str = "/api/CloudCredentials/lockmanager";

fn openstack_state(name: &str, user: &str) -> Value {
    json!({
        "id": "7",
        "name": name,
        "user": user,
        "password": "secret",
        "url": "https://keystone.example.com:5000/v3",
        "domain": "Default",
        "project_name": "proj",
        "public_network_name": "public",
        "region": "RegionOne",
        "organization_id": "3",
        "lock": true,
    })
}

fn openstack_listing(name: &str, user: &str) -> Value {
    json!({
        "openstack": [{
            "id": 7,
            "name": name,
            "organizationId": 3,
            "user": user,
            "domain": "Default",
            "tenantName": "proj",
            "tenantId": "b1f3",
            "publicNetwork": "public",
            "region": "RegionOne",
            "isLocked": true,
        }],
        "totalCountOpenstack": 1,
    })
}

async fn mount_openstack_writes(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(CLOUD_LOCK))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/Openstack/update"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_update_of_locked_credential_unlocks_updates_relocks() {
    let server = MockServer::start().await;
    mount_openstack_writes(&server).await;
    Mock::given(method("GET"))
        .and(path(DASHBOARD))
        .and(query_param("id", "7"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(openstack_listing("os-b", "admin2")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let result = tester
        .update_result(
            OPENSTACK,
            openstack_state("os-a", "admin"),
            openstack_state("os-b", "admin2"),
        )
        .await
        .unwrap();
    assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);

    let writes: Vec<(String, String, Value)> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.method.as_str() != "GET")
        .map(|r| {
            let body = serde_json::from_slice(&r.body).unwrap_or(Value::Null);
            (r.method.to_string(), r.url.path().to_string(), body)
        })
        .collect();
    assert_eq!(writes.len(), 3, "{:?}", writes);
    assert_eq!(writes[0].1, CLOUD_LOCK);
    assert_eq!(writes[0].2, json!({"id": 7, "mode": "Unlocked"}));
    assert_eq!(writes[1].0, "PUT");
    assert_eq!(writes[1].2["id"], 7);
    assert_eq!(writes[1].2["name"], "os-b");
    assert_eq!(writes[1].2["openStackUser"], "admin2");
    assert_eq!(writes[1].2["openStackPassword"], "secret");
    assert_eq!(writes[2].1, CLOUD_LOCK);
    assert_eq!(writes[2].2, json!({"id": 7, "mode": "Locked"}));

    let state = result.state.unwrap();
    assert_eq!(state["id"], "7");
    assert_eq!(state["name"], "os-b");
    assert_eq!(state["user"], "admin2");
    assert_eq!(state["lock"], true);
    assert_eq!(state["password"], "secret");
}

#[tokio::test]
async fn test_update_retries_until_change_is_listed() {
    let server = MockServer::start().await;
    mount_openstack_writes(&server).await;
    let dashboard = Sequence::new(vec![
        ResponseTemplate::new(200)
            .set_body_json(json!({"openstack": [], "totalCountOpenstack": 0})),
        ResponseTemplate::new(200).set_body_json(openstack_listing("os-b", "admin")),
    ]);
    let calls = dashboard.calls();
    Mock::given(method("GET"))
        .and(path(DASHBOARD))
        .and(query_param("id", "7"))
        .respond_with(dashboard)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let result = tester
        .update_result(
            OPENSTACK,
            openstack_state("os-a", "admin"),
            openstack_state("os-b", "admin"),
        )
        .await
        .unwrap();

    assert_no_errors(&result.diagnostics);
    assert_warning_count(&result.diagnostics, NOT_FOUND_AFTER_CREATE_OR_UPDATE, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let state = result.state.unwrap();
    assert_eq!(state["id"], "7");
    assert_eq!(state["name"], "os-b");
}

#[tokio::test]
async fn test_invalid_update_never_reaches_the_api() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let err = tester
        .update_result(
            "taikun_access_profile",
            json!({"id": "5", "name": "access-a", "lock": true}),
            json!({"id": "5", "name": "a!", "lock": true}),
        )
        .await
        .unwrap_err();
    let ProviderError::InvalidAttributes(diagnostics) = err else {
        panic!("expected attribute errors, got {:?}", err);
    };
    assert!(!diagnostics.is_empty());
    assert!(diagnostics
        .iter()
        .all(|d| d.attribute.as_deref() == Some("name")));
}
