//! Singular and plural data sources against a mocked Taikun API.

mod common;

use common::*;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hemmer_provider_taikun::testing::ProviderTester;
use hemmer_provider_taikun::ProviderError;

fn access_profiles(ids: std::ops::RangeInclusive<i64>) -> Vec<Value> {
    ids.map(|id| json!({"id": id, "name": format!("ap-{}", id), "organizationId": 3}))
        .collect()
}

#[tokio::test]
async fn test_plural_read_follows_offsets_to_total() {
    let server = MockServer::start().await;
    let responder = PagedResponder::new(vec![
        list_body(access_profiles(1..=3), 7),
        list_body(access_profiles(4..=6), 7),
        list_body(access_profiles(7..=7), 7),
    ]);
    let offsets = responder.offsets();
    Mock::given(method("GET"))
        .and(path("/api/AccessProfiles/list"))
        .respond_with(responder)
        .expect(3)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let result = tester
        .read_data_source("taikun_access_profiles", json!({}))
        .await
        .unwrap();

    assert_eq!(*offsets.lock().unwrap(), vec![None, Some(3), Some(6)]);
    let items = result["access_profiles"].as_array().unwrap();
    assert_eq!(items.len(), 7);
    assert_eq!(items[0]["name"], "ap-1");
    assert_eq!(items[6]["id"], "7");
    assert_eq!(result["id"], "all");
}

#[tokio::test]
async fn test_plural_read_scoped_to_organization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/AccessProfiles/list"))
        .and(query_param("organizationId", "3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(list_body(access_profiles(1..=2), 2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let result = tester
        .read_data_source("taikun_access_profiles", json!({"organization_id": "3"}))
        .await
        .unwrap();

    assert_eq!(result["id"], "3");
    assert_eq!(result["organization_id"], "3");
    assert_eq!(result["access_profiles"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_plural_read_rejects_short_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/AccessProfiles/list"))
        .respond_with(PagedResponder::new(vec![
            list_body(access_profiles(1..=3), 7),
            list_body(vec![], 7),
        ]))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let err = tester
        .read_data_source("taikun_access_profiles", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Invariant(_)));
}

#[tokio::test]
async fn test_cloud_credentials_read_their_own_partition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/CloudCredentials/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "amazon": [
                {
                    "id": 1,
                    "name": "aws-a",
                    "region": "eu-central-1",
                    "availabilityZonesCount": 2,
                    "isLocked": true
                }
            ],
            "azure": [
                {"id": 2, "name": "az-a", "location": "westeurope"},
                {"id": 3, "name": "az-b", "location": "northeurope"}
            ],
            "totalCountAws": 1,
            "totalCountAzure": 2,
        })))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let aws = tester
        .read_data_source("taikun_cloud_credentials_aws", json!({}))
        .await
        .unwrap();
    let items = aws["cloud_credentials"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "aws-a");
    assert_eq!(items[0]["region"], "eu-central-1");
    assert_eq!(items[0]["lock"], true);
    assert!(items[0].get("secret_access_key").is_none());

    let azure = tester
        .read_data_source("taikun_cloud_credentials_azure", json!({}))
        .await
        .unwrap();
    assert_eq!(azure["cloud_credentials"].as_array().unwrap().len(), 2);

    let google = tester
        .read_data_source("taikun_cloud_credentials_gcp", json!({}))
        .await
        .unwrap();
    assert!(google["cloud_credentials"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_singular_read_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/CloudCredentials/list"))
        .and(query_param("id", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "azure": [{"id": 2, "name": "az-a", "location": "westeurope", "tenantId": "t"}],
            "totalCountAzure": 1,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/CloudCredentials/list"))
        .and(query_param("id", "9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"totalCountAzure": 0})))
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let record = tester
        .read_data_source("taikun_cloud_credential_azure", json!({"id": "2"}))
        .await
        .unwrap();
    assert_eq!(record["id"], "2");
    assert_eq!(record["location"], "westeurope");
    assert_eq!(record["tenant_id"], "t");
    assert!(record.get("client_secret").is_none());

    let err = tester
        .read_data_source("taikun_cloud_credential_azure", json!({"id": "9"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_singular_read_validates_id_before_calling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let tester = ProviderTester::new(provider(&server));
    let err = tester
        .read_data_source("taikun_access_profile", json!({"id": "not-a-number"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::InvalidAttributes(_)));
}
