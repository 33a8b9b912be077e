//! Catalog discovery, classification and service resolution through the client

mod common;

use arcgis_cli::api::{ArcgisClient, ArcgisError, ClientOptions, ServiceCategory};
use common::{client, credentials, sample_catalog, url, FakeTransport, ManualClock, SERVER};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_hosted_service_listing_and_details() {
    let transport = Arc::new(FakeTransport::new());
    transport.route(SERVER, json!({"services": [], "folders": ["Hosted"]}));
    transport.route(
        url("Hosted"),
        json!({"services": [{"name": "TouristAttractions", "type": "FeatureServer"}]}),
    );
    transport.route(
        url("Hosted/TouristAttractions/FeatureServer"),
        json!({"serviceDescription": "Attractions", "layers": [{"id": 0, "name": "Attractions"}]}),
    );
    let client = client(transport.clone());

    let listing = client.list_services().await.unwrap();
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["services"][0]["name"], "TouristAttractions");
    assert_eq!(listing["services"][0]["folder"], "Hosted");
    assert_eq!(listing["services"][0]["category"], "hosted");
    assert_eq!(listing["summary"]["hosted_services"], 1);

    let details = client.get_service_details("TouristAttractions", "Hosted").await.unwrap();
    assert_eq!(transport.calls_to(&url("Hosted/TouristAttractions/FeatureServer")), 1);
    assert_eq!(details["serviceDescription"], "Attractions");
    assert_eq!(details["service_metadata"]["full_path"], "Hosted/TouristAttractions");
    assert_eq!(details["service_metadata"]["type"], "FeatureServer");

    let params = transport
        .last_params(&url("Hosted/TouristAttractions/FeatureServer"))
        .unwrap();
    assert!(params.contains(&("f".to_string(), "json".to_string())));
    assert!(params.contains(&("token".to_string(), "token-1".to_string())));
}

#[tokio::test]
async fn test_unknown_service_is_not_found() {
    let transport = Arc::new(FakeTransport::new());
    transport.route(SERVER, json!({"services": [], "folders": []}));
    let client = client(transport.clone());

    let err = client.resolve("Unknown", "").await.unwrap_err();
    match err {
        ArcgisError::NotFound { name, folder } => {
            assert_eq!(name, "Unknown");
            assert_eq!(folder, "");
        }
        other => panic!("unexpected: {:?}", other),
    }
    assert_eq!(transport.calls_to(SERVER), 1);
}

#[tokio::test]
async fn test_path_and_folder_forms_resolve_alike() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    let client = client(transport);

    let by_folder = client.resolve("TouristAttractions", "Hosted").await.unwrap();
    let by_path = client.resolve("Hosted/TouristAttractions", "").await.unwrap();

    assert_eq!(by_folder, by_path);
    assert_eq!(by_folder.name, "TouristAttractions");
    assert_eq!(by_folder.path(), "Hosted/TouristAttractions/FeatureServer");
}

#[tokio::test]
async fn test_classification_across_folders() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    let client = client(transport);

    let catalog = client.catalog().await.unwrap();
    let category = |name: &str| {
        catalog
            .services()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.category)
            .unwrap()
    };

    assert_eq!(category("CityZoning"), ServiceCategory::Custom);
    assert_eq!(category("Hosted/TouristAttractions"), ServiceCategory::Hosted);
    assert_eq!(category("Utilities/PrintingTools"), ServiceCategory::System);
    assert_eq!(catalog.summary().total, 4);
}

#[tokio::test]
async fn test_failing_folder_is_skipped() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    transport.fail(url("Utilities"), ArcgisError::network(url("Utilities"), Some(500), "Internal Server Error"));
    let client = client(transport);

    let listing = client.list_services().await.unwrap();

    assert_eq!(listing["count"], 3);
    assert_eq!(listing["skipped_folders"][0]["folder"], "Utilities");
    let names: Vec<&str> = listing["services"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|s| s["name"].as_str())
        .collect();
    assert!(!names.contains(&"Utilities/PrintingTools"));
}

#[tokio::test]
async fn test_root_failure_is_an_error() {
    let transport = Arc::new(FakeTransport::new());
    transport.fail(SERVER, ArcgisError::network(SERVER, Some(502), "Bad Gateway"));
    let client = client(transport);

    let err = client.list_services().await.unwrap_err();
    assert_eq!(err.kind(), "network_error");
}

#[tokio::test]
async fn test_catalog_reread_without_cache() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    let client = client(transport.clone());

    client.list_services().await.unwrap();
    client.list_services().await.unwrap();

    assert_eq!(transport.calls_to(SERVER), 2);
    assert_eq!(transport.token_requests(), 1);
}

#[tokio::test]
async fn test_catalog_cache_and_invalidate() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    let options = ClientOptions {
        catalog_cache_ttl: Duration::from_secs(300),
        ..ClientOptions::default()
    };
    let client = ArcgisClient::with_clock(credentials(), options, transport.clone(), Arc::new(ManualClock::new()));

    client.list_services().await.unwrap();
    client.resolve("CityZoning", "").await.unwrap();
    assert_eq!(transport.calls_to(SERVER), 1);

    client.invalidate_catalog();
    client.list_services().await.unwrap();
    assert_eq!(transport.calls_to(SERVER), 2);
}

#[tokio::test]
async fn test_suggestions_for_near_miss() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    let client = client(transport);

    let suggestions = client.suggest("Tourist", 3).await.unwrap();
    assert_eq!(suggestions.first().map(String::as_str), Some("Hosted/TouristAttractions"));
}

#[tokio::test]
async fn test_layer_info() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    transport.route(
        url("CityZoning/MapServer/2"),
        json!({"id": 2, "name": "Lots", "geometryType": "esriGeometryPolygon", "fields": []}),
    );
    let client = client(transport);

    let info = client.get_layer_info("CityZoning", "", 2).await.unwrap();
    assert_eq!(info["name"], "Lots");
    assert_eq!(info["layer_metadata"]["layer_id"], 2);
    assert_eq!(info["layer_metadata"]["service_type"], "MapServer");
}

#[tokio::test]
async fn test_rejected_token_is_invalidated() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    transport.route(
        url("CityZoning/MapServer"),
        json!({"error": {"code": 498, "message": "Invalid token."}}),
    );
    let client = client(transport.clone());

    let err = client.get_service_details("CityZoning", "").await.unwrap_err();
    assert_eq!(err.kind(), "auth_error");
    assert!(client.token_manager().cached_token().is_none());

    client.list_services().await.unwrap();
    assert_eq!(transport.token_requests(), 2);
}

#[tokio::test]
async fn test_rejected_token_on_listing_is_replaced() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    transport.route(SERVER, json!({"error": {"code": 498, "message": "Invalid token."}}));
    let client = client(transport.clone());

    let err = client.list_services().await.unwrap_err();
    assert_eq!(err.kind(), "auth_error");
    assert!(client.token_manager().cached_token().is_none());

    sample_catalog(&transport);
    let listing = client.list_services().await.unwrap();
    assert_eq!(listing["count"], 4);
    assert_eq!(transport.token_requests(), 2);

    let params = transport.last_params(SERVER).unwrap();
    assert!(params.contains(&("token".to_string(), "token-2".to_string())));
}

#[tokio::test]
async fn test_rejected_token_on_folder_listing_is_dropped() {
    let transport = Arc::new(FakeTransport::new());
    sample_catalog(&transport);
    transport.route(url("Utilities"), json!({"error": {"code": 499, "message": "Token Required"}}));
    let client = client(transport.clone());

    // The folder is skipped, but the token it rejected is not reused
    let listing = client.list_services().await.unwrap();
    assert_eq!(listing["count"], 3);
    assert!(client.token_manager().cached_token().is_none());
}
