#![allow(clippy::unwrap_used)]
// Integration tests for `Resource` CRUD calls using wiremock.

use serde::{Deserialize, Serialize};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledgerdesk_api::{
    ApiClient, Error, FilterDataType, FilterDescriptor, FilterField, FilterMode, PageQuery,
    Resource, SortDescriptor, TransportConfig,
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Holiday {
    id: String,
    name: String,
    entry_date: String,
}

#[derive(Debug, Serialize)]
struct HolidayRequest {
    name: String,
    entry_date: String,
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Resource<Holiday, HolidayRequest>) {
    let server = MockServer::start().await;
    let api = ApiClient::from_reqwest(&server.uri(), reqwest::Client::new()).unwrap();
    (server, Resource::new(api, "holiday"))
}

fn holiday_json(id: &str, name: &str) -> serde_json::Value {
    json!({ "id": id, "name": name, "entry_date": "2025-01-01" })
}

// ── CRUD ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_posts_payload() {
    let (server, holidays) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/holiday"))
        .and(body_json(json!({ "name": "New Year", "entry_date": "2025-01-01" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(holiday_json("h1", "New Year")))
        .expect(1)
        .mount(&server)
        .await;

    let created = holidays
        .create(&HolidayRequest {
            name: "New Year".into(),
            entry_date: "2025-01-01".into(),
        })
        .await
        .unwrap();

    assert_eq!(created.id, "h1");
    assert_eq!(created.name, "New Year");
}

#[tokio::test]
async fn test_get_by_id_and_all() {
    let (server, holidays) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(holiday_json("h1", "New Year")))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            holiday_json("h1", "New Year"),
            holiday_json("h2", "Labour Day"),
        ])))
        .mount(&server)
        .await;

    assert_eq!(holidays.get_by_id(&"h1").await.unwrap().name, "New Year");
    assert_eq!(holidays.get_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_puts_to_item_path() {
    let (server, holidays) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/holiday/h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(holiday_json("h1", "Renamed")))
        .expect(1)
        .mount(&server)
        .await;

    let updated = holidays
        .update_by_id(
            &"h1",
            &HolidayRequest {
                name: "Renamed".into(),
                entry_date: "2025-01-01".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed");
}

#[tokio::test]
async fn test_ids_cannot_escape_the_resource_path() {
    let (server, holidays) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/a%2Fb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(holiday_json("a/b", "New Year")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(holiday_json("x", "Admin")))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/holiday"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let nested = holidays.get_by_id(&"a/b").await.unwrap();
    assert_eq!(nested.id, "a/b");

    let escaped = holidays.get_by_id(&"../admin").await;
    assert!(matches!(escaped, Err(Error::NotFound { .. })));

    for id in ["..", "."] {
        let err = holidays.delete_by_id(&id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidId(ref bad) if bad == id));
    }
}

#[tokio::test]
async fn test_delete_by_id_and_many() {
    let (server, holidays) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/holiday/h1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/holiday/bulk"))
        .and(body_json(json!({ "ids": ["a", "b", "c"] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    holidays.delete_by_id(&"h1").await.unwrap();
    holidays.delete_many(&["a", "b", "c"]).await.unwrap();
}

// ── Pagination ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_paginated_sends_encoded_descriptors() {
    let (server, holidays) = setup().await;

    let filter = FilterDescriptor::new().with(
        "name",
        FilterField::new(FilterMode::Contains, FilterDataType::Text, "Year"),
    );
    let sort = SortDescriptor::new().desc("entry_date");

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/search"))
        .and(query_param("pageIndex", "1"))
        .and(query_param("pageSize", "5"))
        .and(query_param("filter", filter.encode().unwrap().as_str()))
        .and(query_param("sort", sort.encode().unwrap().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [holiday_json("h6", "New Year")],
            "pages": [{ "pageIndex": 0, "pageSize": 5 }, { "pageIndex": 1, "pageSize": 5 }],
            "totalSize": 6,
            "totalPage": 2,
            "pageIndex": 1,
            "pageSize": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = holidays
        .get_paginated(&PageQuery::page(1, 5).with_filter(filter).with_sort(sort))
        .await
        .unwrap();

    assert_eq!(page.data.len(), 1);
    assert_eq!(page.total_size, 6);
    assert_eq!(page.pages.len(), 2);
    assert!(page.is_consistent());
}

#[tokio::test]
async fn test_paginated_omits_empty_descriptors() {
    let (server, holidays) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/search"))
        .and(query_param_is_missing("filter"))
        .and(query_param_is_missing("sort"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [], "totalSize": 0 })))
        .expect(1)
        .mount(&server)
        .await;

    let page = holidays
        .get_paginated(&PageQuery::default().with_filter(FilterDescriptor::new()))
        .await
        .unwrap();
    assert!(page.is_empty());
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_error_taxonomy() {
    let (server, holidays) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/missing"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "message": "Holiday not found" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/secret"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/holiday"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "message": "Validation failed",
            "errors": { "entry_date": ["must be a future date"] }
        })))
        .mount(&server)
        .await;

    let err = holidays.get_by_id(&"missing").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { ref message } if message == "Holiday not found"));

    let err = holidays.get_by_id(&"secret").await.unwrap_err();
    assert!(matches!(err, Error::Forbidden { .. }), "got {err:?}");

    let err = holidays
        .create(&HolidayRequest {
            name: "x".into(),
            entry_date: "1999-01-01".into(),
        })
        .await
        .unwrap_err();
    let fields = err.field_errors().unwrap();
    assert_eq!(fields["entry_date"], vec!["must be a future date".to_owned()]);
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, holidays) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/h1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = holidays.get_by_id(&"h1").await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { ref body, .. } if body.contains("oops")));
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let transport =
        TransportConfig::default().with_token(secrecy::SecretString::from("s3cret".to_owned()));
    let api = ApiClient::new(&server.uri(), &transport).unwrap();
    let holidays: Resource<Holiday, HolidayRequest> = Resource::new(api, "/holiday/");

    assert!(holidays.get_all().await.unwrap().is_empty());
}
