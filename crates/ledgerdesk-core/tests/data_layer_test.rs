#![allow(clippy::unwrap_used)]
// End-to-end tests for the data layer, query cache and forms against a mock API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::broadcast;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ledgerdesk_core::{
    CacheEvent, ClientConfig, CoreError, EntityForm, EntityId, ErrorKind, FormMode, FormProps, Holiday,
    HolidayRequest, MutationOptions, PageQuery, Paginated, QueryKey, QueryOptions, QueryStatus,
    RecordingNotifier, Session, ToastLevel,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, Session, Arc<RecordingNotifier>) {
    let server = MockServer::start().await;
    let mut config = ClientConfig::new(server.uri().parse().unwrap());
    config.retry = 0;
    let notifier = Arc::new(RecordingNotifier::new());
    let session = Session::new(config, notifier.clone()).unwrap();
    (server, session, notifier)
}

fn holiday_json(id: &str, name: &str) -> serde_json::Value {
    json!({ "id": id, "name": name, "entry_date": "2025-01-01", "description": "Holiday" })
}

fn page_json(rows: &[serde_json::Value]) -> serde_json::Value {
    json!({
        "data": rows,
        "pages": [{ "pageIndex": 0, "pageSize": 10 }],
        "totalSize": rows.len(),
        "totalPage": 1,
        "pageIndex": 0,
        "pageSize": 10
    })
}

fn new_year() -> HolidayRequest {
    HolidayRequest {
        name: "New Year".into(),
        entry_date: chrono::NaiveDate::from_ymd_opt(2025, 1, 1),
        description: "Holiday".into(),
    }
}

fn cached_holiday(session: &Session, id: &EntityId) -> Option<Holiday> {
    session
        .query_client()
        .get_query_data::<Option<Holiday>>(&session.holidays().detail_key(id))
        .and_then(|h| (*h).clone())
}

/// Open `h1` in update mode with its current values loaded.
fn open_h1(session: &Session, props: FormProps<Holiday>) -> EntityForm<Holiday, HolidayRequest> {
    let mut form = EntityForm::new(session.holidays(), Some(EntityId::from("h1")), props).unwrap();
    form.load_record(&serde_json::from_value(holiday_json("h1", "New Year")).unwrap())
        .unwrap();
    form
}

/// Drain whatever cache events are queued right now.
fn drain(events: &mut broadcast::Receiver<CacheEvent>) -> Vec<CacheEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}

// ── Queries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_empty_page_matches_initial_shape() {
    let (server, session, notifier) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [], "totalSize": 0 })))
        .mount(&server)
        .await;

    let query = PageQuery::page(0, 10);
    let result = session
        .holidays()
        .query_paginated(&query, QueryOptions::default())
        .fetch()
        .await;

    assert_eq!(result.status, QueryStatus::Success);
    assert_eq!(*result.data, Paginated::empty(0, 10));
    assert!(notifier.toasts().is_empty());
}

#[tokio::test]
async fn test_concurrent_identical_queries_share_one_request() {
    let (server, session, _) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/search"))
        .and(query_param("pageIndex", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json(&[holiday_json("h1", "New Year")]))
                .set_delay(Duration::from_millis(150)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let holidays = session.holidays();
    let query = PageQuery::page(0, 10);
    let first = holidays.query_paginated(&query, QueryOptions::default());
    let second = holidays.query_paginated(&query.clone(), QueryOptions::default());

    let (a, b) = tokio::join!(first.fetch(), second.fetch());
    assert_eq!(a.data.data.len(), 1);
    assert!(Arc::ptr_eq(&a.data, &b.data));
}

#[tokio::test]
async fn test_failed_query_keeps_initial_data_and_toasts() {
    let (server, session, notifier) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "ledger offline" })))
        .mount(&server)
        .await;

    let result = session.holidays().query_all(QueryOptions::default()).fetch().await;

    assert_eq!(result.status, QueryStatus::Error);
    assert!(result.data.is_empty());
    assert_eq!(result.error.as_ref().map(|e| e.kind()), Some(ErrorKind::Server));
    assert_eq!(notifier.messages(), vec!["ledger offline".to_owned()]);
}

// ── Mutations ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_create_invalidates_lists_and_refetch_sees_record() {
    let (server, session, notifier) = setup().await;
    let holidays = session.holidays();
    let query = PageQuery::page(0, 10);

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&[])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let before = holidays.query_paginated(&query, QueryOptions::default()).fetch().await;
    assert!(before.data.data.is_empty());

    Mock::given(method("POST"))
        .and(path("/api/v1/holiday"))
        .and(body_json(json!({ "name": "New Year", "entry_date": "2025-01-01", "description": "Holiday" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(holiday_json("h1", "New Year")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/holiday/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(&[holiday_json("h1", "New Year")])))
        .mount(&server)
        .await;

    let mut events = session.query_client().subscribe();
    let created = holidays
        .create_mutation(MutationOptions::new())
        .mutate(new_year())
        .await
        .unwrap();
    assert_eq!(created.id, EntityId::from("h1"));

    let seen = drain(&mut events);
    assert!(seen.contains(&CacheEvent::Invalidated(QueryKey::from(["holiday", "paginated"]))));
    assert_eq!(notifier.messages(), vec!["Holiday created".to_owned()]);
    assert_eq!(notifier.toasts()[0].level, ToastLevel::Success);
    assert_eq!(
        session
            .query_client()
            .get_query_data::<Option<Holiday>>(&holidays.detail_key(&created.id))
            .and_then(|h| (*h).clone())
            .map(|h| h.name),
        Some("New Year".to_owned())
    );

    let after = holidays.query_paginated(&query, QueryOptions::default()).fetch().await;
    assert_eq!(after.data.data.len(), 1);
    assert_eq!(after.data.data[0].name, "New Year");
}

#[tokio::test]
async fn test_delete_many_sends_one_request_and_one_invalidation() {
    let (server, session, notifier) = setup().await;
    let holidays = session.holidays();

    Mock::given(method("DELETE"))
        .and(path("/api/v1/holiday/bulk"))
        .and(body_json(json!({ "ids": ["h1", "h2", "h3"] })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut events = session.query_client().subscribe();
    let ids: Vec<EntityId> = ["h1", "h2", "h3"].into_iter().map(EntityId::from).collect();
    holidays
        .delete_many_mutation(MutationOptions::new())
        .mutate(ids)
        .await
        .unwrap();

    let paginated = CacheEvent::Invalidated(QueryKey::from(["holiday", "paginated"]));
    let invalidations = drain(&mut events)
        .into_iter()
        .filter(|event| *event == paginated)
        .count();
    assert_eq!(invalidations, 1);
    assert_eq!(notifier.messages(), vec!["3 Holiday records deleted".to_owned()]);
}

#[tokio::test]
async fn test_overlapping_deletes_each_evict_their_record() {
    let (server, session, _) = setup().await;
    let holidays = session.holidays();
    let (h1, h2) = (EntityId::from("h1"), EntityId::from("h2"));

    Mock::given(method("DELETE"))
        .and(path("/api/v1/holiday/h1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/holiday/h2"))
        .respond_with(ResponseTemplate::new(204).set_delay(Duration::from_millis(150)))
        .mount(&server)
        .await;
    for id in ["h1", "h2"] {
        let record: Holiday = serde_json::from_value(holiday_json(id, "New Year")).unwrap();
        session
            .query_client()
            .set_query_data(&holidays.detail_key(&record.id), Some(record));
    }

    let delete = holidays.delete_mutation(MutationOptions::new());
    let (first, second) = tokio::join!(delete.mutate(h1.clone()), delete.mutate(h2.clone()));
    first.unwrap();
    second.unwrap();

    assert_eq!(cached_holiday(&session, &h1), None);
    assert_eq!(cached_holiday(&session, &h2), None);
}

#[tokio::test]
async fn test_silent_mutation_failure_reaches_on_error_only() {
    let (server, session, notifier) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/holiday/h9"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "message": "Holiday is in use" })))
        .mount(&server)
        .await;

    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let delete = session.holidays().delete_mutation(
        MutationOptions::new()
            .show_message(false)
            .on_error(move |message: &str, _: &CoreError| sink.lock().unwrap().push(message.to_owned())),
    );

    let err = delete.mutate(EntityId::from("h9")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(notifier.toasts().is_empty());
    assert_eq!(*reported.lock().unwrap(), vec!["Holiday is in use".to_owned()]);
    assert_eq!(delete.error().map(|e| e.message()), Some("Holiday is in use".to_owned()));
}

// ── Forms ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_form_never_hits_the_network() {
    let (server, session, notifier) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/holiday"))
        .respond_with(ResponseTemplate::new(201).set_body_json(holiday_json("h1", "x")))
        .expect(0)
        .mount(&server)
        .await;

    let mut form: EntityForm<Holiday, HolidayRequest> =
        EntityForm::new(session.holidays(), None, FormProps::default()).unwrap();

    let err = form.submit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientValidation);
    assert_eq!(form.field_error("name"), Some("Name is required"));
    assert!(form.error_message().is_some());
    assert_eq!(*form.mode(), FormMode::Create);
    assert!(notifier.toasts().is_empty());
}

#[tokio::test]
async fn test_form_create_switches_to_update_mode() {
    let (server, session, notifier) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/holiday"))
        .respond_with(ResponseTemplate::new(201).set_body_json(holiday_json("h1", "New Year")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/holiday/h1"))
        .and(body_json(json!({ "name": "New Year's Day", "entry_date": "2025-01-01", "description": "Holiday" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(holiday_json("h1", "New Year's Day")))
        .expect(1)
        .mount(&server)
        .await;

    let props = FormProps::default().default_values(json!({
        "name": "New Year",
        "entry_date": "2025-01-01"
    }));
    let mut form: EntityForm<Holiday, HolidayRequest> =
        EntityForm::new(session.holidays(), None, props).unwrap();

    form.submit().await.unwrap();
    assert_eq!(*form.mode(), FormMode::Update(EntityId::from("h1")));

    assert!(form.edit(|values| values.name = "New Year's Day".into()).await.is_none());
    let updated = form.submit().await.unwrap();
    assert_eq!(updated.name, "New Year's Day");
    assert_eq!(
        notifier.messages(),
        vec!["Holiday created".to_owned(), "Holiday updated".to_owned()]
    );

    form.reset();
    assert_eq!(form.values().name, "New Year");
}

#[tokio::test]
async fn test_reset_clears_server_error() {
    let (server, session, _) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/holiday"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "message": "Holiday already exists" })))
        .mount(&server)
        .await;

    let props = FormProps::default().default_values(json!({
        "name": "New Year",
        "entry_date": "2025-01-01",
        "description": "Holiday"
    }));
    let mut form: EntityForm<Holiday, HolidayRequest> =
        EntityForm::new(session.holidays(), None, props).unwrap();

    let err = form.submit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(form.error_message(), Some("Holiday already exists".to_owned()));

    form.reset();
    assert_eq!(form.error_message(), None);
    assert_eq!(*form.values(), HolidayRequest::default());
}

#[tokio::test]
async fn test_read_only_form_rejects_without_request() {
    let (server, session, _) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/holiday/h1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(holiday_json("h1", "New Year")))
        .expect(0)
        .mount(&server)
        .await;

    let mut form = open_h1(&session, FormProps::default().read_only(true));
    assert!(form.is_disabled());
    assert!(form.is_field_disabled("name"));

    assert!(form.edit(|values| values.name = "Changed".into()).await.is_none());
    assert_eq!(form.values().name, "New Year");

    let err = form.submit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ClientValidation);
}

#[tokio::test]
async fn test_form_is_disabled_while_saving() {
    let (server, session, _) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/holiday/h1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(holiday_json("h1", "New Year"))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut form = open_h1(&session, FormProps::default());
    let activity = form.activity();
    assert!(!activity.is_disabled());

    let (saved, busy) = tokio::join!(form.submit(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        (activity.is_pending(), activity.is_disabled())
    });
    saved.unwrap();
    assert_eq!(busy, (true, true));
    assert!(!activity.is_disabled());
    assert!(!form.is_pending());
}

#[tokio::test]
async fn test_auto_save_submits_each_edit_in_update_mode() {
    let (server, session, notifier) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/v1/holiday/h1"))
        .and(body_json(json!({ "name": "New Year's Day", "entry_date": "2025-01-01", "description": "Holiday" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(holiday_json("h1", "New Year's Day")))
        .expect(1)
        .mount(&server)
        .await;

    let mut form = open_h1(&session, FormProps::default().auto_save(true));
    let saved = form
        .edit(|values| values.name = "New Year's Day".into())
        .await
        .expect("auto-save submits in update mode")
        .unwrap();
    assert_eq!(saved.name, "New Year's Day");
    assert_eq!(notifier.messages(), vec!["Holiday updated".to_owned()]);
}

#[tokio::test]
async fn test_disabled_and_hidden_fields_are_reported() {
    let (_server, session, _) = setup().await;

    let props = FormProps::default()
        .disable_field("entry_date")
        .hide_field("description");
    let form: EntityForm<Holiday, HolidayRequest> =
        EntityForm::new(session.holidays(), None, props).unwrap();

    assert!(!form.is_disabled());
    assert!(form.is_field_disabled("entry_date"));
    assert!(!form.is_field_disabled("name"));
    assert!(form.is_field_hidden("description"));
    assert!(!form.is_field_hidden("name"));
}
