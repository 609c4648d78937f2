use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use mediateca::application::auth::Authorizer;
use mediateca::application::contents::ContentService;
use mediateca::application::definitions::{DefinitionService, DefinitionSource};
use mediateca::application::dispatch::Dispatcher;
use mediateca::application::files::FileGateway;
use mediateca::application::messaging::UpdateBus;
use mediateca::application::profiles::ProfileService;
use mediateca::application::repos::{ContentStore, ProfileStore};
use mediateca::application::search::SearchService;
use mediateca::cache::{ListingCache, MemoryListingCache};
use mediateca::infra::auth::RoleBasedAuthorizer;
use mediateca::infra::bus::InProcessBus;
use mediateca::infra::definitions::FsDefinitionSource;
use mediateca::infra::files::NoopFileGateway;
use mediateca::infra::http::{ApiState, build_router};
use mediateca::infra::store::{MemoryContentStore, MemoryProfileStore};
use serde_json::{Value as Json, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tower::ServiceExt;

const FILES_BASE: &str = "https://files.mediateca.example";

const EDITOR: &[(&str, &str)] = &[
    ("x-user-id", "editor-1"),
    ("x-device-id", "desk-1"),
    ("x-roles", "editor"),
];
const VIEWER: &[(&str, &str)] = &[("x-user-id", "viewer-1"), ("x-device-id", "tablet-7")];

fn test_app(definitions_dir: &Path) -> Router {
    let cache = Arc::new(MemoryListingCache::new(64));
    let page_cache: Arc<dyn ListingCache> = cache.clone();
    let hint_cache: Arc<dyn ListingCache> = cache.clone();
    let store: Arc<dyn ContentStore> = Arc::new(MemoryContentStore::new(
        Some(hint_cache),
        Duration::from_secs(900),
    ));
    let profiles: Arc<dyn ProfileStore> = Arc::new(MemoryProfileStore::new());
    let files: Arc<dyn FileGateway> = Arc::new(NoopFileGateway);
    let authorizer: Arc<dyn Authorizer> = Arc::new(RoleBasedAuthorizer);
    let bus = Arc::new(InProcessBus::new(8));
    let update_bus: Arc<dyn UpdateBus> = bus.clone();
    let source: Arc<dyn DefinitionSource> = Arc::new(FsDefinitionSource::new(definitions_dir));

    let search = SearchService::new(
        store.clone(),
        page_cache,
        files.clone(),
        authorizer.clone(),
        FILES_BASE,
        Duration::from_secs(900),
    );
    let contents = ContentService::new(store, files, authorizer.clone(), update_bus, FILES_BASE);
    let profile_service = ProfileService::new(profiles, authorizer);
    let definitions = DefinitionService::new(source);
    let dispatcher = Dispatcher::new(search, contents, profile_service, definitions);

    build_router(ApiState {
        dispatcher: Arc::new(dispatcher),
    })
}

fn request(
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Json>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Json) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Json::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn upcoming_session(title: &str) -> Json {
    let starting = (OffsetDateTime::now_utc() + time::Duration::hours(2))
        .format(&Rfc3339)
        .unwrap();
    json!({
        "Title": title,
        "MediaURI": format!("{FILES_BASE}/media/session.mp4"),
        "StartingTime": starting,
        "Status": "Published",
    })
}

#[tokio::test]
async fn content_lifecycle_over_http() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());

    let (status, created) = send(
        &app,
        request(
            Method::POST,
            "/content",
            EDITOR,
            Some(upcoming_session("Orientation day")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["ID"].as_str().expect("created items carry an id").to_owned();
    assert_eq!(
        created["MediaURI"],
        format!("{FILES_BASE}/media/session.mp4")
    );

    let (status, fetched) = send(
        &app,
        request(Method::GET, &format!("/content/{id}"), VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["Title"], "Orientation day");

    let (status, listing) = send(
        &app,
        request(Method::GET, "/content/search", VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["Objects"][0]["Title"], "Orientation day");
    assert_eq!(listing["Pagination"]["TotalRecords"], 1);

    let (status, updated) = send(
        &app,
        request(
            Method::PUT,
            &format!("/content/{id}"),
            EDITOR,
            Some(json!({"Summary": "What to bring and where to park"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["Summary"], "What to bring and where to park");

    let (status, _) = send(
        &app,
        request(Method::DELETE, &format!("/content/{id}"), EDITOR, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, gone) = send(
        &app,
        request(Method::GET, &format!("/content/{id}"), VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(gone["error"]["code"], "not_found");
}

#[tokio::test]
async fn search_payload_rides_the_x_request_parameter() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());
    for title in ["First light", "Second wind"] {
        let (status, _) = send(
            &app,
            request(Method::POST, "/content", EDITOR, Some(upcoming_session(title))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let encoded: String = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("x-request", r#"{"Pagination":{"PageSize":1,"PageNumber":1}}"#)
        .finish();
    let (status, listing) = send(
        &app,
        request(
            Method::GET,
            &format!("/content/search?{encoded}"),
            VIEWER,
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["Objects"].as_array().map(Vec::len), Some(1));
    assert_eq!(listing["Pagination"]["TotalPages"], 2);
}

#[tokio::test]
async fn oversized_trusted_total_is_served_not_crashed() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());

    let (status, listing) = send(
        &app,
        request(
            Method::GET,
            "/content/search",
            &[],
            Some(json!({"Pagination": {"TotalRecords": i64::MAX}})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["Pagination"]["TotalRecords"], i64::MAX);
    assert_eq!(listing["Pagination"]["TotalPages"], u32::MAX);
    assert_eq!(listing["Objects"], json!([]));
}

#[tokio::test]
async fn counters_mode_over_http() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());
    let (_, created) = send(
        &app,
        request(
            Method::POST,
            "/content",
            EDITOR,
            Some(upcoming_session("Counted session")),
        ),
    )
    .await;
    let id = created["ID"].as_str().unwrap().to_owned();

    let (status, envelope) = send(
        &app,
        request(
            Method::GET,
            &format!("/content/counters?x-object-id={id}&x-action=View"),
            VIEWER,
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let view = envelope["Counters"]
        .as_array()
        .unwrap()
        .iter()
        .find(|counter| counter["Type"] == "View")
        .expect("the view counter must be present");
    assert_eq!(view["Total"], 1);
}

#[tokio::test]
async fn anonymous_writes_are_denied() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());

    let (status, body) = send(
        &app,
        request(
            Method::POST,
            "/content",
            &[],
            Some(upcoming_session("Sneaky session")),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "access_denied");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn unknown_objects_are_rejected() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());

    let (status, body) = send(&app, request(Method::GET, "/widgets", VIEWER, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("widgets")
    );
}

#[tokio::test]
async fn unsupported_verbs_are_not_allowed() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());

    let (status, body) = send(
        &app,
        request(Method::DELETE, "/profile/viewer-1", VIEWER, None),
    )
    .await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"]["code"], "method_not_allowed");
}

#[tokio::test]
async fn non_json_bodies_are_rejected() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());

    let raw = Request::builder()
        .method(Method::POST)
        .uri("/content")
        .header("x-user-id", "editor-1")
        .header("x-roles", "editor")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, raw).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn profile_flow_over_http() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());
    let owner: &[(&str, &str)] = &[("x-user-id", "listener-9")];

    let (status, created) = send(
        &app,
        request(Method::POST, "/profile/listener-9", owner, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["ID"], "listener-9");
    assert_eq!(created["Favorites"], json!([]));

    let (status, updated) = send(
        &app,
        request(
            Method::PUT,
            "/profile/listener-9",
            owner,
            Some(json!({"Favorites": ["a-1", "b-2"]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["Favorites"], json!(["a-1", "b-2"]));

    let (status, body) = send(
        &app,
        request(Method::GET, "/profile/listener-9", VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "access_denied");

    let (status, body) = send(
        &app,
        request(Method::POST, "/profile/someone-else", owner, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "access_denied");
}

#[tokio::test]
async fn missing_profile_is_created_for_its_owner() {
    let definitions = tempfile::tempdir().unwrap();
    let app = test_app(definitions.path());

    let (status, profile) = send(
        &app,
        request(
            Method::GET,
            "/profile/fresh-user",
            &[("x-user-id", "fresh-user")],
            None,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["ID"], "fresh-user");
    assert_eq!(profile["Favorites"], json!([]));
}

#[tokio::test]
async fn definitions_come_from_files() {
    let definitions = tempfile::tempdir().unwrap();
    std::fs::write(
        definitions.path().join("categories.json"),
        "[\r\n  {\"ID\": 1, \"Title\": \"Engineering\"}\r\n]",
    )
    .unwrap();
    let app = test_app(definitions.path());

    let (status, sets) = send(
        &app,
        request(Method::GET, "/definitions/categories", VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sets.as_array().map(Vec::len), Some(1));
    assert_eq!(sets[0]["Title"], "Engineering");

    let (status, body) = send(
        &app,
        request(Method::GET, "/definitions/groups", VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = send(
        &app,
        request(Method::GET, "/definitions/everything", VIEWER, None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}
