use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use dayplan_core::repo::primitive_repo::PrimitiveRepository;
use dayplan_core::{open_db, open_db_in_memory, Habit, HabitSchedule, SqliteDocumentStore, Task};
use dayplan_http::{router, AppState};
use rusqlite::Connection;
use serde_json::{json, Value};
use tower::ServiceExt;

const USER: &str = "user-1";

fn app_with(seed: impl FnOnce(&Connection)) -> Router {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    router(AppState::new(conn))
}

fn empty_app() -> Router {
    app_with(|_| {})
}

fn seed_habit_and_task(conn: &Connection) {
    let store = SqliteDocumentStore::try_new(conn).unwrap();
    let primitives = PrimitiveRepository::new(&store);
    primitives
        .insert_habit(&Habit::new("h1", USER, "Meditate", HabitSchedule::Daily))
        .unwrap();
    let mut task = Task::new("t1", USER, "Pay rent");
    task.due_date = Some("2026-01-05".to_string());
    primitives.insert_task(&task).unwrap();
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", USER);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = empty_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn missing_user_header_is_unauthorized() {
    let app = empty_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/days/2026-01-05/blocks")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_dates_are_rejected() {
    let app = empty_app();
    for uri in ["/days/2026-1-5/blocks", "/days/2026-02-30/blocks", "/days/today/blocks"] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn day_listing_merges_projected_items_in_canonical_order() {
    let app = app_with(seed_habit_and_task);
    let (status, body) = send(&app, Method::GET, "/days/2026-01-05/blocks", None).await;

    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["id"], json!("proj_habit_h1"));
    assert_eq!(items[0]["sectionId"], json!("morning"));
    assert_eq!(items[1]["id"], json!("proj_todo_t1"));
    assert!(items.iter().all(|item| item["isProjected"] == json!(true)));
}

#[tokio::test]
async fn listing_filters_and_resolves() {
    let app = app_with(seed_habit_and_task);
    let (status, body) = send(
        &app,
        Method::GET,
        "/days/2026-01-05/blocks?sectionId=afternoon&resolve=true",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let items = body.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["typeId"], json!("todo"));
    assert_eq!(items[0]["display"]["typeName"], json!("To-do"));
    assert_eq!(items[0]["display"]["subtitle"], json!("active"));
}

#[tokio::test]
async fn native_block_lifecycle() {
    let app = empty_app();
    let (status, created) = send(
        &app,
        Method::POST,
        "/days/2026-01-05/blocks",
        Some(json!({"typeId": "sleep", "data": {"hours": 7.5}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created.get("isProjected").is_none());
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/days/2026-01-05/blocks/{id}");

    let (status, patched) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({"data": {"quality": "good"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["data"], json!({"hours": 7.5, "quality": "good"}));

    let (status, moved) = send(
        &app,
        Method::PATCH,
        &format!("{uri}/move"),
        Some(json!({"sectionId": "evening", "order": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["sectionId"], json!("evening"));

    let (status, deleted) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["effect"]["kind"], json!("blockRemoved"));

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn create_errors_carry_status_and_details() {
    let app = empty_app();
    let cases = [
        (json!({"typeId": "mood"}), StatusCode::BAD_REQUEST),
        (json!({"typeId": "todo"}), StatusCode::BAD_REQUEST),
        (json!({"typeId": "checklist"}), StatusCode::GONE),
        (json!({"typeId": "mood", "data": {"rating": 5}, "date": "x"}), StatusCode::BAD_REQUEST),
    ];
    for (body, expected) in cases {
        let (status, response) =
            send(&app, Method::POST, "/days/2026-01-05/blocks", Some(body.clone())).await;
        assert_eq!(status, expected, "body {body}");
        assert!(response["error"].is_string());
    }

    let (_, response) = send(
        &app,
        Method::POST,
        "/days/2026-01-05/blocks",
        Some(json!({"typeId": "mood"})),
    )
    .await;
    assert_eq!(response["details"]["fields"][0]["field"], json!("rating"));

    let body = json!({"id": "fixed", "typeId": "journal"});
    let (status, _) = send(&app, Method::POST, "/days/2026-01-05/blocks", Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = send(&app, Method::POST, "/days/2026-01-05/blocks", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn malformed_json_body_is_bad_request() {
    let app = empty_app();
    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/days/2026-01-05/blocks")
                .header("x-user-id", USER)
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn by_type_creates_then_updates() {
    let app = empty_app();
    let uri = "/days/2026-01-05/blocks/by-type/mood";

    let (status, first) = send(&app, Method::PATCH, uri, Some(json!({"data": {"rating": 6}}))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, second) = send(&app, Method::PATCH, uri, Some(json!({"data": {"rating": 8}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["data"]["rating"], json!(8));

    let (_, listed) = send(&app, Method::GET, "/days/2026-01-05/blocks?typeId=mood", None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let expectations = [
        ("checklist", StatusCode::GONE),
        ("habits", StatusCode::BAD_REQUEST),
        ("water", StatusCode::NOT_FOUND),
        ("meal", StatusCode::CONFLICT),
    ];
    for (type_id, expected) in expectations {
        let uri = format!("/days/2026-01-05/blocks/by-type/{type_id}");
        let (status, _) = send(&app, Method::PATCH, &uri, Some(json!({}))).await;
        assert_eq!(status, expected, "type {type_id}");
    }
}

#[tokio::test]
async fn projected_blocks_route_to_primitives() {
    let app = app_with(seed_habit_and_task);

    let (status, habit) = send(
        &app,
        Method::PATCH,
        "/days/2026-01-05/blocks/proj_habit_h1",
        Some(json!({"data": {"completed": true}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(habit["isProjected"], json!(true));
    assert_eq!(habit["data"]["status"], json!("completed"));

    let (status, _) = send(
        &app,
        Method::PATCH,
        "/days/2026-01-05/blocks/proj_todo_t1",
        Some(json!({"isExpanded": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, deleted) = send(
        &app,
        Method::DELETE,
        "/days/2026-01-05/blocks/proj_todo_t1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["effect"], json!({"kind": "taskRemoved", "subtasks": 0}));

    let (status, _) = send(&app, Method::GET, "/days/2026-01-06/blocks/proj_habit_missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn custom_block_types_can_be_registered_and_used() {
    let app = empty_app();
    let definition = json!({
        "id": "water",
        "name": "Water",
        "subtitleTemplate": "{glasses} glasses",
        "dataSchema": {
            "fields": [{"id": "glasses", "type": "number", "required": true, "min": 0}],
            "additionalProperties": false
        }
    });
    let (status, created) = send(&app, Method::POST, "/block-types", Some(definition.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["category"], json!("custom"));
    let (status, _) = send(&app, Method::POST, "/block-types", Some(definition)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, listed) = send(&app, Method::GET, "/block-types", None).await;
    assert!(listed
        .as_array()
        .unwrap()
        .iter()
        .any(|block_type| block_type["id"] == json!("water")));

    let (status, _) = send(
        &app,
        Method::POST,
        "/days/2026-01-05/blocks",
        Some(json!({"typeId": "water", "data": {"glasses": 4}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, resolved) = send(&app, Method::GET, "/days/2026-01-05/blocks?resolve=1", None).await;
    assert_eq!(resolved[0]["display"]["subtitle"], json!("4 glasses"));
}

#[tokio::test]
async fn file_backed_database_persists_across_routers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dayplan.sqlite3");

    let app = router(AppState::new(open_db(&path).unwrap()));
    let (status, _) = send(
        &app,
        Method::POST,
        "/days/2026-01-05/blocks",
        Some(json!({"id": "j1", "typeId": "journal"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    drop(app);

    let reopened = router(AppState::new(open_db(&path).unwrap()));
    let (status, block) = send(&reopened, Method::GET, "/days/2026-01-05/blocks/j1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(block["typeId"], json!("journal"));
}
