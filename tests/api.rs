// HTTP API tests - drive the router in-process against an in-memory database
#![cfg(feature = "server")]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use fleet_journal::entities::user::seed_admin;
use fleet_journal::server::{build_router, AppState};
use fleet_journal::{DatabaseLocation, Settings};

const FORM: &str = "application/x-www-form-urlencoded";

fn test_app() -> Router {
    let conn = DatabaseLocation::InMemory.open().unwrap();
    seed_admin(&conn, "secret").unwrap();
    build_router(AppState::new(conn, Settings::default()))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, req).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, token: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, FORM)
        .body(Body::from(form.to_string()))
        .unwrap()
}

async fn login(app: &Router) -> String {
    let req = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, FORM)
        .body(Body::from("username=admin&password=secret"))
        .unwrap();

    let (status, body) = send_json(app, req).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["token"].as_str().unwrap().to_string()
}

const VEHICLE: &str = "brand=Toyota&model=Camry&year=2021&engine_volume=2.5&vin_code=VIN001\
                       &license_plate=AA1234BB&call_sign=T-01&mileage=45000&cost=18500";

#[tokio::test]
async fn test_health_needs_no_session() {
    let app = test_app();
    let req = Request::builder().uri("/api/health").body(Body::empty()).unwrap();

    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], "OK");
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let app = test_app();

    let req = Request::builder().uri("/api/vehicles").body(Body::empty()).unwrap();
    let (status, body) = send_json(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, get("/api/vehicles", "not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wrong_credentials_rejected() {
    let app = test_app();
    let attempt = |form: &'static str| {
        Request::builder()
            .method("POST")
            .uri("/api/login")
            .header(header::CONTENT_TYPE, FORM)
            .body(Body::from(form))
            .unwrap()
    };

    let (status, _) = send(&app, attempt("username=admin&password=nope")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send_json(&app, attempt("username=ghost&password=secret")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid username or password");

    // A failed attempt does not block the next good one
    login(&app).await;
}

#[tokio::test]
async fn test_session_cookie_and_logout() {
    let app = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/login")
        .header(header::CONTENT_TYPE, FORM)
        .body(Body::from("username=admin&password=secret"))
        .unwrap();

    let response = app.clone().oneshot(req).await.unwrap();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("fleet_session="));

    let with_cookie = |method: &str, uri: &str| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&app, with_cookie("GET", "/api/dashboard")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, with_cookie("POST", "/api/logout")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, with_cookie("GET", "/api/dashboard")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_vehicle_and_duplicate_plate() {
    let app = test_app();
    let token = login(&app).await;

    let (status, body) = send_json(&app, post("/api/vehicles", &token, VEHICLE)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["call_sign"], "T-01");
    assert_eq!(body["data"]["status"], "active");

    let duplicate = VEHICLE.replace("T-01", "T-02").replace("VIN001", "VIN002");
    let (status, body) = send_json(&app, post("/api/vehicles", &token, &duplicate)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("license plate"));

    let (_, body) = send_json(&app, get("/api/vehicles", &token)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, get("/api/vehicles/999", &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_append_and_delete_update_cashflow() {
    let app = test_app();
    let token = login(&app).await;

    let (status, body) = send_json(
        &app,
        post(
            "/api/events",
            &token,
            "date=2024-01-01&event_type=income&subtype=RENT&amount=500&description=weekly",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let event_id = body["data"]["id"].as_i64().unwrap();

    send(
        &app,
        post("/api/events", &token, "date=2024-01-01T14:30&event_type=expense&subtype=FUEL&amount=100"),
    )
    .await;

    let (_, body) = send_json(&app, get("/api/cashflow", &token)).await;
    let entry = &body["data"]["entries"][0];
    assert_eq!(entry["date"], "2024-01-01");
    assert_eq!(entry["income"], 500.0);
    assert_eq!(entry["expenses"], 100.0);
    assert_eq!(entry["balance"], 400.0);

    let (status, _) = send(&app, post(&format!("/api/events/{}/delete", event_id), &token, "")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send_json(&app, get("/api/cashflow", &token)).await;
    assert_eq!(body["data"]["entries"][0]["income"], 0.0);
    assert_eq!(body["data"]["entries"][0]["balance"], -100.0);

    let (_, body) = send_json(&app, get("/api/cashflow/audit", &token)).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_float_style_amount_and_ledger_overflow() {
    let app = test_app();
    let token = login(&app).await;

    let (status, body) = send_json(
        &app,
        post("/api/events", &token, "date=2024-01-01&event_type=income&subtype=RENT&amount=12.345"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let amount = body["data"]["amount"].as_f64().unwrap();
    assert!((amount - 12.35).abs() < 1e-9);

    let (status, _) = send(
        &app,
        post("/api/events", &token, "date=2024-01-02&event_type=income&subtype=RENT&amount=92233720368547758"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send_json(
        &app,
        post("/api/events", &token, "date=2024-01-02&event_type=income&subtype=RENT&amount=1"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = send_json(&app, get("/api/events", &token)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_event_type_and_missing_vehicle() {
    let app = test_app();
    let token = login(&app).await;

    let (status, _) = send(
        &app,
        post("/api/events", &token, "date=2024-01-01&event_type=gift&subtype=X&amount=5"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        post("/api/events", &token, "date=2024-01-01&event_type=expense&subtype=FUEL&amount=5&vehicle_id=42"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send_json(&app, get("/api/cashflow", &token)).await;
    assert!(body["data"]["entries"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_manual_adjustment_posts_events() {
    let app = test_app();
    let token = login(&app).await;

    let (status, body) = send_json(
        &app,
        post("/api/cashflow/adjust", &token, "date=2024-02-01&income=250&expenses=&credit_load=1000"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = send_json(&app, get("/api/cashflow", &token)).await;
    assert_eq!(body["data"]["totals"]["balance"], -750.0);

    let (status, _) = send(
        &app,
        post("/api/cashflow/adjust", &token, "date=01.02.2024&income=5"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_event_types_listing() {
    let app = test_app();
    let token = login(&app).await;

    let (status, body) = send_json(&app, get("/api/events/types", &token)).await;
    assert_eq!(status, StatusCode::OK);

    let types = body["data"].as_array().unwrap();
    assert_eq!(types.len(), 4);
    assert!(types.iter().any(|t| t["event_type"] == "investment"
        && t["subtypes"].as_array().unwrap().iter().any(|s| s == "CREDIT")));
}

#[tokio::test]
async fn test_csv_report_download() {
    let app = test_app();
    let token = login(&app).await;
    send(&app, post("/api/vehicles", &token, VEHICLE)).await;

    let response = app.clone().oneshot(get("/api/reports/vehicles", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=\"vehicles_report.csv\""
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let mut lines = text.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Call sign,Brand,Model,Year,License plate,Mileage,Cost,Status"
    );
    assert_eq!(
        lines.next().unwrap(),
        "T-01,Toyota,Camry,2021,AA1234BB,\"45,000 km\",\"18,500.00 ₴\",active"
    );

    let (status, _) = send(&app, get("/api/reports/payroll", &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
