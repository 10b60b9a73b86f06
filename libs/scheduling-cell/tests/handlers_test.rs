use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Datelike, Days, Utc, Weekday};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use scheduling_cell::models::{ClinicDay, SlotTime};
use scheduling_cell::router::{doctor_routes, scheduling_routes, SchedulingState};
use scheduling_cell::store::InMemoryStore;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, TestUser};

const JWT_SECRET: &str = "router-test-secret";

fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        supabase_url: String::new(),
        supabase_service_key: String::new(),
        supabase_jwt_secret: JWT_SECRET.to_string(),
        mailer_url: String::new(),
        mailer_from: String::new(),
    })
}

fn test_app(store: Arc<InMemoryStore>) -> Router {
    let state = Arc::new(SchedulingState::in_memory(test_config(), store));
    Router::new()
        .nest("/appointments", scheduling_routes(state.clone()))
        .nest("/doctors", doctor_routes(state))
}

fn bearer(user: &TestUser) -> String {
    format!(
        "Bearer {}",
        JwtTestUtils::create_test_token(user, JWT_SECRET, None)
    )
}

fn next_monday() -> String {
    let mut date = Utc::now().date_naive() + Days::new(1);
    while date.weekday() != Weekday::Mon {
        date = date + Days::new(1);
    }
    date.format("%Y-%m-%d").to_string()
}

fn post_json(uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn booking_requires_authentication() {
    let store = Arc::new(InMemoryStore::new());
    let doctor = store.add_doctor("Dr. John Doe", "Cardiology");
    let slot = store.add_template(doctor.id, ClinicDay::Monday, SlotTime::from_hm(9, 0));
    let app = test_app(store);

    let request = post_json(
        "/appointments",
        None,
        json!({
            "doctor_id": doctor.id,
            "slot_template_id": slot.id,
            "date": next_monday(),
            "reason": "Check-up",
        }),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_flow_over_http() {
    let store = Arc::new(InMemoryStore::new());
    let doctor = store.add_doctor("Dr. John Doe", "Cardiology");
    let slot = store.add_template(doctor.id, ClinicDay::Monday, SlotTime::from_hm(9, 0));
    let app = test_app(store);

    let alice = TestUser::patient("alice@example.com");
    let monday = next_monday();
    let payload = json!({
        "doctor_id": doctor.id,
        "slot_template_id": slot.id,
        "date": monday,
        "reason": "Check-up",
    });

    let response = app
        .clone()
        .oneshot(post_json("/appointments", Some(&bearer(&alice)), payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["confirmation"]["doctor_name"], json!("Dr. John Doe"));
    assert_eq!(body["confirmation"]["formatted_time"], json!("09:00"));

    // Same slot, same date, different patient: the ledger says no.
    let bob = TestUser::patient("bob@example.com");
    let response = app
        .oneshot(post_json("/appointments", Some(&bearer(&bob)), payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn timeslots_reflect_bookings() {
    let store = Arc::new(InMemoryStore::new());
    let doctor = store.add_doctor("Dr. Jane Smith", "Neurology");
    let slot = store.add_template(doctor.id, ClinicDay::Monday, SlotTime::from_hm(9, 0));
    store.add_template(doctor.id, ClinicDay::Monday, SlotTime::from_hm(9, 30));
    let app = test_app(store);

    let alice = TestUser::patient("alice@example.com");
    let monday = next_monday();

    app.clone()
        .oneshot(post_json(
            "/appointments",
            Some(&bearer(&alice)),
            json!({
                "doctor_id": doctor.id,
                "slot_template_id": slot.id,
                "date": monday,
                "reason": "Check-up",
            }),
        ))
        .await
        .unwrap();

    let uri = format!(
        "/appointments/timeslots?doctor_id={}&date={}",
        doctor.id, monday
    );
    let response = app.oneshot(get(&uri, Some(&bearer(&alice)))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let slots = body_json(response).await;
    let slots = slots.as_array().unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0]["is_booked"], json!(true));
    assert_eq!(slots[1]["is_booked"], json!(false));
}

#[tokio::test]
async fn status_changes_are_staff_only() {
    let store = Arc::new(InMemoryStore::new());
    let doctor = store.add_doctor("Dr. John Doe", "Cardiology");
    let slot = store.add_template(doctor.id, ClinicDay::Monday, SlotTime::from_hm(9, 0));
    let app = test_app(store);

    let alice = TestUser::patient("alice@example.com");
    let response = app
        .clone()
        .oneshot(post_json(
            "/appointments",
            Some(&bearer(&alice)),
            json!({
                "doctor_id": doctor.id,
                "slot_template_id": slot.id,
                "date": next_monday(),
                "reason": "Check-up",
            }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let appointment_id = body["confirmation"]["appointment_id"].as_str().unwrap().to_string();

    let uri = format!("/appointments/{}/status", appointment_id);
    let confirm = json!({ "status": "confirmed" });

    let request = Request::builder()
        .method(Method::PATCH)
        .uri(&uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, bearer(&alice))
        .body(Body::from(confirm.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let staff = TestUser::doctor("dr.doe@example.com");
    let request = Request::builder()
        .method(Method::PATCH)
        .uri(&uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, bearer(&staff))
        .body(Body::from(confirm.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], json!("confirmed"));
}

#[tokio::test]
async fn patients_cannot_read_each_others_appointments() {
    let store = Arc::new(InMemoryStore::new());
    let doctor = store.add_doctor("Dr. John Doe", "Cardiology");
    let slot = store.add_template(doctor.id, ClinicDay::Monday, SlotTime::from_hm(9, 0));
    let app = test_app(store);

    let alice = TestUser::patient("alice@example.com");
    let response = app
        .clone()
        .oneshot(post_json(
            "/appointments",
            Some(&bearer(&alice)),
            json!({
                "doctor_id": doctor.id,
                "slot_template_id": slot.id,
                "date": next_monday(),
                "reason": "Check-up",
            }),
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    let appointment_id = body["confirmation"]["appointment_id"].as_str().unwrap().to_string();
    let uri = format!("/appointments/{}", appointment_id);

    let mallory = TestUser::patient("mallory@example.com");
    let response = app
        .clone()
        .oneshot(get(&uri, Some(&bearer(&mallory))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // The owner and staff both get through.
    let response = app
        .clone()
        .oneshot(get(&uri, Some(&bearer(&alice))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let admin = TestUser::admin("admin@example.com");
    let response = app.oneshot(get(&uri, Some(&bearer(&admin)))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn my_appointments_lists_only_the_callers() {
    let store = Arc::new(InMemoryStore::new());
    let doctor = store.add_doctor("Dr. John Doe", "Cardiology");
    let nine = store.add_template(doctor.id, ClinicDay::Monday, SlotTime::from_hm(9, 0));
    let ten = store.add_template(doctor.id, ClinicDay::Monday, SlotTime::from_hm(10, 0));
    let app = test_app(store);

    let alice = TestUser::patient("alice@example.com");
    let bob = TestUser::patient("bob@example.com");
    let monday = next_monday();

    for (user, slot) in [(&alice, nine.id), (&bob, ten.id)] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/appointments",
                Some(&bearer(user)),
                json!({
                    "doctor_id": doctor.id,
                    "slot_template_id": slot,
                    "date": monday,
                    "reason": "Check-up",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(get("/appointments/my", Some(&bearer(&alice))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let mine = body.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["user_id"], json!(alice.id));
    assert_eq!(mine[0]["slot_template_id"], json!(nine.id));
}

#[tokio::test]
async fn doctor_directory_is_served() {
    let store = Arc::new(InMemoryStore::new());
    let doctor = store.add_doctor("Dr. Emily Brown", "Pediatrics");
    let app = test_app(store);

    let alice = TestUser::patient("alice@example.com");

    let response = app
        .clone()
        .oneshot(get("/doctors", Some(&bearer(&alice))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(get(&format!("/doctors/{}", doctor.id), Some(&bearer(&alice))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], json!("Dr. Emily Brown"));

    let response = app
        .oneshot(get(&format!("/doctors/{}", Uuid::new_v4()), Some(&bearer(&alice))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn day_sheet_requires_staff() {
    let store = Arc::new(InMemoryStore::new());
    let doctor = store.add_doctor("Dr. John Doe", "Cardiology");
    let app = test_app(store);

    let monday = next_monday();
    let uri = format!("/doctors/{}/appointments?date={}", doctor.id, monday);

    let alice = TestUser::patient("alice@example.com");
    let response = app
        .clone()
        .oneshot(get(&uri, Some(&bearer(&alice))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let staff = TestUser::doctor("dr.doe@example.com");
    let response = app.oneshot(get(&uri, Some(&bearer(&staff)))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
