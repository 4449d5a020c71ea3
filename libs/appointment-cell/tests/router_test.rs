use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Utc, Weekday};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use appointment_cell::appointment_routes;
use shared_utils::test_utils::{next_weekday_at, MockSupabaseResponses, TestConfig};

fn app(mock_server: &MockServer) -> Router {
    let config = TestConfig::with_supabase_url(&mock_server.uri());
    appointment_routes(config.to_arc()).expect("default clinic policy is valid")
}

fn authed(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", "Bearer test-token");

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn admission_body(doctor_id: &str, scheduled_at: chrono::DateTime<Utc>) -> Value {
    json!({
        "patient": {
            "first_name": "Ana",
            "last_name": "López",
            "birth_date": "1990-05-17",
            "phone": "+52 55 1234 5678"
        },
        "appointment": {
            "doctor_id": doctor_id,
            "scheduled_at": scheduled_at.to_rfc3339(),
            "reasons": ["Dolor abdominal"]
        }
    })
}

#[tokio::test]
async fn test_admission_creates_patient_and_appointment() {
    let mock_server = MockServer::start().await;
    let doctor_id = MockSupabaseResponses::new_id();
    let patient_id = MockSupabaseResponses::new_id();
    let appointment_id = MockSupabaseResponses::new_id();
    let scheduled_at = next_weekday_at(Utc::now(), Weekday::Tue, 10, 0);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("birth_date", "eq.1990-05-17"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response(&patient_id, "Ana", "López")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id, &patient_id, Some(&doctor_id), scheduled_at, "PROGRAMADA",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(authed("POST", "/admissions", Some(admission_body(&doctor_id, scheduled_at))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["patient_id"], patient_id);
    assert_eq!(body["appointment_id"], appointment_id);
    assert_eq!(body["status"], "PROGRAMADA");
}

#[tokio::test]
async fn test_admission_conflict_returns_409_with_existing_id() {
    let mock_server = MockServer::start().await;
    let doctor_id = MockSupabaseResponses::new_id();
    let existing_id = MockSupabaseResponses::new_id();
    let scheduled_at = next_weekday_at(Utc::now(), Weekday::Wed, 11, 30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &existing_id, &MockSupabaseResponses::new_id(), Some(&doctor_id), scheduled_at, "CONFIRMADA",
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(authed("POST", "/admissions", Some(admission_body(&doctor_id, scheduled_at))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "SCHEDULE_CONFLICT");
    assert_eq!(body["details"]["existing_appointment_id"], existing_id);
}

#[tokio::test]
async fn test_admission_rule_violation_returns_400() {
    let mock_server = MockServer::start().await;
    let scheduled_at = next_weekday_at(Utc::now(), Weekday::Sun, 10, 0);

    let response = app(&mock_server)
        .oneshot(authed(
            "POST",
            "/admissions",
            Some(admission_body(&MockSupabaseResponses::new_id(), scheduled_at)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "WEEKDAY_DISALLOWED");
}

#[tokio::test]
async fn test_admission_store_outage_returns_503() {
    let mock_server = MockServer::start().await;
    let scheduled_at = next_weekday_at(Utc::now(), Weekday::Thu, 9, 0);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(503).set_body_json(
            MockSupabaseResponses::error_response("upstream unavailable", "PGRST000")
        ))
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(authed(
            "POST",
            "/admissions",
            Some(admission_body(&MockSupabaseResponses::new_id(), scheduled_at)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_validate_reports_violation_without_store_access() {
    let mock_server = MockServer::start().await;
    let sunday = next_weekday_at(Utc::now(), Weekday::Sun, 10, 0);
    let tuesday = next_weekday_at(Utc::now(), Weekday::Tue, 10, 0);

    let response = app(&mock_server)
        .oneshot(authed("POST", "/validate", Some(json!({ "scheduled_at": sunday.to_rfc3339() }))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["violation"]["kind"], "WEEKDAY_DISALLOWED");

    let response = app(&mock_server)
        .oneshot(authed("POST", "/validate", Some(json!({ "scheduled_at": tuesday.to_rfc3339() }))))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["valid"], true);

    assert!(mock_server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_get_appointment_lists_allowed_actions() {
    let mock_server = MockServer::start().await;
    let appointment_id = MockSupabaseResponses::new_id();
    let scheduled_at = next_weekday_at(Utc::now(), Weekday::Mon, 9, 30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id, &MockSupabaseResponses::new_id(), None, scheduled_at, "CANCELADA",
            )
        ])))
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(authed("GET", &format!("/{}", appointment_id), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], "CANCELADA");
    assert_eq!(body["allowed_actions"], json!(["reschedule", "view_history"]));
}

#[tokio::test]
async fn test_check_in_on_completed_appointment_is_rejected() {
    let mock_server = MockServer::start().await;
    let appointment_id = MockSupabaseResponses::new_id();
    let scheduled_at = next_weekday_at(Utc::now(), Weekday::Fri, 12, 0);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &appointment_id, &MockSupabaseResponses::new_id(), None, scheduled_at, "COMPLETADA",
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(authed("POST", &format!("/{}/check-in", appointment_id), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "INVALID_CURRENT_STATUS");
}

#[tokio::test]
async fn test_confirm_persists_new_status() {
    let mock_server = MockServer::start().await;
    let appointment_id = MockSupabaseResponses::new_id();
    let patient_id = MockSupabaseResponses::new_id();
    let scheduled_at = next_weekday_at(Utc::now(), Weekday::Sat, 14, 30);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(&appointment_id, &patient_id, None, scheduled_at, "PROGRAMADA")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(&appointment_id, &patient_id, None, scheduled_at, "CONFIRMADA")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(authed("POST", &format!("/{}/confirm", appointment_id), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], "CONFIRMADA");
}

#[tokio::test]
async fn test_unknown_appointment_returns_404() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let response = app(&mock_server)
        .oneshot(authed("POST", &format!("/{}/cancel", MockSupabaseResponses::new_id()), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_slots_skip_booked_times() {
    let mock_server = MockServer::start().await;
    let doctor_id = MockSupabaseResponses::new_id();
    let tuesday = next_weekday_at(Utc::now(), Weekday::Tue, 9, 0);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                &MockSupabaseResponses::new_id(), &MockSupabaseResponses::new_id(), Some(&doctor_id), tuesday, "PROGRAMADA",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = format!("/slots?doctor_id={}&date={}&limit=3", doctor_id, tuesday.date_naive());
    let response = app(&mock_server)
        .oneshot(authed("GET", &uri, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 3);
    let first: chrono::DateTime<Utc> = serde_json::from_value(slots[0].clone()).unwrap();
    assert_eq!(first, tuesday + chrono::Duration::minutes(30));
}
