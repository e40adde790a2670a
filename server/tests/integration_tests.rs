use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use patient_dashboard::backend::HttpBackend;
use patient_dashboard::cache::CacheStore;
use patient_dashboard::config::DashboardConfig;
use patient_dashboard::service::{PatientService, PATIENTS_TTL};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const TOKEN: &str = "test-token";

/// Stand-in for the clinical REST backend.
struct Upstream {
    base_url: String,
    patients: Vec<Value>,
    cases: Vec<Value>,
    appointments: Vec<Value>,
}

type Shared = Arc<Mutex<Upstream>>;

#[derive(Deserialize)]
struct PageQuery {
    page: Option<usize>,
    patient: Option<String>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v == format!("Bearer {}", TOKEN))
}

async fn list_patients(
    State(upstream): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "Invalid token."}))).into_response();
    }
    let upstream = upstream.lock().unwrap();
    // Two pages so the envelope's `next` link gets followed.
    let split = upstream.patients.len() / 2;
    let body = match query.page.unwrap_or(1) {
        1 => json!({
            "count": upstream.patients.len(),
            "next": format!("{}/dashboard/api/patients/?page=2", upstream.base_url),
            "results": upstream.patients[..split],
        }),
        _ => json!({
            "count": upstream.patients.len(),
            "next": null,
            "results": upstream.patients[split..],
        }),
    };
    Json(body).into_response()
}

async fn list_cases(State(upstream): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(Value::Array(upstream.lock().unwrap().cases.clone())).into_response()
}

async fn update_patient(
    State(upstream): State<Shared>,
    Path(id): Path<i64>,
    Json(fields): Json<Map<String, Value>>,
) -> Response {
    if let Some(email) = fields.get("email").and_then(Value::as_str) {
        if !email.contains('@') {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"email": ["Enter a valid email address."]})),
            )
                .into_response();
        }
    }

    let mut upstream = upstream.lock().unwrap();
    match upstream.patients.iter_mut().find(|p| p["id"] == id) {
        Some(Value::Object(patient)) => {
            for (key, value) in fields {
                patient.insert(key, value);
            }
            Json(Value::Object(patient.clone())).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_patient(State(upstream): State<Shared>, Path(id): Path<i64>) -> StatusCode {
    let mut upstream = upstream.lock().unwrap();
    let before = upstream.patients.len();
    upstream.patients.retain(|p| p["id"] != id);
    if upstream.patients.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn list_appointments(
    State(upstream): State<Shared>,
    Query(query): Query<PageQuery>,
) -> Json<Value> {
    let patient = query.patient.unwrap_or_default();
    let upstream = upstream.lock().unwrap();
    Json(Value::Array(
        upstream
            .appointments
            .iter()
            .filter(|a| a["patient"].to_string() == patient)
            .cloned()
            .collect(),
    ))
}

async fn update_appointment(
    State(upstream): State<Shared>,
    Path(id): Path<i64>,
    Json(fields): Json<Map<String, Value>>,
) -> Response {
    let mut upstream = upstream.lock().unwrap();
    match upstream.appointments.iter_mut().find(|a| a["id"] == id) {
        Some(Value::Object(appointment)) => {
            for (key, value) in fields {
                appointment.insert(key, value);
            }
            Json(Value::Object(appointment.clone())).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn start_upstream() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let upstream = Arc::new(Mutex::new(Upstream {
        base_url: base_url.clone(),
        patients: vec![
            json!({"id": 1, "full_name": "Ada Obi", "age": "34", "gender": "F",
                   "status": "diagnosed", "email": "ada@example.org",
                   "blood_pressure_systolic": 120, "created_at": "2024-01-05T10:00:00Z"}),
            json!({"id": 2, "full_name": "Ben Ito", "age": 71, "gender": "M",
                   "status": "diagnosed", "heart_rate": "", "diabetes": true}),
            json!({"id": 3, "first_name": "Cleo", "last_name": "Ruiz", "age": null,
                   "gender": "O", "status": "undiagnosed"}),
            json!({"id": 4, "full_name": "Dev Shah", "age": 9, "gender": "M",
                   "status": "recovered"}),
        ],
        cases: vec![
            json!({"id": 10, "patient": 1, "diagnosis_date": "2024-02-01",
                   "disease_detail": {"name": "Asthma"}, "notes": "Inhaler prescribed"}),
            json!({"id": 11, "patient": 2, "diagnosis_date": "2023-11-20T08:30:00",
                   "disease_detail": {"name": "Influenza"}}),
            json!({"id": 12, "patient": 2, "diagnosis_date": "2024-03-15",
                   "disease_detail": {"name": "Pneumonia"}}),
        ],
        appointments: vec![
            json!({"id": 100, "patient": 2, "date": "2024-04-01", "time": "09:30:00",
                   "type": "follow-up", "status": "scheduled"}),
            json!({"id": 101, "patient": 2, "date": "2024-05-01", "time": "11:00:00",
                   "type": "x-ray", "status": "no-show"}),
        ],
    }));

    let app = Router::new()
        .route("/dashboard/api/patients/", get(list_patients))
        .route(
            "/dashboard/api/patients/:id/",
            patch(update_patient).delete(delete_patient),
        )
        .route("/dashboard/api/cases/", get(list_cases))
        .route("/dashboard/api/appointments/", get(list_appointments))
        .route("/dashboard/api/appointments/:id/", patch(update_appointment))
        .with_state(upstream);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base_url
}

async fn start_dashboard(upstream: &str, token: &str) -> String {
    let config = DashboardConfig::new(upstream.to_string()).with_token(token.to_string());
    let backend = HttpBackend::new(&config).expect("Failed to build backend client");
    let service = Arc::new(PatientService::new(
        Arc::new(backend),
        Arc::new(CacheStore::new(PATIENTS_TTL)),
    ));
    let addr = serve(patient_dashboard::router(service)).await;
    format!("http://{}", addr)
}

async fn setup() -> (Client, String) {
    let upstream = start_upstream().await;
    (Client::new(), start_dashboard(&upstream, TOKEN).await)
}

#[tokio::test]
async fn test_health_check() {
    let (client, base) = setup().await;

    let response = client
        .get(format!("{}/health", base))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_list_joins_every_page() {
    let (client, base) = setup().await;

    let body: Value = client
        .get(format!("{}/api/patients", base))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");

    assert_eq!(body["count"], 4);
    let results = body["results"].as_array().unwrap();

    let ben = results.iter().find(|p| p["id"] == 2).unwrap();
    assert_eq!(ben["diagnosis"], "Pneumonia");
    assert_eq!(ben["date"], "2024-03-15");
    assert_eq!(ben["sex"], "Male");
    assert_eq!(ben["history"]["diabetes"], true);

    let ada = results.iter().find(|p| p["id"] == 1).unwrap();
    assert_eq!(ada["age"], 34);
    assert_eq!(ada["notes"], "Inhaler prescribed");

    let cleo = results.iter().find(|p| p["id"] == 3).unwrap();
    assert_eq!(cleo["name"], "Cleo Ruiz");
    assert_eq!(cleo["age"], Value::Null);
    assert_eq!(cleo["diagnosis"], Value::Null);
}

#[tokio::test]
async fn test_filters_combine() {
    let (client, base) = setup().await;

    let body: Value = client
        .get(format!("{}/api/patients", base))
        .query(&[("sex", "Male"), ("status", "diagnosed")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], 2);

    let body: Value = client
        .get(format!("{}/api/patients", base))
        .query(&[("age", "0-18")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], 4);

    let body: Value = client
        .get(format!("{}/api/patients", base))
        .query(&[("search", "ASTH")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["results"][0]["id"], 1);
}

#[tokio::test]
async fn test_stats() {
    let (client, base) = setup().await;

    let stats: Value = client
        .get(format!("{}/api/patients/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(stats["total"], 4);
    assert_eq!(stats["by_status"]["diagnosed"], 2);
    assert_eq!(stats["by_age_bracket"]["65+"], 1);
    assert_eq!(stats["unknown_age"], 1);
}

#[tokio::test]
async fn test_update_patient_resyncs() {
    let (client, base) = setup().await;

    let response = client
        .patch(format!("{}/api/patients/2", base))
        .json(&json!({"status": "recovered", "heart_rate": "", "temperature": "37.2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["status"], "recovered");
    assert_eq!(updated["vitals"]["temperature"], "37.2");
    assert_eq!(updated["vitals"]["heart_rate"], "N/A");

    let body: Value = client
        .get(format!("{}/api/patients", base))
        .query(&[("status", "recovered")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 2);
}

#[tokio::test]
async fn test_invalid_edit_surfaces_field_errors() {
    let (client, base) = setup().await;

    let response = client
        .patch(format!("{}/api/patients/1", base))
        .json(&json!({"age": "thirty"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let report: Value = response.json().await.unwrap();
    assert!(report["fields"]["age"].is_array());

    let response = client
        .patch(format!("{}/api/patients/1", base))
        .json(&json!({"email": "not-an-address"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["fields"]["email"][0], "Enter a valid email address.");
}

#[tokio::test]
async fn test_delete_patient() {
    let (client, base) = setup().await;

    let response = client
        .delete(format!("{}/api/patients/4", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 204);

    let response = client
        .get(format!("{}/api/patients/4", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .delete(format!("{}/api/patients/4", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_appointment_lifecycle() {
    let (client, base) = setup().await;

    let appointments: Value = client
        .get(format!("{}/api/patients/2/appointments", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let list = appointments.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert!(list.iter().any(|a| a["status"] == "other"));

    let response = client
        .post(format!("{}/api/appointments/100/reschedule", base))
        .json(&json!({"date": "2024-04-08", "time": "10:15"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let refreshed: Value = response.json().await.unwrap();
    let moved = refreshed
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["id"] == 100)
        .unwrap();
    assert_eq!(moved["date"], "2024-04-08");
    assert_eq!(moved["time"], "10:15:00");
    assert_eq!(moved["status"], "rescheduled");

    let refreshed: Value = client
        .post(format!("{}/api/appointments/100/cancel", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let cancelled = refreshed
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["id"] == 100)
        .unwrap();
    assert_eq!(cancelled["status"], "cancelled");

    let response = client
        .post(format!("{}/api/appointments/999/complete", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_rejected_token() {
    let upstream = start_upstream().await;
    let base = start_dashboard(&upstream, "wrong-token").await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/patients", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let state: Value = client
        .get(format!("{}/api/state", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["state"], "error");
}
