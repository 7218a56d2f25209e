//! End-to-end tests over a real server socket: submit → conflict → login →
//! decide → public listing, the whole workflow a browser client would drive.

use std::sync::Arc;

use serde_json::{Value, json};

use auditorio::engine::Engine;
use auditorio::http::{AppState, router};
use auditorio::notify::{LogMailer, spawn_dispatcher};
use auditorio::session::SessionStore;

const STAFF_PASSWORD: &str = "segredo";

async fn start_server() -> String {
    let dir = std::env::temp_dir().join("auditorio_test_http");
    std::fs::create_dir_all(&dir).unwrap();
    let wal_path = dir.join(format!("{}.wal", ulid::Ulid::new()));

    let notify = spawn_dispatcher(Arc::new(LogMailer), "http://localhost:3000".into());
    let engine = Arc::new(Engine::new(wal_path, notify).unwrap());
    let sessions = Arc::new(SessionStore::new(
        STAFF_PASSWORD.into(),
        chrono::Duration::hours(8),
    ));
    let app = router(AppState { engine, sessions });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn submission(period: &str, date: &str) -> Value {
    json!({
        "date_start": date,
        "period": period,
        "request_type": "EXTERNA",
        "institution": "Defesa Civil",
        "responsible": "Ana Souza",
        "email": "ana@example.org",
        "phone": "27 99999-0000",
        "purpose": "Treinamento de brigada",
    })
}

async fn login(client: &reqwest::Client, base: &str) -> String {
    let resp = client
        .post(format!("{base}/api/login"))
        .json(&json!({
            "nome": "Sgt. Moreira",
            "email": "moreira@example.org",
            "senha": STAFF_PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn full_reservation_workflow() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    // Public submission succeeds and starts PENDENTE.
    let resp = client
        .post(format!("{base}/api/reservas"))
        .json(&submission("MANHA", "2025-06-10"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["status"], "PENDENTE");
    assert_eq!(created["date_end"], "2025-06-10");
    let id = created["id"].as_u64().unwrap();

    // The same slot is now taken.
    let resp = client
        .post(format!("{base}/api/reservas"))
        .json(&submission("MANHA", "2025-06-10"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert!(err["error"].as_str().unwrap().contains("reservado"));

    // The occupied period disappears from the free list.
    let resp = client
        .get(format!("{base}/api/periodos-livres?data=2025-06-10"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let free: Value = resp.json().await.unwrap();
    let ids: Vec<&str> = free
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["INTEGRAL", "TARDE", "NOITE"]);

    // Deciding without a session is rejected.
    let resp = client
        .patch(format!("{base}/api/reservas/{id}/status"))
        .json(&json!({ "status": "APROVADA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // Bad password is rejected.
    let resp = client
        .post(format!("{base}/api/login"))
        .json(&json!({ "nome": "X", "email": "x@y.z", "senha": "chute" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let token = login(&client, &base).await;

    // Denying without a reason is a validation error.
    let resp = client
        .patch(format!("{base}/api/reservas/{id}/status"))
        .bearer_auth(&token)
        .json(&json!({ "status": "NEGADA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // Denying with a reason works and records the actor.
    let resp = client
        .patch(format!("{base}/api/reservas/{id}/status"))
        .bearer_auth(&token)
        .json(&json!({ "status": "NEGADA", "motivo_decisao": "auditório em manutenção" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let decided: Value = resp.json().await.unwrap();
    assert_eq!(decided["status"], "NEGADA");
    assert_eq!(decided["decided_by"], "Sgt. Moreira");
    assert_eq!(decided["decision_reason"], "auditório em manutenção");

    // A denied reservation no longer blocks the slot.
    let resp = client
        .post(format!("{base}/api/reservas"))
        .json(&submission("MANHA", "2025-06-10"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // Public listing hides the denied record and its decision metadata.
    let resp = client
        .get(format!("{base}/api/reservas-public"))
        .send()
        .await
        .unwrap();
    let public: Value = resp.json().await.unwrap();
    let entries = public.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_ne!(entries[0]["id"].as_u64().unwrap(), id);
    assert!(entries[0].get("decided_by").is_none());

    // Staff listing shows both, pending first.
    let resp = client
        .get(format!("{base}/api/reservas"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let all: Value = resp.json().await.unwrap();
    let entries = all.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["status"], "PENDENTE");
    assert_eq!(entries[1]["status"], "NEGADA");
}

#[tokio::test]
async fn unknown_reservation_is_not_found() {
    let base = start_server().await;
    let client = reqwest::Client::new();
    let token = login(&client, &base).await;

    let resp = client
        .patch(format!("{base}/api/reservas/9999/status"))
        .bearer_auth(&token)
        .json(&json!({ "status": "APROVADA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn catalog_is_served_in_order() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/api/periodos")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let catalog: Value = resp.json().await.unwrap();
    let ids: Vec<&str> = catalog
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["INTEGRAL", "MANHA", "TARDE", "NOITE"]);
    assert_eq!(catalog[0]["label"], "Integral (08h às 18h)");
}

#[tokio::test]
async fn free_periods_requires_date_param() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/api/periodos-livres"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .get(format!("{base}/api/periodos-livres?data=10-06-2025"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn session_lifecycle_over_http() {
    let base = start_server().await;
    let client = reqwest::Client::new();

    // No token → 401.
    let resp = client.get(format!("{base}/api/me")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let token = login(&client, &base).await;

    let resp = client
        .get(format!("{base}/api/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["name"], "Sgt. Moreira");

    // Logout revokes the token.
    let resp = client
        .post(format!("{base}/api/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("{base}/api/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}
