use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::json;

use crate::engine::{Engine, EngineError, SubmitRequest};
use crate::model::{Actor, ReservationId, catalog};
use crate::session::{LoginError, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub sessions: Arc<SessionStore>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/reservas", post(submit_reservation).get(list_reservations))
        .route("/api/reservas-public", get(list_public))
        .route("/api/reservas/:id/status", patch(decide_reservation))
        .route("/api/periodos", get(list_periods))
        .route("/api/periodos-livres", get(free_periods))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/me", get(me))
        .with_state(state)
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Persistence detail stays in the server log; callers get a generic 500.
fn engine_error(e: EngineError) -> Response {
    match &e {
        EngineError::Validation(_) | EngineError::Conflict(_) => {
            error_json(StatusCode::BAD_REQUEST, &e.to_string())
        }
        EngineError::NotFound(_) => error_json(StatusCode::NOT_FOUND, &e.to_string()),
        EngineError::Unauthorized => error_json(StatusCode::UNAUTHORIZED, &e.to_string()),
        EngineError::Wal(detail) => {
            tracing::error!("persistence failure: {detail}");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "erro interno ao gravar a reserva")
        }
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn resolve_actor(state: &AppState, headers: &HeaderMap) -> Option<Actor> {
    state.sessions.resolve(bearer_token(headers)?)
}

async fn submit_reservation(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Response {
    match state.engine.submit(req).await {
        Ok(reservation) => (StatusCode::CREATED, Json(reservation)).into_response(),
        Err(e) => engine_error(e),
    }
}

async fn list_reservations(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if resolve_actor(&state, &headers).is_none() {
        return error_json(StatusCode::UNAUTHORIZED, "não autenticado");
    }
    Json(state.engine.list_all().await).into_response()
}

async fn list_public(State(state): State<AppState>) -> Response {
    Json(state.engine.list_public().await).into_response()
}

#[derive(Deserialize)]
struct DecideBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    motivo_decisao: Option<String>,
}

async fn decide_reservation(
    State(state): State<AppState>,
    Path(id): Path<ReservationId>,
    headers: HeaderMap,
    Json(body): Json<DecideBody>,
) -> Response {
    let actor = resolve_actor(&state, &headers);
    let status = body.status.unwrap_or_default();
    match state
        .engine
        .decide(id, &status, body.motivo_decisao.as_deref(), actor.as_ref())
        .await
    {
        Ok(reservation) => Json(reservation).into_response(),
        Err(e) => engine_error(e),
    }
}

async fn list_periods() -> Response {
    Json(catalog()).into_response()
}

#[derive(Deserialize)]
struct FreePeriodsQuery {
    #[serde(default)]
    data: Option<String>,
}

async fn free_periods(
    State(state): State<AppState>,
    Query(query): Query<FreePeriodsQuery>,
) -> Response {
    let Some(raw) = query.data.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return error_json(
            StatusCode::BAD_REQUEST,
            "parâmetro \"data\" é obrigatório (YYYY-MM-DD)",
        );
    };
    let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") else {
        return error_json(StatusCode::BAD_REQUEST, "data inválida (use YYYY-MM-DD)");
    };
    let free: Vec<_> = state
        .engine
        .free_periods_for_date(day)
        .await
        .into_iter()
        .map(|p| json!({ "id": p, "label": p.label() }))
        .collect();
    Json(free).into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    #[serde(default)]
    nome: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    senha: String,
}

async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Response {
    match state.sessions.login(&body.nome, &body.email, &body.senha) {
        Ok(issued) => Json(json!({
            "token": issued.token,
            "expira_em": issued.expires_at,
        }))
        .into_response(),
        Err(e @ LoginError::MissingFields) => error_json(StatusCode::BAD_REQUEST, &e.to_string()),
        Err(e @ LoginError::InvalidCredentials) => {
            error_json(StatusCode::UNAUTHORIZED, &e.to_string())
        }
        Err(e @ LoginError::TooManySessions) => {
            error_json(StatusCode::SERVICE_UNAVAILABLE, &e.to_string())
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = bearer_token(&headers) {
        state.sessions.revoke(token);
    }
    Json(json!({ "ok": true })).into_response()
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match resolve_actor(&state, &headers) {
        Some(actor) => Json(actor).into_response(),
        None => error_json(StatusCode::UNAUTHORIZED, "não autenticado"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);
    }
}
