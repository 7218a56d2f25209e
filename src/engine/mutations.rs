use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::limits::*;
use crate::model::*;
use crate::notify::NotifyTask;

use super::conflict::{find_conflict, validate_range};
use super::{Engine, EngineError};

/// Raw submission payload as received from the public form. Everything is
/// optional here so the engine owns the required-field checks and their
/// distinct rejections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub date_start: Option<String>,
    #[serde(default)]
    pub date_end: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub request_type: Option<String>,
    #[serde(default)]
    pub institution: Option<String>,
    #[serde(default)]
    pub responsible: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub attachment_url: Option<String>,
}

fn required<'a>(
    field: &'a Option<String>,
    err: &'static str,
) -> Result<&'a str, EngineError> {
    match field.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(EngineError::Validation(err)),
    }
}

fn bounded(value: &str, max: usize, err: &'static str) -> Result<(), EngineError> {
    if value.len() > max {
        return Err(EngineError::Validation(err));
    }
    Ok(())
}

fn parse_date(value: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| EngineError::Validation("data inválida (use YYYY-MM-DD)"))
}

/// Optional free text: trimmed, empty collapsed to None, length-bounded.
fn optional_text(
    field: &Option<String>,
    max: usize,
    err: &'static str,
) -> Result<Option<String>, EngineError> {
    match field.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => {
            bounded(v, max, err)?;
            Ok(Some(v.to_string()))
        }
        _ => Ok(None),
    }
}

impl Engine {
    /// Create a new reservation. Validation order (each step a distinct
    /// rejection): required fields → period → request type → date ordering →
    /// conflict. The conflict check and the insert run under one lane write
    /// lock, so concurrent overlapping submissions for the same period
    /// serialize and exactly one wins.
    pub async fn submit(&self, req: SubmitRequest) -> Result<Reservation, EngineError> {
        let date_start_raw = required(&req.date_start, "campo obrigatório: date_start")?;
        let period_raw = required(&req.period, "campo obrigatório: period")?;
        let request_type_raw = required(&req.request_type, "campo obrigatório: request_type")?;
        let institution = required(&req.institution, "campo obrigatório: institution")?;
        let responsible = required(&req.responsible, "campo obrigatório: responsible")?;
        let email = required(&req.email, "campo obrigatório: email")?;
        let phone = required(&req.phone, "campo obrigatório: phone")?;
        let purpose = required(&req.purpose, "campo obrigatório: purpose")?;

        bounded(institution, MAX_FIELD_LEN, "instituição muito longa")?;
        bounded(responsible, MAX_FIELD_LEN, "nome do responsável muito longo")?;
        bounded(email, MAX_FIELD_LEN, "e-mail muito longo")?;
        bounded(phone, MAX_FIELD_LEN, "telefone muito longo")?;
        bounded(purpose, MAX_TEXT_LEN, "finalidade muito longa")?;
        let notes = optional_text(&req.notes, MAX_TEXT_LEN, "observações muito longas")?;
        let attachment_url =
            optional_text(&req.attachment_url, MAX_URL_LEN, "anexo inválido")?;

        let period = Period::parse(period_raw)
            .ok_or(EngineError::Validation("período inválido"))?;
        let request_type = RequestType::normalize(request_type_raw).ok_or(
            EngineError::Validation("tipo de solicitação inválido (use Interna ou Externa)"),
        )?;

        let date_start = parse_date(date_start_raw)?;
        let date_end = match req.date_end.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => parse_date(v)?,
            _ => date_start,
        };
        if date_end < date_start {
            return Err(EngineError::Validation(
                "data final não pode ser anterior à data inicial",
            ));
        }
        let dates = DateRange::new(date_start, date_end);
        validate_range(&dates)?;

        let lane_arc = self.lane(period);
        let mut guard = lane_arc.write().await;
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_PERIOD {
            return Err(EngineError::Validation("limite de reservas do período atingido"));
        }
        if let Some(existing) = find_conflict(&guard, &dates, None) {
            metrics::counter!(crate::observability::SUBMIT_CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::Conflict(existing));
        }

        let id = self.allocate_id();
        let event = Event::Submitted {
            id,
            date_start,
            date_end,
            period,
            request_type,
            institution: institution.to_string(),
            responsible: responsible.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            purpose: purpose.to_string(),
            notes,
            attachment_url,
            created_at: Utc::now(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        let reservation = guard.get(id).cloned().expect("just inserted");
        drop(guard);

        metrics::counter!(crate::observability::RESERVATIONS_SUBMITTED_TOTAL).increment(1);
        self.notify.enqueue(NotifyTask::Created(reservation.clone()));
        Ok(reservation)
    }

    /// Record a staff decision. Any status is reachable from any other —
    /// the enumerated values are the only guard (re-approving a cancelled
    /// reservation is allowed, matching the inherited workflow).
    pub async fn decide(
        &self,
        id: ReservationId,
        new_status: &str,
        reason: Option<&str>,
        actor: Option<&Actor>,
    ) -> Result<Reservation, EngineError> {
        let status = Status::parse(new_status)
            .ok_or(EngineError::Validation("status inválido"))?;
        let reason = reason.map(str::trim).filter(|s| !s.is_empty());
        if status.requires_reason() && reason.is_none() {
            return Err(EngineError::Validation(
                "para negar ou cancelar uma reserva é obrigatório informar o motivo",
            ));
        }
        if let Some(r) = reason {
            bounded(r, MAX_TEXT_LEN, "motivo da decisão muito longo")?;
        }
        let actor = actor.ok_or(EngineError::Unauthorized)?;

        let period = self.period_of(id).ok_or(EngineError::NotFound(id))?;
        let lane_arc = self.lane(period);
        let mut guard = lane_arc.write().await;
        if guard.get(id).is_none() {
            return Err(EngineError::NotFound(id));
        }

        let event = Event::Decided {
            id,
            status,
            decided_by: actor.name.clone(),
            decided_by_email: actor.email.clone(),
            reason: reason.map(str::to_string),
            decided_at: Utc::now(),
        };
        self.persist_and_apply(&mut guard, &event).await?;
        let updated = guard.get(id).cloned().expect("reservation present");
        drop(guard);

        metrics::counter!(
            crate::observability::RESERVATIONS_DECIDED_TOTAL,
            "status" => status.as_str()
        )
        .increment(1);
        self.notify.enqueue(NotifyTask::Decision(updated.clone()));
        Ok(updated)
    }
}
